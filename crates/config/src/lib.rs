//! Runtime configuration shared by the file handle and the CLI.
//!
//! Every setting comes from an environment variable with a default:
//!
//! ```text
//! WARTS_MAX_RECORD_KB   largest frame body accepted, KiB   (default: 65536 = 64 MiB)
//! WARTS_TOLERATE_TAIL   partial frame at EOF is EOF        (default: false)
//! WARTS_LOG             tracing filter directive           (default: "warn")
//! ```
//!
//! Unparseable values fall back to the default.

pub const DEFAULT_MAX_RECORD_KB: u32 = 64 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WartsConfig {
    /// Frames whose body is longer than this many bytes are rejected.
    pub max_record_len: u32,
    pub tolerate_truncated_tail: bool,
    pub log_filter: String,
}

impl Default for WartsConfig {
    fn default() -> Self {
        WartsConfig {
            max_record_len: kb_to_bytes(DEFAULT_MAX_RECORD_KB),
            tolerate_truncated_tail: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl WartsConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let max_kb: u32 = env_or("WARTS_MAX_RECORD_KB", "65536")
            .parse()
            .ok()
            .filter(|&kb| kb > 0)
            .unwrap_or(DEFAULT_MAX_RECORD_KB);
        let tolerate: bool = env_or("WARTS_TOLERATE_TAIL", "false")
            .parse()
            .unwrap_or(false);
        let log_filter = env_or("WARTS_LOG", DEFAULT_LOG_FILTER);

        WartsConfig {
            max_record_len: kb_to_bytes(max_kb),
            tolerate_truncated_tail: tolerate,
            log_filter,
        }
    }
}

fn kb_to_bytes(kb: u32) -> u32 {
    kb.saturating_mul(1024)
}

#[cfg(test)]
mod tests;
