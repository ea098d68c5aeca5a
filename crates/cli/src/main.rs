//! # wartsutil
//!
//! Inspection tool for warts measurement files.
//!
//! ```text
//! wartsutil stat   FILE                 object counts and decode failures
//! wartsutil check  FILE                 decode and re-encode every ping and
//!                                       traceroute, report byte differences
//! wartsutil filter -t ping,trace IN OUT copy selected object types
//! ```
//!
//! ## Configuration
//!
//! ```text
//! WARTS_MAX_RECORD_KB  largest accepted record in KiB  (default: 65536)
//! WARTS_TOLERATE_TAIL  stop quietly at a cut-off tail  (default: false)
//! WARTS_LOG            log filter directives           (default: "warn")
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{WartsConfig, DEFAULT_LOG_FILTER};
use tracing_subscriber::EnvFilter;
use warts::ObjectType;

#[derive(Parser)]
#[command(name = "wartsutil", version, about = "Inspect and copy warts files")]
struct Cli {
    /// Treat a partial object at the end of a file as end of file
    #[arg(long, global = true)]
    tolerate_tail: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count objects by type
    Stat { file: PathBuf },

    /// Check that every ping and traceroute re-encodes to the same bytes
    Check { file: PathBuf },

    /// Copy the selected object types into a new file
    Filter {
        /// Comma separated object type names, e.g. "ping,trace"
        #[arg(short, long, value_delimiter = ',', value_parser = parse_type, required = true)]
        types: Vec<ObjectType>,

        input: PathBuf,
        output: PathBuf,
    },
}

fn parse_type(s: &str) -> Result<ObjectType, String> {
    ObjectType::from_name(s).ok_or_else(|| {
        let known: Vec<_> = ObjectType::ALL.iter().map(|t| t.name()).collect();
        format!("unknown object type '{s}' (one of: {})", known.join(", "))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = WartsConfig::from_env();
    cfg.tolerate_truncated_tail |= cli.tolerate_tail;

    let filter =
        EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Stat { file } => commands::stat(&file, &cfg, &mut out),
        Command::Check { file } => commands::check(&file, &cfg, &mut out),
        Command::Filter {
            types,
            input,
            output,
        } => commands::filter(&input, &output, &types, &cfg, &mut out),
    }
}
