use super::*;
use std::collections::HashMap;

fn from_pairs(pairs: &[(&str, &str)]) -> WartsConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    WartsConfig::from_lookup(|k| map.get(k).cloned())
}

#[test]
fn empty_environment_gives_defaults() {
    let cfg = from_pairs(&[]);
    assert_eq!(cfg, WartsConfig::default());
    assert_eq!(cfg.max_record_len, 64 * 1024 * 1024);
    assert!(!cfg.tolerate_truncated_tail);
    assert_eq!(cfg.log_filter, "warn");
}

#[test]
fn values_are_read() {
    let cfg = from_pairs(&[
        ("WARTS_MAX_RECORD_KB", "16"),
        ("WARTS_TOLERATE_TAIL", "true"),
        ("WARTS_LOG", "warts=debug"),
    ]);
    assert_eq!(cfg.max_record_len, 16 * 1024);
    assert!(cfg.tolerate_truncated_tail);
    assert_eq!(cfg.log_filter, "warts=debug");
}

#[test]
fn bad_values_fall_back() {
    let cfg = from_pairs(&[
        ("WARTS_MAX_RECORD_KB", "lots"),
        ("WARTS_TOLERATE_TAIL", "yes please"),
    ]);
    assert_eq!(cfg.max_record_len, WartsConfig::default().max_record_len);
    assert!(!cfg.tolerate_truncated_tail);

    assert_eq!(
        from_pairs(&[("WARTS_MAX_RECORD_KB", "0")]).max_record_len,
        WartsConfig::default().max_record_len
    );
}

#[test]
fn huge_limit_saturates() {
    let cfg = from_pairs(&[("WARTS_MAX_RECORD_KB", "4294967295")]);
    assert_eq!(cfg.max_record_len, u32::MAX);
}
