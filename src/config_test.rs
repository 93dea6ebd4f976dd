use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |key| map.get(key).cloned()
}

// =============================================================
// Defaults
// =============================================================

#[test]
fn default_has_no_drag_limit() {
    let cfg = RuntimeConfig::default();
    assert_eq!(cfg.max_simultaneous_drags, 0);
    assert_eq!(cfg.drag_limit(), None);
    assert!(cfg.pinch_enabled);
    assert!(cfg.collisions_enabled);
}

#[test]
fn negative_limit_disables_admission_control() {
    let cfg = RuntimeConfig { max_simultaneous_drags: -3, ..RuntimeConfig::default() };
    assert_eq!(cfg.drag_limit(), None);
}

#[test]
fn positive_limit_is_reported() {
    let cfg = RuntimeConfig { max_simultaneous_drags: 2, ..RuntimeConfig::default() };
    assert_eq!(cfg.drag_limit(), Some(2));
}

// =============================================================
// from_lookup
// =============================================================

#[test]
fn lookup_empty_yields_defaults() {
    let cfg = RuntimeConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, RuntimeConfig::default());
}

#[test]
fn lookup_parses_overrides() {
    let cfg = RuntimeConfig::from_lookup(lookup_from(&[
        ("BOARD_MAX_SIMULTANEOUS_DRAGS", " 4 "),
        ("BOARD_PINCH_ENABLED", "false"),
        ("BOARD_COLLISIONS_ENABLED", "0"),
    ]))
    .unwrap();
    assert_eq!(cfg.drag_limit(), Some(4));
    assert!(!cfg.pinch_enabled);
    assert!(!cfg.collisions_enabled);
}

#[test]
fn lookup_rejects_garbage_limit() {
    let err = RuntimeConfig::from_lookup(lookup_from(&[("BOARD_MAX_SIMULTANEOUS_DRAGS", "many")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { var: "BOARD_MAX_SIMULTANEOUS_DRAGS", .. }));
    assert!(err.to_string().contains("many"));
}

#[test]
fn lookup_rejects_garbage_bool() {
    let err = RuntimeConfig::from_lookup(lookup_from(&[("BOARD_PINCH_ENABLED", "sometimes")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { var: "BOARD_PINCH_ENABLED", .. }));
}

// =============================================================
// from_json
// =============================================================

#[test]
fn json_partial_document_fills_defaults() {
    let cfg = RuntimeConfig::from_json(r#"{ "maxSimultaneousDrags": 2 }"#).unwrap();
    assert_eq!(cfg.drag_limit(), Some(2));
    assert!(cfg.pinch_enabled);
}

#[test]
fn json_malformed_is_error() {
    let err = RuntimeConfig::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}
