use super::*;
use std::fs;

fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn isolated() -> ConfigBuilder {
    Config::builder().env_source(vars(&[]))
}

#[test]
fn test_defaults() {
    let config = isolated().build().expect("defaults build");

    assert_eq!(config, Config::default());
    assert!(!config.runtime.turbo_mode);
    assert_eq!(config.runtime.max_clones, MAX_CLONES);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_environment_overrides_nested_keys() {
    let config = Config::builder()
        .env_source(vars(&[
            ("BLOCKVM_RUNTIME__TURBO_MODE", "true"),
            ("BLOCKVM_RUNTIME__MAX_CLONES", "12"),
            ("BLOCKVM_LOGGING__LEVEL", "debug"),
        ]))
        .build()
        .expect("env config builds");

    assert!(config.runtime.turbo_mode);
    assert_eq!(config.runtime.max_clones, 12);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_flags_beat_environment() {
    let config = Config::builder()
        .env_source(vars(&[("BLOCKVM_RUNTIME__TURBO_MODE", "true")]))
        .turbo_mode(Some(false))
        .compatibility_mode(Some(true))
        .build()
        .expect("config builds");

    assert!(!config.runtime.turbo_mode);
    assert!(config.runtime.compatibility_mode);
}

#[test]
fn test_config_file_is_read() {
    let path = std::env::temp_dir().join(format!("blockvm-{}.toml", uuid::Uuid::new_v4()));
    fs::write(&path, "[runtime]\nwarp_time_ms = 250\n").expect("write config file");

    let config = isolated().config_path(Some(path.clone())).build();
    fs::remove_file(&path).ok();

    let config = config.expect("file config builds");
    assert_eq!(config.runtime.warp_time_ms, 250);
    assert!(!config.runtime.turbo_mode);
}

#[test]
fn test_missing_explicit_config_file_fails() {
    let path = std::env::temp_dir().join(format!("blockvm-missing-{}.toml", uuid::Uuid::new_v4()));

    let err = isolated().config_path(Some(path)).build().unwrap_err();
    assert!(matches!(err, crate::error::EngineError::Config(_)));
}

#[test]
fn test_to_toml_lists_sections() {
    let rendered = Config::default().to_toml().expect("renders");

    assert!(rendered.contains("[runtime]"));
    assert!(rendered.contains("turbo_mode = false"));
    assert!(rendered.contains("[logging]"));
}

#[test]
fn test_runtime_options_from_config() {
    let mut config = Config::default();
    config.runtime.compatibility_mode = true;
    config.runtime.warp_time_ms = 100;

    let options = RuntimeOptions::from(&config);
    assert!(options.compatibility_mode);
    assert_eq!(options.warp_time, Duration::from_millis(100));
    assert_eq!(options.max_clones, MAX_CLONES);
}
