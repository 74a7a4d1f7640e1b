use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;
use ticker_config::{
    apply_env_overrides, load_config, Config, MODULES_URL_ENV, QUOTE_URL_ENV,
};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = load_config(&dir.path().join("ticker.toml")).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.source.chunk_size, 100);
    assert_eq!(config.source.max_in_flight, 16);
}

#[test]
fn test_partial_file_keeps_remaining_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ticker.toml");
    fs::write(
        &path,
        r#"
[source]
chunk_size = 50

[cache]
ttl_secs = 300
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.source.chunk_size, 50);
    assert_eq!(config.source.max_in_flight, 16);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.retry.max_attempts, 3);
}

#[test]
fn test_out_of_range_value_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ticker.toml");
    fs::write(&path, "[source]\nmax_in_flight = 0\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("source.max_in_flight"));
}

#[test]
fn test_malformed_toml_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ticker.toml");
    fs::write(&path, "[source\nchunk_size = ").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_env_overrides_endpoints() {
    let env: HashMap<&str, &str> = HashMap::from([
        (QUOTE_URL_ENV, "http://127.0.0.1:9000/quote"),
        (MODULES_URL_ENV, "  "),
    ]);

    let mut config = Config::default();
    apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

    assert_eq!(config.source.quote_url, "http://127.0.0.1:9000/quote");
    assert_eq!(config.source.modules_url, Config::default().source.modules_url);
}

#[test]
fn test_env_override_is_validated() {
    let mut config = Config::default();
    let err = apply_env_overrides(&mut config, |k| {
        (k == QUOTE_URL_ENV).then(|| "nonsense".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("environment"));
}
