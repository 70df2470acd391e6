use reword::cli::Cli;
use reword::config::{Config, DEFAULT_HOTKEY, DEFAULT_MODEL};
use std::io::Write;

#[test]
fn default_config_round_trips() {
    let config = Config::default();
    let json = serde_json::to_string_pretty(&config).expect("serialize config");
    let decoded: Config = serde_json::from_str(&json).expect("deserialize config");
    assert_eq!(decoded, config);
}

#[test]
fn partial_config_file_fills_in_defaults() {
    let json = r#"{"model":"gpt-4o","capture":{"attempts":5}}"#;
    let config: Config = serde_json::from_str(json).expect("deserialize config");
    assert_eq!(config.model, "gpt-4o");
    assert_eq!(config.capture.attempts, 5);
    assert_eq!(config.capture.settle_ms, 100);
    assert_eq!(config.hotkey, DEFAULT_HOTKEY);
}

#[test]
fn config_file_values_survive_resolution_and_cli_wins() {
    let mut file = tempfile::NamedTempFile::new().expect("temp config file");
    write!(
        file,
        r#"{{"api_key":"sk-from-file","model":"gpt-4o","hotkey":"ctrl+f14"}}"#
    )
    .expect("write config");

    let cli = Cli {
        hotkey: Some("ctrl+f13".into()),
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::resolve(cli).expect("resolve config");

    assert_eq!(config.api_key, "sk-from-file");
    assert_eq!(config.model, "gpt-4o");
    // CLI flag overrides the file value.
    assert_eq!(config.hotkey, "ctrl+f13");
}

#[test]
fn malformed_config_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp config file");
    write!(file, "not json").expect("write config");

    let cli = Cli {
        api_key: Some("sk-test".into()),
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::resolve(cli).is_err());
}

#[test]
fn cli_parses_all_pipeline_flags() {
    use clap::Parser;
    let cli = Cli::parse_from([
        "reword",
        "--api-key",
        "sk-test",
        "--model",
        DEFAULT_MODEL,
        "--hotkey",
        "ctrl+f13",
        "--attempts",
        "4",
        "--settle-ms",
        "150",
    ]);
    let config = Config::resolve(cli).expect("resolve config");
    assert_eq!(config.capture.attempts, 4);
    assert_eq!(config.capture.settle_ms, 150);
}
