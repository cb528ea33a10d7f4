//! Integration tests for configuration loading and credential resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SPARKIFY_* variables are marked with #[serial].

use serial_test::serial;
use sparkify_common::config::{
    resolve_config_path, resolve_credentials, TomlConfig, ACCESS_KEY_ENV_VAR, CONFIG_ENV_VAR,
    SECRET_KEY_ENV_VAR,
};
use sparkify_common::Error;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(ACCESS_KEY_ENV_VAR);
    env::remove_var(SECRET_KEY_ENV_VAR);
}

#[test]
fn test_load_reads_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dl.toml");
    fs::write(
        &path,
        "input_base = \"/data/in\"\noutput_base = \"/data/out\"\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.input_base, PathBuf::from("/data/in"));
    assert_eq!(config.output_base, PathBuf::from("/data/out"));
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_load_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dl.toml");
    fs::write(&path, "input_base = [unclosed").unwrap();

    let result = TomlConfig::load(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let result = TomlConfig::load_or_default(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let cli = temp_dir.path().join("cli.toml");
    let from_env = temp_dir.path().join("env.toml");
    fs::write(&cli, "").unwrap();
    fs::write(&from_env, "").unwrap();
    env::set_var(CONFIG_ENV_VAR, &from_env);

    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
    assert_eq!(resolve_config_path(None), Some(from_env));

    clear_env();
}

#[test]
#[serial]
fn test_env_config_file_is_loaded() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("env.toml");
    fs::write(&path, "log_data_path = \"logs\"\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.log_data_path, "logs");

    clear_env();
}

#[test]
#[serial]
fn test_load_reports_the_file_it_read() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let cli = temp_dir.path().join("cli.toml");
    let from_env = temp_dir.path().join("env.toml");
    fs::write(&cli, "song_data_path = \"songs\"\n").unwrap();
    fs::write(&from_env, "").unwrap();
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let (config, source) = TomlConfig::load_with_source(Some(&cli)).unwrap();
    assert_eq!(config.song_data_path, "songs");
    assert_eq!(source, Some(cli));

    let (_, source) = TomlConfig::load_with_source(None).unwrap();
    assert_eq!(source, Some(from_env));

    clear_env();
}

#[test]
#[serial]
fn test_credentials_from_toml() {
    clear_env();
    let config: TomlConfig = toml::from_str(
        "[keys]\naws_access_key_id = \"AKIA-TOML\"\naws_secret_access_key = \"toml-secret\"\n",
    )
    .unwrap();

    let creds = resolve_credentials(&config).unwrap();
    assert_eq!(creds.access_key_id, "AKIA-TOML");
    assert_eq!(creds.secret_access_key, "toml-secret");
}

#[test]
#[serial]
fn test_credentials_env_wins_over_toml() {
    clear_env();
    env::set_var(ACCESS_KEY_ENV_VAR, "AKIA-ENV");
    env::set_var(SECRET_KEY_ENV_VAR, "env-secret");
    let config: TomlConfig = toml::from_str(
        "[keys]\naws_access_key_id = \"AKIA-TOML\"\naws_secret_access_key = \"toml-secret\"\n",
    )
    .unwrap();

    let creds = resolve_credentials(&config).unwrap();
    assert_eq!(creds.access_key_id, "AKIA-ENV");

    clear_env();
}

#[test]
#[serial]
fn test_no_credentials() {
    clear_env();
    assert!(resolve_credentials(&TomlConfig::default()).is_none());
}
