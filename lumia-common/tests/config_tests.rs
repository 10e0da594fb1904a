//! Tests for configuration file discovery and data folder resolution
//!
//! Uses serial_test to prevent environment variable races: tests that
//! manipulate LUMIA_CONFIG or LUMIA_DATA_FOLDER are marked #[serial].

use lumia_common::config::{
    default_data_folder, load_toml_or_default, resolve_config_file, resolve_data_folder,
    LoggingConfig, CONFIG_ENV_VAR, DATA_FOLDER_ENV_VAR,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct BootstrapSample {
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_config_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/lumia-env-config.toml");

    let resolved = resolve_config_file(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/lumia-env-config.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_config_cli_arg_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/lumia-env-config.toml");

    let resolved = resolve_config_file(Some(Path::new("/tmp/lumia-cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/tmp/lumia-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_data_folder_priority() {
    env::remove_var(DATA_FOLDER_ENV_VAR);

    // TOML value used when neither CLI nor env is set
    let folder = resolve_data_folder(None, Some(Path::new("/tmp/lumia-toml")));
    assert_eq!(folder, PathBuf::from("/tmp/lumia-toml"));

    // Env beats TOML
    env::set_var(DATA_FOLDER_ENV_VAR, "/tmp/lumia-env");
    let folder = resolve_data_folder(None, Some(Path::new("/tmp/lumia-toml")));
    assert_eq!(folder, PathBuf::from("/tmp/lumia-env"));
    env::remove_var(DATA_FOLDER_ENV_VAR);

    // Compiled default as the last resort
    let folder = resolve_data_folder(None, None);
    assert_eq!(folder, default_data_folder());
}

#[test]
fn test_malformed_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging\nlevel = ").unwrap();

    let result = load_toml_or_default::<BootstrapSample>(Some(file.path()));
    assert!(result.is_err());
}

#[test]
fn test_toml_logging_level_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

    let parsed: BootstrapSample = load_toml_or_default(Some(file.path())).unwrap();
    assert_eq!(parsed.logging.level, "debug");
}
