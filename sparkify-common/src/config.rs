//! Configuration loading and credential resolution
//!
//! Bootstrap configuration comes from a TOML file. A missing file is not
//! fatal: the pipeline warns and runs on built-in defaults.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SPARKIFY_CONFIG`)
//! 3. `dl.toml` in the working directory
//! 4. Platform config directory (`~/.config/sparkify/dl.toml` on Linux)
//!
//! Credentials are resolved into an explicit [`Credentials`] value that is
//! handed to the storage layer; nothing is exported to the process environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SPARKIFY_CONFIG";
/// Environment variable holding the storage access key id
pub const ACCESS_KEY_ENV_VAR: &str = "SPARKIFY_AWS_ACCESS_KEY_ID";
/// Environment variable holding the storage secret key
pub const SECRET_KEY_ENV_VAR: &str = "SPARKIFY_AWS_SECRET_ACCESS_KEY";

const CONFIG_FILE_NAME: &str = "dl.toml";

/// Bits of a songplay id holding the row position inside its id partition
pub const ID_PARTITION_BITS: u32 = 33;

/// Largest id partition whose row positions stay below the next offset
pub const MAX_ROWS_PER_PARTITION: u64 = 1 << ID_PARTITION_BITS;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Base location holding `song_data/` and `log_data/`
    #[serde(default = "default_input_base")]
    pub input_base: PathBuf,

    /// Base location receiving one directory per output table
    #[serde(default = "default_output_base")]
    pub output_base: PathBuf,

    /// Song dataset location relative to `input_base`
    ///
    /// Narrow it (e.g. `song_data/A/A/A`) to run against a sample.
    #[serde(default = "default_song_data_path")]
    pub song_data_path: String,

    /// Log dataset location relative to `input_base`
    #[serde(default = "default_log_data_path")]
    pub log_data_path: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage credentials (optional)
    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            input_base: default_input_base(),
            output_base: default_output_base(),
            song_data_path: default_song_data_path(),
            log_data_path: default_log_data_path(),
            logging: LoggingConfig::default(),
            keys: KeysConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[keys]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KeysConfig {
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
}

/// `[output]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Rows per id partition when assigning songplay ids
    #[serde(default = "default_rows_per_partition")]
    pub rows_per_partition: usize,

    #[serde(default)]
    pub compression: OutputCompression,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            rows_per_partition: default_rows_per_partition(),
            compression: OutputCompression::default(),
        }
    }
}

/// Column chunk compression for written tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCompression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

fn default_input_base() -> PathBuf {
    PathBuf::from("./data/")
}

fn default_output_base() -> PathBuf {
    PathBuf::from("./Results/")
}

fn default_song_data_path() -> String {
    "song_data".to_string()
}

fn default_log_data_path() -> String {
    "log_data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rows_per_partition() -> usize {
    1_000_000
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file picked by [`resolve_config_path`]
    ///
    /// An explicitly requested file must exist. When no file is found through
    /// the fallback locations, built-in defaults are used.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        Self::load_with_source(cli_path).map(|(config, _)| config)
    }

    /// Like [`TomlConfig::load_or_default`], also returning the file that was
    /// loaded (`None` for built-in defaults)
    pub fn load_with_source(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = cli_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        match resolve_config_path(cli_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.rows_per_partition == 0 {
            return Err(Error::Config(
                "output.rows_per_partition must be greater than zero".to_string(),
            ));
        }
        if self.output.rows_per_partition as u64 > MAX_ROWS_PER_PARTITION {
            return Err(Error::Config(format!(
                "output.rows_per_partition must not exceed {}",
                MAX_ROWS_PER_PARTITION
            )));
        }
        if self.song_data_path.trim().is_empty() || self.log_data_path.trim().is_empty() {
            return Err(Error::Config("dataset paths must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Pick the config file to load, or `None` when no candidate exists
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file {}", CONFIG_ENV_VAR, path.display());
    }

    // Priority 3: Working directory
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    // Priority 4: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("sparkify").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Storage credentials, scoped to one pipeline run
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Resolve storage credentials
///
/// **Priority:** ENV → TOML. A source only counts when it provides both
/// values. Returns `None` when no source is complete.
pub fn resolve_credentials(config: &TomlConfig) -> Option<Credentials> {
    let env_creds = credentials_from(
        std::env::var(ACCESS_KEY_ENV_VAR).ok(),
        std::env::var(SECRET_KEY_ENV_VAR).ok(),
    );
    let toml_creds = credentials_from(
        config.keys.aws_access_key_id.clone(),
        config.keys.aws_secret_access_key.clone(),
    );

    if env_creds.is_some() && toml_creds.is_some() {
        warn!("Credentials found in multiple sources: environment, TOML. Using environment.");
    }

    if let Some(creds) = env_creds {
        info!("Credentials loaded from environment variables");
        return Some(creds);
    }
    if let Some(creds) = toml_creds {
        info!("Credentials loaded from TOML config");
        return Some(creds);
    }

    info!("No storage credentials configured");
    None
}

fn credentials_from(key: Option<String>, secret: Option<String>) -> Option<Credentials> {
    match (key, secret) {
        (Some(k), Some(s)) if !k.trim().is_empty() && !s.trim().is_empty() => Some(Credentials {
            access_key_id: k,
            secret_access_key: s,
        }),
        (Some(_), None) | (None, Some(_)) => {
            warn!("Ignoring incomplete credential pair");
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.input_base, PathBuf::from("./data/"));
        assert_eq!(config.output_base, PathBuf::from("./Results/"));
        assert_eq!(config.song_data_path, "song_data");
        assert_eq!(config.log_data_path, "log_data");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.output.rows_per_partition, 1_000_000);
        assert_eq!(config.output.compression, OutputCompression::Snappy);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.song_data_path, "song_data");
        assert_eq!(config.logging.level, "info");
        assert!(config.keys.aws_access_key_id.is_none());
    }

    #[test]
    fn test_full_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            input_base = "s3a://bucket/"
            output_base = "/tmp/out"
            song_data_path = "song_data/A/A/A"

            [logging]
            level = "debug"

            [keys]
            aws_access_key_id = "AKIA"
            aws_secret_access_key = "secret"

            [output]
            rows_per_partition = 10
            compression = "zstd"
            "#,
        )
        .unwrap();
        assert_eq!(config.song_data_path, "song_data/A/A/A");
        assert_eq!(config.log_data_path, "log_data");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.keys.aws_access_key_id.as_deref(), Some("AKIA"));
        assert_eq!(config.output.rows_per_partition, 10);
        assert_eq!(config.output.compression, OutputCompression::Zstd);
    }

    #[test]
    fn test_validate_rejects_zero_partition_size() {
        let mut config = TomlConfig::default();
        config.output.rows_per_partition = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_bounds_partition_size_by_id_bits() {
        let mut config = TomlConfig::default();
        config.output.rows_per_partition = MAX_ROWS_PER_PARTITION as usize;
        assert!(config.validate().is_ok());

        config.output.rows_per_partition = MAX_ROWS_PER_PARTITION as usize + 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_oversized_partition_in_toml_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("dl.toml");
        std::fs::write(&path, "[output]\nrows_per_partition = 8589934593\n").unwrap();
        assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_incomplete_pair_is_ignored() {
        assert!(credentials_from(Some("AKIA".into()), None).is_none());
        assert!(credentials_from(Some("AKIA".into()), Some("  ".into())).is_none());
        assert!(credentials_from(Some("AKIA".into()), Some("s".into())).is_some());
    }
}
