use serde::Deserialize;

use crate::shared::datetime::TimeConfig;
use crate::shared::format::OutputFormat;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub query: Option<QueryConfig>,
    pub time: Option<TimeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of groups a regroup may produce (None or 0 = unlimited)
    pub group_limit: Option<usize>,
    /// Row rendering format: "tsv" or "csv"; anything else fails to load
    pub output_format: OutputFormat,
    /// Always request sorted term iteration from the remote engine
    pub sorted_iteration: Option<bool>,
}

use config::{Config, ConfigError, File, FileFormat};

/// Loads `path` (extension optional) with every section validated.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::with_name(path))
        .build()?
        .try_deserialize()
}

/// Settings from TOML text, for embedded or generated configuration.
pub fn parse_settings(toml: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
