use serde::Deserialize;
use std::fs;

use crate::error::{EtlError, Result};
use crate::types::{CategoryRule, WriteMode};

/// Environment variable that overrides `[sink] password` when set.
pub const SINK_PASSWORD_ENV: &str = "ETL_SINK_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path to the CSV input file.
    pub path: String,
}

/// PostgreSQL connection and destination settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_aggregate_table")]
    pub aggregate_table: String,
    #[serde(default = "default_write_mode")]
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Categorization rules, evaluated in order; first match wins.
    /// Empty means the built-in defaults apply.
    #[serde(default)]
    pub category_rules: Vec<CategoryRule>,
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "realEstate".to_string()
}

fn default_aggregate_table() -> String {
    "realEstateByYear".to_string()
}

fn default_write_mode() -> WriteMode {
    WriteMode::Overwrite
}

impl AppConfig {
    pub fn load(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .map_err(|e| EtlError::Config(format!("Failed to read config file '{}': {}", config_path, e)))?;

        let mut config: AppConfig = toml::from_str(&config_content)?;

        // The password can be kept out of the config file entirely.
        if let Ok(password) = std::env::var(SINK_PASSWORD_ENV) {
            config.sink.password = password;
        }

        Ok(config)
    }
}

impl SinkConfig {
    /// Keyword/value connection string for tokio-postgres.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.database
        )
    }

    /// Short connection target for error messages (no credentials).
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}
