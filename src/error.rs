use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Sink unavailable: {target}: {reason}")]
    SinkUnavailable { target: String, reason: String },

    #[error("Schema mismatch on table '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
