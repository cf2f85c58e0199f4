use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::report::Stage;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("[{stage}] source unavailable ({source_name}): {reason}")]
    SourceUnavailable {
        stage: Stage,
        source_name: String,
        reason: String,
    },

    #[error("[{stage}] schema drift: expected column '{column}' is missing")]
    SchemaDrift { stage: Stage, column: String },

    #[error("[{stage}] failed to write {}: {reason}", path.display())]
    WriteFailure {
        stage: Stage,
        path: PathBuf,
        reason: String,
    },

    #[error("table not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to parse table {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl EtlError {
    /// The stage that raised a fatal error, when the variant carries one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EtlError::SourceUnavailable { stage, .. }
            | EtlError::SchemaDrift { stage, .. }
            | EtlError::WriteFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
