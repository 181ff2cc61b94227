//! Error types for the sync tool.

use std::path::PathBuf;

/// All errors that can occur during a sync run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("failed to read store file {path}: {source}")]
    StoreRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse store JSON: {0}")]
    StoreParse(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(#[from] opsdesk_backend::BackendError),

    #[error("pre-submission check failed: {0}")]
    ChecksFailed(String),

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
