use thiserror::Error;

/// Main error type for lochist
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("unknown location history format: {0}")]
    UnknownFormat(String),

    #[error("no location points could be extracted ({skipped} records skipped)")]
    NoPoints { skipped: usize },

    #[error("processing was cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid period range: {0}")]
    InvalidRange(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

impl HistoryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
