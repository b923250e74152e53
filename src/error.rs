use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Error, Debug)]
pub enum DatasetError {
    /// Malformed file name, date string or table layout, or an unknown table extension.
    #[error("Format error: {0}")]
    Format(String),

    /// Requested date range lies outside the period a label source covers.
    #[error("Range error: {0}")]
    Range(String),

    /// Data that should agree does not (label/epoch pairing, stale table rows).
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Not enough samples for label {label}: {available} available, {requested} requested")]
    Insufficient {
        label: i64,
        available: usize,
        requested: usize,
    },

    #[error("Request to {url} returned status code {status}")]
    Transport { status: u16, url: String },

    /// Unknown variable, preset or label source, or an out-of-range row index.
    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}
