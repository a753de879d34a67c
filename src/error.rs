use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AcquireError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network request failed: {0}")]
    Network(String),

    #[error("{url} returned status {status}")]
    NetworkStatus { status: u16, url: String },

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("no parseable records in {0}")]
    EmptyDataset(String),

    #[error("local file not found: {0}")]
    MissingLocalFile(PathBuf),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidRequest,
    NetworkError,
    ExtractionError,
    EmptyDataset,
    MissingLocalFile,
    Other,
}

impl AcquireError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquireError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AcquireError::Network(_) | AcquireError::NetworkStatus { .. } => {
                ErrorKind::NetworkError
            }
            AcquireError::Extraction(_) => ErrorKind::ExtractionError,
            AcquireError::EmptyDataset(_) | AcquireError::Decode(_) => ErrorKind::EmptyDataset,
            AcquireError::MissingLocalFile(_) => ErrorKind::MissingLocalFile,
            AcquireError::Filesystem(_)
            | AcquireError::ConfigRead(_)
            | AcquireError::ConfigParse(_) => ErrorKind::Other,
        }
    }
}
