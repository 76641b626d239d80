//! Error types for fetch and run operations

use std::path::PathBuf;

/// Errors from fetching, parsing and writing results.
///
/// Per-task variants (`InvalidInput` through `Pool`) are absorbed by the
/// orchestrator as zero counts; `Io` and `Sink` abort the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {field}: {value:?}")]
    InvalidInput { field: &'static str, value: String },

    #[error("credential rejected with HTTP {status}")]
    Unauthorized { status: u16 },

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Pool(#[from] credential_pool::Error),

    #[error("column {0:?} not found in catalog header")]
    MissingColumn(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write results: {0}")]
    Sink(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short label for metrics and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput { .. } => "invalid_input",
            Error::Unauthorized { .. } => "unauthorized",
            Error::Status { .. } => "http_status",
            Error::Transport(_) => "transport",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Pool(_) => "pool",
            Error::MissingColumn(_) => "missing_column",
            Error::Io { .. } => "io",
            Error::Sink(_) => "sink",
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
