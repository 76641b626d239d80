//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("no credentials supplied")]
    NoCredentials,

    #[error("retirement threshold must be greater than 0")]
    InvalidThreshold,

    #[error("credential pool closed")]
    Closed,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
