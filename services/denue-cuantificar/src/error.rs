//! Service-level errors

use thiserror::Error;

/// Exit status for configuration errors.
pub const EXIT_CONFIG: u8 = 2;

/// Exit status for any other fatal error.
pub const EXIT_FAILURE: u8 = 1;

/// Problems detected before any request is issued. All of them end the
/// process with `EXIT_CONFIG`.
///
/// Failures during the run (output not writable, client cannot be built)
/// travel as plain `anyhow` errors and exit with `EXIT_FAILURE`.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error("no credentials supplied; use --tokens, DENUE_TOKENS or pool.tokens_file")]
    NoCredentials,

    #[error("no activities to process")]
    NoActivities,

    #[error("no valid areas to process")]
    NoAreas,

    #[error("failed to read areas: {0}")]
    Areas(#[source] denue::Error),
}

impl Error {
    pub fn exit_code(&self) -> u8 {
        EXIT_CONFIG
    }
}

/// Exit status for an error returned from a command.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
