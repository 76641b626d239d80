//! Request outcomes reported back to the pool

use transport::ErrorClassification;

/// Result of the request a lease was used for.
///
/// Only `Unauthorized` is attributed to the credential. Transient failures
/// (timeouts, 5xx, unparseable bodies) say nothing about the token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Transient,
    Unauthorized,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Transient => "transient",
            Outcome::Unauthorized => "unauthorized",
        }
    }

    /// Outcome of a completed HTTP exchange with the given status.
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Outcome::Success
        } else {
            transport::classify_status(status).into()
        }
    }
}

impl From<ErrorClassification> for Outcome {
    fn from(classification: ErrorClassification) -> Self {
        match classification {
            ErrorClassification::Transient => Outcome::Transient,
            ErrorClassification::Unauthorized => Outcome::Unauthorized,
        }
    }
}
