//! Error types for transport operations

/// Network-level failures that survived every retry.
///
/// Messages never carry the request URL, which embeds the credential.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("connection failed after {attempts} attempt(s): {message}")]
    Connect { attempts: u32, message: String },

    #[error("request failed after {attempts} attempt(s): {message}")]
    Request { attempts: u32, message: String },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    pub(crate) fn from_reqwest(error: reqwest::Error, attempts: u32) -> Self {
        let error = error.without_url();
        if error.is_timeout() {
            Self::Timeout { attempts }
        } else if error.is_connect() {
            Self::Connect {
                attempts,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                attempts,
                message: error.to_string(),
            }
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
