//! Error types for payment client operations

use thiserror::Error;

/// Errors from payment client operations.
///
/// Authentication and signing failures keep their `arzeka_auth::Error`
/// kind so callers can tell bad credentials from network or API trouble.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] arzeka_auth::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("payment API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("client is closed")]
    Closed,

    #[error(transparent)]
    Config(#[from] common::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Auth(e) => e.status(),
            _ => None,
        }
    }

    /// True when the caller must authenticate again before retrying.
    pub fn needs_authentication(&self) -> bool {
        matches!(
            self,
            Error::Auth(arzeka_auth::Error::CredentialsMissing)
                | Error::Auth(arzeka_auth::Error::Authentication(_))
        )
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
