//! Error types for authentication and signing

/// Errors from token acquisition, renewal and signature operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad credentials, unreachable token endpoint, or an unusable token
    /// response.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Renewal was needed but the session holds no username/password.
    #[error(
        "token expired and no credentials stored for automatic re-authentication; call authenticate() with a username and password"
    )]
    CredentialsMissing,

    /// Malformed input, e.g. an empty signing secret.
    #[error("validation error: {0}")]
    Validation(String),

    /// The endpoint answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
