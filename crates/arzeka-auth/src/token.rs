//! Access tokens and the token endpoint
//!
//! `TokenResponse` is the wire shape returned by `auth/getToken`; `Token` is
//! the in-memory credential with an absolute validity window. Token
//! acquisition goes through the `Authenticator` trait so the session can be
//! driven by the real HTTP endpoint or by a test double.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    ACCEPT_LANGUAGE, AUTH_ENDPOINT, DEFAULT_EXPIRES_IN_SECS, DEFAULT_TOKEN_TYPE, GRANT_TYPE,
    USER_AGENT, endpoint_url,
};
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time. The session
/// converts it to an absolute expiry when storing the token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// Bearer credential with its validity window.
///
/// Invariant: `expires_at >= issued_at`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    token_type: String,
    issued_at: SystemTime,
    expires_at: SystemTime,
}

impl Token {
    /// Create a token issued at `issued_at` and valid for `lifetime`.
    pub fn new(
        value: impl Into<String>,
        token_type: impl Into<String>,
        issued_at: SystemTime,
        lifetime: Duration,
    ) -> Self {
        // An unrepresentable expiry collapses to an already-expired token.
        let expires_at = issued_at.checked_add(lifetime).unwrap_or(issued_at);
        Self {
            value: value.into(),
            token_type: token_type.into(),
            issued_at,
            expires_at,
        }
    }

    /// Convert an endpoint response received at `received_at`.
    pub fn from_response(response: TokenResponse, received_at: SystemTime) -> Self {
        Self::new(
            response.access_token,
            response.token_type,
            received_at,
            Duration::from_secs(response.expires_in),
        )
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Seconds from `now` until expiry; negative once expired.
    pub fn seconds_remaining(&self, now: SystemTime) -> f64 {
        match self.expires_at.duration_since(now) {
            Ok(left) => left.as_secs_f64(),
            Err(past) => -past.duration().as_secs_f64(),
        }
    }

    /// `Authorization` header value, e.g. `Bearer eyJ...`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of fresh tokens for an `AuthSession`.
///
/// Uses a `Pin<Box<dyn Future>>` return type so sessions can hold an
/// `Arc<dyn Authenticator>`.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>>;
}

/// Authenticator backed by the gateway's `auth/getToken` endpoint.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
    token_url: String,
}

impl HttpAuthenticator {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            token_url: endpoint_url(base_url, AUTH_ENDPOINT),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl Authenticator for HttpAuthenticator {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>> {
        Box::pin(request_token(&self.client, &self.token_url, credentials))
    }
}

/// POST the username/password grant and parse the token response.
///
/// 401 and 403 and an unreachable endpoint are reported as authentication
/// failures; any other non-success status is an API failure carrying the
/// status and body.
async fn request_token(
    client: &reqwest::Client,
    url: &str,
    credentials: &Credentials,
) -> Result<TokenResponse> {
    debug!(url, "requesting access token");

    let response = client
        .post(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
        .json(&serde_json::json!({
            "username": credentials.username(),
            "password": credentials.password(),
            "grant_type": GRANT_TYPE,
        }))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Authentication(format!("authentication request timed out: {e}"))
            } else {
                Error::Authentication(format!(
                    "failed to connect to authentication endpoint: {e}"
                ))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(status = status.as_u16(), "token request rejected");

        return Err(match status.as_u16() {
            401 => Error::Authentication(
                "invalid credentials: username or password is incorrect".into(),
            ),
            403 => Error::Authentication(
                "access forbidden: account may be locked or inactive".into(),
            ),
            code => Error::Api { status: code, body },
        });
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Authentication(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::Authentication(
            "token response missing access_token".into(),
        ));
    }

    Ok(token)
}
