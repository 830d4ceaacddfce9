//! Token lifecycle state machine
//!
//! An `AuthSession` owns at most one `Token` and at most one set of
//! `Credentials`. Validity is judged against a safety margin so a token is
//! renewed before the gateway starts rejecting it:
//!
//! - `Absent`: no token was ever stored
//! - `Valid`: expires more than `margin` from now
//! - `NearExpiry`: expires within `margin`
//! - `Expired`: expiry instant has passed
//!
//! Only `Valid` is usable. `ensure_valid()` renews with the stored
//! credentials; a session whose token was injected with `set_token()` and
//! never authenticated cannot renew and fails with `CredentialsMissing`.
//!
//! The renewal `Mutex` is held across the authenticator call, so concurrent
//! callers that all observe a stale token trigger one request; the rest wait
//! and reuse its result. A failed renewal leaves the previous token in place.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_EXPIRY_MARGIN;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::token::{Authenticator, Token};

/// Validity of the session token at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    NearExpiry,
    Expired,
}

impl TokenState {
    /// Classify `token` at `now` against `margin`.
    pub fn of(token: Option<&Token>, now: SystemTime, margin: Duration) -> Self {
        let Some(token) = token else {
            return TokenState::Absent;
        };
        let remaining = token.seconds_remaining(now);
        if remaining <= 0.0 {
            TokenState::Expired
        } else if remaining <= margin.as_secs_f64() {
            TokenState::NearExpiry
        } else {
            TokenState::Valid
        }
    }

    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::Absent => "absent",
            TokenState::Valid => "valid",
            TokenState::NearExpiry => "near_expiry",
            TokenState::Expired => "expired",
        }
    }
}

/// Read-only snapshot of token expiry.
///
/// `expires_in_seconds` is negative once the token has expired.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryInfo {
    pub has_token: bool,
    pub is_valid: bool,
    pub is_expired: bool,
    pub expires_at: Option<SystemTime>,
    pub expires_in_seconds: f64,
    pub expires_in_minutes: f64,
}

#[derive(Default)]
struct SessionState {
    token: Option<Token>,
    credentials: Option<Credentials>,
}

/// Token holder with automatic renewal.
pub struct AuthSession {
    authenticator: Arc<dyn Authenticator>,
    state: RwLock<SessionState>,
    renewal: Mutex<()>,
    margin: Duration,
}

impl AuthSession {
    /// Create an empty session using the default 60 second margin.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self::with_margin(authenticator, DEFAULT_EXPIRY_MARGIN)
    }

    /// Create an empty session renewing tokens `margin` before expiry.
    pub fn with_margin(authenticator: Arc<dyn Authenticator>, margin: Duration) -> Self {
        Self {
            authenticator,
            state: RwLock::new(SessionState::default()),
            renewal: Mutex::new(()),
            margin,
        }
    }

    /// Margin used by `ensure_valid()` and `expiry_info()`.
    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Obtain a fresh token and remember the identity for later renewal.
    ///
    /// Always overwrites the stored token and credentials on success. On
    /// failure nothing is changed and the error is returned as is.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token> {
        let credentials = Credentials::new(username, password)?;
        let _renewal = self.renewal.lock().await;
        self.authenticate_locked(credentials).await
    }

    /// Caller must hold the renewal lock.
    async fn authenticate_locked(&self, credentials: Credentials) -> Result<Token> {
        info!("attempting authentication");

        let response = match self.authenticator.authenticate(&credentials).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "authentication failed");
                return Err(e);
            }
        };

        let token = Token::from_response(response, SystemTime::now());
        info!(
            token_type = token.token_type(),
            expires_in_secs = token.seconds_remaining(token.issued_at()),
            "authentication successful"
        );

        let mut state = self.state.write().await;
        state.token = Some(token.clone());
        state.credentials = Some(credentials);
        Ok(token)
    }

    /// Store a token obtained elsewhere. Credentials are left untouched.
    pub async fn set_token(&self, token: Token) {
        self.state.write().await.token = Some(token);
    }

    /// Drop the token and credentials.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.token = None;
        state.credentials = None;
    }

    /// Current token, valid or not.
    pub async fn token(&self) -> Option<Token> {
        self.state.read().await.token.clone()
    }

    pub async fn has_credentials(&self) -> bool {
        self.state.read().await.credentials.is_some()
    }

    /// Token state against `margin`.
    pub async fn state(&self, margin: Duration) -> TokenState {
        let state = self.state.read().await;
        TokenState::of(state.token.as_ref(), SystemTime::now(), margin)
    }

    /// True only when the token expires more than `margin` from now.
    pub async fn is_valid(&self, margin: Duration) -> bool {
        let state = self.state(margin).await;
        match state {
            TokenState::Valid => true,
            other => {
                debug!(state = other.label(), "token not valid");
                false
            }
        }
    }

    /// Expiry snapshot evaluated against the session margin.
    pub async fn expiry_info(&self) -> ExpiryInfo {
        let state = self.state.read().await;
        let now = SystemTime::now();

        let Some(token) = state.token.as_ref() else {
            return ExpiryInfo {
                has_token: false,
                is_valid: false,
                is_expired: false,
                expires_at: None,
                expires_in_seconds: 0.0,
                expires_in_minutes: 0.0,
            };
        };

        let remaining = token.seconds_remaining(now);
        ExpiryInfo {
            has_token: true,
            is_valid: TokenState::of(Some(token), now, self.margin) == TokenState::Valid,
            is_expired: remaining <= 0.0,
            expires_at: Some(token.expires_at()),
            expires_in_seconds: remaining,
            expires_in_minutes: remaining / 60.0,
        }
    }

    /// Renew the token with the stored credentials unless it is valid.
    ///
    /// At most one renewal runs per session; callers queued behind it
    /// re-check validity and return without a second request.
    pub async fn ensure_valid(&self) -> Result<()> {
        if self.is_valid(self.margin).await {
            return Ok(());
        }

        let _renewal = self.renewal.lock().await;
        if self.is_valid(self.margin).await {
            debug!("token renewed by a concurrent caller");
            return Ok(());
        }

        let credentials = self
            .state
            .read()
            .await
            .credentials
            .clone()
            .ok_or(Error::CredentialsMissing)?;

        info!("token expired or near expiry, re-authenticating");
        self.authenticate_locked(credentials).await?;
        Ok(())
    }

    /// `ensure_valid()` followed by a read of the renewed token.
    pub async fn valid_token(&self) -> Result<Token> {
        self.ensure_valid().await?;
        self.token().await.ok_or(Error::CredentialsMissing)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
