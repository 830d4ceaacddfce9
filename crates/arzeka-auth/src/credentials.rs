//! Username/password identity used for token acquisition
//!
//! Credentials live only in memory, inside the `AuthSession` that
//! authenticated with them. They are replaced wholesale on every successful
//! `authenticate()` and are never serialized or logged. The password is
//! wrapped in `Secret`; Debug output shows neither field.

use std::fmt;

use common::Secret;

use crate::error::{Error, Result};

/// Identity presented to the token endpoint.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Secret<String>,
}

impl Credentials {
    /// Build credentials, rejecting an empty username or password.
    pub fn new(username: impl Into<String>, password: impl Into<Secret<String>>) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.trim().is_empty() {
            return Err(Error::Validation(
                "username must be a non-empty string".into(),
            ));
        }
        if password.is_blank() {
            return Err(Error::Validation(
                "password must be a non-empty string".into(),
            ));
        }

        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.expose()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"[REDACTED]")
            .field("password", &self.password)
            .finish()
    }
}
