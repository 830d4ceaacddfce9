//! Arzeka authentication and request-signing library
//!
//! Holds the access-token lifecycle for the Faso Arzeka payment gateway and
//! the signature engine used to protect payment parameters. The crate has no
//! dependency on the payment client; it can be tested and used on its own.
//!
//! Token flow:
//! 1. Caller runs `AuthSession::authenticate()` with a username and password
//! 2. The `Authenticator` (normally `HttpAuthenticator`) calls `auth/getToken`
//! 3. The returned `Token` and the `Credentials` are stored in the session
//! 4. Before every protected call, `AuthSession::ensure_valid()` renews the
//!    token with the stored credentials once it is inside the expiry margin
//!
//! Signatures: `signature::generate()` hashes the `|`-joined payment fields
//! plus the secret with SHA-256 and returns standard base64.

pub mod constants;
pub mod credentials;
pub mod error;
pub mod session;
pub mod signature;
pub mod token;

pub use constants::*;
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use session::{AuthSession, ExpiryInfo, TokenState};
pub use signature::{SignatureField, SignaturePayload, build_payload, generate, validate};
pub use token::{Authenticator, HttpAuthenticator, Token, TokenResponse};
