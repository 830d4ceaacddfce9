//! Shared types for the Arzeka payment client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
