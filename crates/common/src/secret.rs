//! Redacting wrapper for passwords and signing secrets

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value: redacted in Debug/Display, wiped from memory on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Keep the borrow short and never log it.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// True when the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_redacted_in_debug_and_display() {
        let password = Secret::from("hunter2");
        assert_eq!(format!("{password:?}"), "[REDACTED]");
        assert_eq!(password.to_string(), "[REDACTED]");
    }

    #[test]
    fn expose_returns_inner_value() {
        let secret = Secret::new(String::from("hash-secret"));
        assert_eq!(secret.expose(), "hash-secret");
    }

    #[test]
    fn blank_detection() {
        assert!(Secret::from("").is_blank());
        assert!(Secret::from("  \t").is_blank());
        assert!(!Secret::from("k1").is_blank());
    }

    #[test]
    fn clone_is_independent() {
        let original = Secret::from("k1");
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.expose(), "k1");
    }
}
