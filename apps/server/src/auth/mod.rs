//! Admin key authentication for operator endpoints.

mod extractor;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::{AdminAuth, AuthError};

/// Operator key guarding the admin audit endpoints.
///
/// `Debug` prints `[REDACTED]`; the value is only reachable through
/// [`AdminKey::verify`].
#[derive(Clone)]
pub struct AdminKey(Option<SecretString>);

impl AdminKey {
    /// Create a new AdminKey from an optional string.
    pub fn new(key: Option<String>) -> Self {
        Self(key.map(SecretString::from))
    }

    /// Whether a key is configured at all.
    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Compare the provided key with the stored one in constant time.
    ///
    /// Always false when no key is configured.
    pub fn verify(&self, provided: &str) -> bool {
        match &self.0 {
            Some(secret) => secret
                .expose_secret()
                .as_bytes()
                .ct_eq(provided.as_bytes())
                .into(),
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "AdminKey([REDACTED])"),
            None => write!(f, "AdminKey(None)"),
        }
    }
}
