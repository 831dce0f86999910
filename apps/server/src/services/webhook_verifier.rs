//! Webhook signature verification.
//!
//! Deliveries are signed with HMAC-SHA256 over `"{msg_id}.{timestamp}.{body}"`
//! using the base64-decoded part of a `whsec_` secret. The signature header
//! carries one or more space-separated `v1,<base64>` entries so the provider
//! can rotate secrets; any matching entry accepts the delivery.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Reasons a delivery fails verification.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,

    #[error("timestamp is outside the {0}s tolerance window")]
    TimestampOutOfTolerance(i64),

    #[error("no signature in the header matches the payload")]
    NoMatchingSignature,
}

/// Signing secret could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("webhook signing secret is not valid base64")]
pub struct InvalidSecret;

/// Verifies signed webhook deliveries.
///
/// Holds only the decoded key; share it across workers behind `web::Data`.
pub struct WebhookVerifier {
    key: SecretSlice<u8>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    /// Build a verifier from a `whsec_` secret.
    pub fn new(secret: &SecretString, tolerance_secs: i64) -> Result<Self, InvalidSecret> {
        let raw = secret.expose_secret();
        let encoded = raw.strip_prefix(SECRET_PREFIX).unwrap_or(raw);
        let key = STANDARD.decode(encoded).map_err(|_| InvalidSecret)?;

        Ok(Self {
            key: SecretSlice::from(key),
            tolerance_secs,
        })
    }

    /// Compute the `v1,<base64>` signature for a delivery.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        let digest = self.digest(msg_id, &timestamp.to_string(), body);
        format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(digest))
    }

    /// Verify a delivery against its transport headers.
    pub fn verify(
        &self,
        msg_id: &str,
        timestamp: &str,
        signature_header: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), VerifyError> {
        let sent_at = timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| VerifyError::InvalidTimestamp)?;

        if now.timestamp().abs_diff(sent_at) > self.tolerance_secs.unsigned_abs() {
            return Err(VerifyError::TimestampOutOfTolerance(self.tolerance_secs));
        }

        let expected = self.digest(msg_id, timestamp.trim(), body);

        let matched = signature_header
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, encoded)| STANDARD.decode(encoded).ok())
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));

        if matched {
            Ok(())
        } else {
            Err(VerifyError::NoMatchingSignature)
        }
    }

    fn digest(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .expect("HMAC accepts keys of any length");
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookVerifier([REDACTED], tolerance={}s)", self.tolerance_secs)
    }
}
