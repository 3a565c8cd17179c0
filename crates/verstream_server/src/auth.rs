//! Verification of third-party identity tokens.
//!
//! Login exchanges a bearer issued by an identity provider for a session.
//! The provider is abstracted behind [`IdentityVerifier`], which only has
//! to turn a valid bearer into a stable subject id.
//!
//! ## HMAC Token Format
//!
//! [`HmacIdentityVerifier`] accepts text tokens of the form
//! `{subject}:{issued_at}:{signature}` where `issued_at` is Unix millis and
//! `signature` is the hex-encoded HMAC-SHA256 of `{subject}:{issued_at}`.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Turns a provider-issued bearer into the subject it was issued to.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the subject id, or [`ServerError::Unauthorized`].
    fn verify(&self, bearer: &str, now: SystemTime) -> ServerResult<String>;
}

/// Identity tokens signed with a shared secret.
#[derive(Clone)]
pub struct HmacIdentityVerifier {
    secret: Vec<u8>,
    token_expiry: Duration,
}

impl HmacIdentityVerifier {
    /// Creates a verifier; tokens are valid for one hour.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(60 * 60),
        }
    }

    /// Sets the token lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Issues a token for `subject`.
    pub fn create_token(&self, subject: &str, now: SystemTime) -> ServerResult<String> {
        let payload = format!("{subject}:{}", epoch_millis(now));
        let signature = self.mac(&payload)?.finalize().into_bytes();

        let mut token = payload;
        token.push(':');
        for byte in signature {
            let _ = write!(token, "{byte:02x}");
        }
        Ok(token)
    }

    fn mac(&self, payload: &str) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

impl IdentityVerifier for HmacIdentityVerifier {
    fn verify(&self, bearer: &str, now: SystemTime) -> ServerResult<String> {
        let (payload, signature) = bearer
            .rsplit_once(':')
            .ok_or_else(|| ServerError::Unauthorized("malformed identity token".into()))?;
        let (subject, issued_at) = payload
            .rsplit_once(':')
            .ok_or_else(|| ServerError::Unauthorized("malformed identity token".into()))?;
        let issued_at: u64 = issued_at
            .parse()
            .map_err(|_| ServerError::Unauthorized("malformed identity token".into()))?;
        let signature = decode_hex(signature)
            .ok_or_else(|| ServerError::Unauthorized("malformed identity token".into()))?;

        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| ServerError::Unauthorized("invalid signature".into()))?;

        let expiry = self.token_expiry.as_millis() as u64;
        if epoch_millis(now) > issued_at.saturating_add(expiry) {
            return Err(ServerError::Unauthorized("identity token expired".into()));
        }
        if subject.is_empty() {
            return Err(ServerError::Unauthorized("empty subject".into()));
        }
        Ok(subject.to_string())
    }
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
