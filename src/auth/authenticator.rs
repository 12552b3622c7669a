//! Credential checks

use super::{AuthError, ReplayGuard};
use chrono::{DateTime, Duration, Utc};
use gate_shared::{signer, timing};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Validates API keys and request signatures
pub struct Authenticator {
    secret: Option<String>,
    /// SHA-256 of the expected key; comparing digests keeps the comparison
    /// length-independent
    api_key_digest: Option<[u8; 32]>,
    window: Duration,
    replay_guard: Option<ReplayGuard>,
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl Authenticator {
    /// Empty strings count as "not configured"
    pub fn new(secret: Option<String>, api_key: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            api_key_digest: api_key.filter(|k| !k.is_empty()).map(|k| digest(&k)),
            window: Duration::seconds(timing::FRESHNESS_WINDOW_SECS),
            replay_guard: None,
        }
    }

    /// Reject any signature seen before within its freshness window
    pub fn with_replay_guard(mut self) -> Self {
        self.replay_guard = Some(ReplayGuard::new());
        self
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key_digest.is_some()
    }

    /// Constant-time check of a static API key
    pub fn check_api_key(&self, provided: &str) -> Result<(), AuthError> {
        let expected = self
            .api_key_digest
            .as_ref()
            .ok_or(AuthError::NotConfigured("GATE_API_KEY"))?;

        if bool::from(digest(provided)[..].ct_eq(&expected[..])) {
            Ok(())
        } else {
            Err(AuthError::BadApiKey)
        }
    }

    /// Check a signed request against the current time
    pub fn check_signature(
        &self,
        timestamp: &str,
        signature: &str,
        path: &str,
    ) -> Result<(), AuthError> {
        self.check_signature_at(Utc::now(), timestamp, signature, path)
    }

    /// Check a signed request as if received at `now`
    pub fn check_signature_at(
        &self,
        now: DateTime<Utc>,
        timestamp: &str,
        signature: &str,
        path: &str,
    ) -> Result<(), AuthError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(AuthError::NotConfigured("GATE_API_SECRET"))?;

        let signed_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| AuthError::MalformedTimestamp)?
            .with_timezone(&Utc);

        // Reject both stale and future-dated timestamps
        let age = now.signed_duration_since(signed_at);
        if age > self.window || age < -self.window {
            return Err(AuthError::Stale {
                age_secs: age.num_seconds(),
            });
        }

        let expected = signer::sign(timestamp, path, secret);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Err(AuthError::BadSignature);
        }

        if let Some(guard) = &self.replay_guard {
            guard.check_and_record(signature, signed_at + self.window, now)?;
        }

        Ok(())
    }
}
