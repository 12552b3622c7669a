//! Seen-signature cache
//!
//! Remembers every accepted signature until the moment its timestamp falls
//! out of the freshness window. After that the window check alone rejects
//! it, so the entry can go.

use super::AuthError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ReplayGuard {
    /// signature -> instant after which it is stale anyway
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `signature`, failing if it was already used
    pub fn check_and_record(
        &self,
        signature: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = seen.len();
        seen.retain(|_, expiry| *expiry >= now);
        if seen.len() != before {
            debug!("[AUTH] Pruned {} expired signatures", before - seen.len());
        }

        if seen.contains_key(signature) {
            return Err(AuthError::Replayed);
        }
        seen.insert(signature.to_string(), expires_at);
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
