use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Persisted OAuth credential. Serialized as the on-disk token artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_unix: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenSet {
    const EXPIRY_SKEW_SECS: u64 = 30;

    pub fn is_expired(&self, now: SystemTime) -> bool {
        let Some(expires_at) = self.expires_at_unix else {
            return false;
        };

        let Ok(duration) = now.duration_since(UNIX_EPOCH) else {
            return false;
        };

        duration.as_secs().saturating_add(Self::EXPIRY_SKEW_SECS) >= expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Usable on an outbound call right now, without renewal. An empty
    /// access token is never fresh, whatever its expiry says.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    /// A credential is usable when it carries an access token and is either
    /// still fresh or renewable through a refresh token.
    pub fn is_valid(&self, now: SystemTime) -> bool {
        !self.access_token.is_empty() && (!self.is_expired(now) || self.has_refresh_token())
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }
}
