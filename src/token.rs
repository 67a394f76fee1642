//! Access token state and the clock used to judge expiry.

use serde::Deserialize;
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tokens are considered expired this long before the server says so.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock {
    now: Arc<AtomicU64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_millis)),
        }
    }

    pub fn set(&self, now_millis: u64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `result` payload of `GET /v1.0/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, relative to the response.
    #[serde(default)]
    pub expire_time: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// A token together with its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: u64,
    refresh_token: Option<String>,
    uid: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("uid", &self.uid)
            .finish()
    }
}

impl AccessToken {
    /// Anchor a grant's relative lifetime at `now_millis`.
    pub fn from_grant(grant: TokenGrant, now_millis: u64) -> Self {
        Self {
            token: grant.access_token,
            expires_at: now_millis.saturating_add(grant.expire_time.saturating_mul(1000)),
            refresh_token: grant.refresh_token,
            uid: grant.uid,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Absolute expiry in ms since epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// `now < expiry - margin`
    pub fn is_usable_at(&self, now_millis: u64) -> bool {
        let margin = TOKEN_EXPIRY_MARGIN.as_millis() as u64;
        now_millis < self.expires_at.saturating_sub(margin)
    }
}

/// Token cache state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenState {
    #[default]
    Unauthenticated,
    Authenticated(AccessToken),
}

impl TokenState {
    /// The cached token, if it may still be used at `now_millis`.
    pub fn usable_at(&self, now_millis: u64) -> Option<&AccessToken> {
        match self {
            TokenState::Authenticated(token) if token.is_usable_at(now_millis) => Some(token),
            _ => None,
        }
    }
}
