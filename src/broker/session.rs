//! Access token and account state for one Tradovate login.

use chrono::{DateTime, Duration, Utc};

/// Tokens are renewed this long before their expiry.
pub const RENEWAL_MARGIN_SECS: i64 = 60;

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// True once the token is within the renewal margin of its expiry.
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= Duration::seconds(RENEWAL_MARGIN_SECS)
    }
}

/// Mutable login state, guarded by the client's renewal lock.
#[derive(Debug, Default)]
pub struct Session {
    pub token: Option<AccessToken>,
    pub account_id: Option<i64>,
}

impl Session {
    /// Start a session, optionally pinned to a configured account.
    pub fn new(account_id: Option<i64>) -> Self {
        Self {
            token: None,
            account_id,
        }
    }

    /// Cached token value, if it is still usable at `now`.
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|token| !token.needs_renewal(now))
            .map(|token| token.value.as_str())
    }
}

/// Credentials and account resolved for one broker call.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub account_id: i64,
}
