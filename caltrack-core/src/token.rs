//! Access token cache with explicit expiry.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CalTrackResult;

/// Tokens are refreshed this long before they actually expire.
pub const REFRESH_BUFFER: Duration = Duration::seconds(60);

/// A token handed out by a refresher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime in seconds, as reported by the token endpoint.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenCache {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The cached token, if it is still good at `now`.
    pub fn current(&self, now: DateTime<Utc>) -> Option<&str> {
        let fresh_until = self.expires_at?.checked_sub_signed(REFRESH_BUFFER)?;
        if now < fresh_until {
            self.access_token.as_deref()
        } else {
            None
        }
    }

    pub fn store(&mut self, now: DateTime<Utc>, token: IssuedToken) {
        // Out-of-range lifetimes saturate instead of overflowing
        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(if token.expires_in > 0 { DateTime::<Utc>::MAX_UTC } else { now });
        debug!(expires_at = %expires_at, "Token stored");
        self.access_token = Some(token.access_token);
        self.expires_at = Some(expires_at);
    }

    pub fn clear(&mut self) {
        self.access_token = None;
        self.expires_at = None;
    }

    /// Return the cached token, running `refresh` first if it is missing or
    /// about to expire. A failed refresh leaves the cache untouched.
    pub async fn get_or_refresh<F, Fut>(&mut self, now: DateTime<Utc>, refresh: F) -> CalTrackResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CalTrackResult<IssuedToken>>,
    {
        if let Some(token) = self.current(now) {
            debug!("Using cached access token");
            return Ok(token.to_string());
        }

        info!("Refreshing access token");
        let issued = refresh().await?;
        let token = issued.access_token.clone();
        self.store(now, issued);
        Ok(token)
    }
}
