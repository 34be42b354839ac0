//! Access token lifecycle

use crate::{OmniKassaError, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Deserializer};
use std::sync::{PoisonError, RwLock};

/// Default safety margin before a token's expiry at which it is no longer used
pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 60;

/// Short-lived bearer credential issued by the refresh exchange
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    /// Bearer token value
    #[serde(rename = "token")]
    value: String,
    /// Moment the gateway stops accepting the token
    #[serde(rename = "validUntil", deserialize_with = "deserialize_valid_until")]
    valid_until: DateTime<Utc>,
    /// Lifetime granted at issue time
    #[serde(rename = "durationInMillis", deserialize_with = "deserialize_lifetime")]
    lifetime_seconds: i64,
}

impl AccessToken {
    /// Token with an explicit expiry
    pub fn new(value: impl Into<String>, valid_until: DateTime<Utc>, lifetime_seconds: i64) -> Self {
        Self {
            value: value.into(),
            valid_until,
            lifetime_seconds,
        }
    }

    /// Token issued now and valid for `lifetime_seconds`
    pub fn issued_now(value: impl Into<String>, lifetime_seconds: i64) -> Self {
        Self::new(
            value,
            Utc::now() + Duration::seconds(lifetime_seconds),
            lifetime_seconds,
        )
    }

    /// Bearer value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Moment the token expires
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// Lifetime granted at issue time, in seconds
    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_seconds
    }

    /// Whether the token is still usable at `now`, keeping `margin` in reserve
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now.checked_add_signed(margin)
            .map_or(false, |cutoff| cutoff < self.valid_until)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("valid_until", &self.valid_until)
            .field("lifetime_seconds", &self.lifetime_seconds)
            .finish()
    }
}

/// Parse the gateway's expiry timestamp.
///
/// The gateway emits `2016-07-28T13:58:10.000+0000`; RFC 3339 is accepted too.
pub fn parse_valid_until(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OmniKassaError::config(format!("Invalid token expiry '{}': {}", raw, e)))
}

fn deserialize_valid_until<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_valid_until(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_lifetime<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = i64::deserialize(deserializer)?;
    Ok(millis / 1000)
}

/// Owns the current access token and the long-lived refresh token.
///
/// Implementations use interior mutability so a provider can be shared by
/// concurrent operations; [`TokenProvider::set_access_token`] is the only
/// mutation path.
pub trait TokenProvider: Send + Sync {
    /// True if no token was ever set or the held one is (nearly) expired
    fn has_no_valid_access_token(&self) -> bool;

    /// Value of the held token, or [`OmniKassaError::NoTokenAvailable`]
    fn access_token(&self) -> Result<String>;

    /// Refresh token configured at construction
    fn refresh_token(&self) -> String;

    /// Replace the held token unconditionally
    fn set_access_token(&self, token: AccessToken);
}

/// Token provider keeping everything in memory for one client's lifetime
pub struct InMemoryTokenProvider {
    refresh_token: String,
    access_token: RwLock<Option<AccessToken>>,
    expiry_margin: Duration,
}

impl InMemoryTokenProvider {
    /// Provider holding no access token yet
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: RwLock::new(None),
            expiry_margin: Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
        }
    }

    /// Set the safety margin subtracted from the token's expiry.
    ///
    /// A margin too large to represent saturates, so no token is ever valid.
    pub fn with_expiry_margin(mut self, margin: std::time::Duration) -> Self {
        self.expiry_margin = Duration::from_std(margin).unwrap_or(Duration::MAX);
        self
    }

    /// Start with an already issued token
    pub fn with_access_token(self, token: AccessToken) -> Self {
        self.set_access_token(token);
        self
    }

    /// Snapshot of the held token
    pub fn current(&self) -> Option<AccessToken> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for InMemoryTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenProvider")
            .field("refresh_token", &"<redacted>")
            .field("access_token", &self.current())
            .field("expiry_margin", &self.expiry_margin)
            .finish()
    }
}

impl TokenProvider for InMemoryTokenProvider {
    fn has_no_valid_access_token(&self) -> bool {
        match self
            .access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => !token.is_valid_at(Utc::now(), self.expiry_margin),
            None => true,
        }
    }

    fn access_token(&self) -> Result<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| token.value().to_string())
            .ok_or(OmniKassaError::NoTokenAvailable)
    }

    fn refresh_token(&self) -> String {
        self.refresh_token.clone()
    }

    fn set_access_token(&self, token: AccessToken) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }
}
