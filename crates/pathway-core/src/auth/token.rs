//! Token clock: access-token expiry decoding and refresh-window checks.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Buffer before expiry at which a refresh is triggered (60 seconds).
/// Keeps a request from racing a token that expires mid-flight.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<f64>,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decode the `exp` claim of a JWT into epoch milliseconds.
///
/// The signature is not checked; the backend is the only party holding the
/// signing key, and this is used purely to schedule refreshes.
pub fn decode_expiry(token: &str) -> Result<i64, AuthError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    let claim: ExpiryClaim = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not a JSON object: {}", e)))?;

    match claim.exp {
        Some(exp) if exp.is_finite() && exp >= 0.0 => Ok((exp * 1000.0) as i64),
        Some(_) => Err(AuthError::MalformedToken("exp claim out of range".to_string())),
        None => Err(AuthError::MalformedToken("missing exp claim".to_string())),
    }
}

/// True once `now_ms` has reached the start of the refresh window
/// (`expires_at_ms - buffer_ms`).
pub fn is_expiring_soon_at(now_ms: i64, expires_at_ms: i64, buffer_ms: i64) -> bool {
    now_ms >= expires_at_ms.saturating_sub(buffer_ms)
}

/// [`is_expiring_soon_at`] evaluated against the wall clock
pub fn is_expiring_soon(expires_at_ms: i64, buffer_ms: i64) -> bool {
    is_expiring_soon_at(now_ms(), expires_at_ms, buffer_ms)
}

/// Access/refresh token pair.
///
/// `access_token_expires_at_ms` is always decoded from the access token
/// itself, so the two cannot drift apart.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
    access_token_expires_at_ms: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String) -> Result<Self, AuthError> {
        let access_token_expires_at_ms = decode_expiry(&access_token)?;
        Ok(Self {
            access_token,
            refresh_token,
            access_token_expires_at_ms,
        })
    }

    /// Build the pair that follows a refresh. A missing rotated refresh
    /// token keeps the current one.
    pub fn rotate(&self, access_token: String, refresh_token: Option<String>) -> Result<Self, AuthError> {
        let refresh_token = refresh_token.unwrap_or_else(|| self.refresh_token.clone());
        Self::new(access_token, refresh_token)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn access_token_expires_at_ms(&self) -> i64 {
        self.access_token_expires_at_ms
    }

    pub fn is_expiring_soon(&self, buffer: Duration) -> bool {
        is_expiring_soon(self.access_token_expires_at_ms, buffer.as_millis() as i64)
    }

    /// Seconds left on the access token (for display)
    pub fn seconds_until_expiry(&self) -> i64 {
        ((self.access_token_expires_at_ms - now_ms()) / 1000).max(0)
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_token_expires_at_ms", &self.access_token_expires_at_ms)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
