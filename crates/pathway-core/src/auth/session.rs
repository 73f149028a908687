use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TokenPair;
use crate::api::UserProfile;

/// Number of random bytes in a session id (256 bits)
const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl UserIdentity {
    /// Build the identity from the profile endpoint, falling back to the
    /// email used to sign in when the profile leaves fields out.
    pub fn from_profile(profile: UserProfile, sign_in_email: &str) -> Self {
        let display_name = profile.display_name();
        let email = profile
            .email
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| sign_in_email.to_string());
        let display_name = display_name.unwrap_or_else(|| {
            email.split('@').next().unwrap_or_default().to_string()
        });

        Self {
            id: profile.id.to_string(),
            email,
            display_name,
        }
    }
}

/// Error annotation carried by a session that can no longer be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    RefreshFailed,
}

/// The persisted snapshot of one user's authentication state.
///
/// Only [`SessionManager`](super::SessionManager) creates or mutates
/// records; everyone else gets clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    id: String,
    identity: UserIdentity,
    tokens: TokenPair,
    error: Option<SessionError>,
    issued_at: DateTime<Utc>,
}

impl SessionRecord {
    pub(crate) fn issue(identity: UserIdentity, tokens: TokenPair) -> Self {
        let bytes: [u8; SESSION_ID_BYTES] = rand::random();
        Self {
            id: URL_SAFE_NO_PAD.encode(bytes),
            identity,
            tokens,
            error: None,
            issued_at: Utc::now(),
        }
    }

    pub(crate) fn with_tokens(&self, tokens: TokenPair) -> Self {
        Self {
            tokens,
            ..self.clone()
        }
    }

    pub(crate) fn with_error(&self, error: SessionError) -> Self {
        Self {
            error: Some(error),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    pub fn error(&self) -> Option<SessionError> {
        self.error
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Whether the record has outlived the absolute session lifetime
    pub fn is_past_max_age(&self, max_age: Duration) -> bool {
        let age = Utc::now() - self.issued_at;
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => age >= max_age,
            // Larger than chrono can represent: never reached
            Err(_) => false,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            identity: self.identity.clone(),
            access_token: self.tokens.access_token().to_string(),
            error: self.error,
        }
    }
}

/// What a consumer of the session gets to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub identity: UserIdentity,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

/// Result of reading a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Active(SessionRecord),
    Errored(SessionRecord),
}

impl SessionState {
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Active(record) | SessionState::Errored(record) => Some(record),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn view(&self) -> Option<SessionView> {
        self.record().map(SessionRecord::view)
    }
}

/// Record with a far-future access token, for store and manager tests
#[cfg(test)]
pub(crate) fn sample_record() -> SessionRecord {
    let identity = UserIdentity {
        id: "1".into(),
        email: "a@b.com".into(),
        display_name: "a".into(),
    };
    // {"exp": 4102444800} (2100-01-01)
    let tokens = TokenPair::new("h.eyJleHAiOiA0MTAyNDQ0ODAwfQ.s".into(), "r1".into())
        .expect("sample token should decode");
    SessionRecord::issue(identity, tokens)
}
