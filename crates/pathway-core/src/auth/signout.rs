use serde::Serialize;

use super::session::{SessionError, SessionState};
use crate::config::EntryPoints;

/// Why a session was ended without the user asking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignOutReason {
    SessionExpired,
}

impl SignOutReason {
    /// Value placed in the `error` query parameter of the sign-in page
    pub fn code(&self) -> &'static str {
        match self {
            SignOutReason::SessionExpired => "SessionExpired",
        }
    }
}

impl From<SessionError> for SignOutReason {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::RefreshFailed => SignOutReason::SessionExpired,
        }
    }
}

/// Where to send the user after a forced sign-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignOutRedirect {
    pub location: String,
    pub reason: SignOutReason,
}

/// Contextual banner for the sign-in page, picked from its query string.
///
/// This parses what other pages put on the sign-in URL: `error` comes from
/// [`ForcedSignOut::redirect`], `registered=true` from the application's
/// registration page once an account is created. The session layer only
/// produces the former.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInNotice {
    SessionExpired,
    Registered,
}

impl SignInNotice {
    pub fn from_query(error: Option<&str>, registered: Option<&str>) -> Option<Self> {
        if error == Some(SignOutReason::SessionExpired.code()) {
            Some(SignInNotice::SessionExpired)
        } else if registered == Some("true") {
            Some(SignInNotice::Registered)
        } else {
            None
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SignInNotice::SessionExpired => "Your session has expired. Please log in again.",
            SignInNotice::Registered => "Registration successful! Please log in.",
        }
    }
}

/// Detects sessions that can no longer be used and names the
/// re-authentication entry point. Invalidating the record is left to the
/// session manager, which owns it.
#[derive(Debug, Clone)]
pub struct ForcedSignOut {
    sign_in_path: String,
}

impl ForcedSignOut {
    pub fn new(entry_points: &EntryPoints) -> Self {
        Self {
            sign_in_path: entry_points.sign_in.clone(),
        }
    }

    pub fn check(&self, state: &SessionState) -> Option<SignOutRedirect> {
        match state {
            SessionState::Errored(record) => record.error().map(|e| self.redirect(e.into())),
            _ => None,
        }
    }

    pub fn redirect(&self, reason: SignOutReason) -> SignOutRedirect {
        let separator = if self.sign_in_path.contains('?') { '&' } else { '?' };
        SignOutRedirect {
            location: format!("{}{}error={}", self.sign_in_path, separator, reason.code()),
            reason,
        }
    }
}
