use thiserror::Error;

use crate::api::ApiError;

/// Typed failures surfaced by the auth components.
///
/// Transport and HTTP errors never escape the verifier or the refresh
/// executor raw; they are folded into one of these variants first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Session could not be stored: {0}")]
    Storage(String),
}

impl AuthError {
    /// Message suitable for showing inline next to a sign-in form
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "Email and password are required.",
            AuthError::AuthenticationFailed(_) | AuthError::Configuration(_) => {
                "Invalid email or password. Please try again."
            }
            AuthError::MalformedToken(_) | AuthError::Storage(_) => {
                "An unexpected error occurred during sign-in. Please try again."
            }
            AuthError::RefreshFailed(_) => "Your session has expired. Please sign in again.",
        }
    }

    pub(crate) fn authentication(err: &ApiError) -> Self {
        if err.is_timeout() {
            AuthError::AuthenticationFailed("authentication request timed out".to_string())
        } else {
            AuthError::AuthenticationFailed(err.to_string())
        }
    }

    pub(crate) fn refresh(err: &ApiError) -> Self {
        if err.is_timeout() {
            AuthError::RefreshFailed("refresh request timed out".to_string())
        } else {
            AuthError::RefreshFailed(err.to_string())
        }
    }
}
