use std::fmt;

use tracing::{error, info, warn};

use super::session::UserIdentity;
use super::{AuthError, TokenPair};
use crate::api::{ApiClient, ApiError};

/// Email/password pair typed into a sign-in form. Never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.email.trim().is_empty() {
            return Err(AuthError::InvalidInput("email is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity and tokens produced by a successful credential check
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub identity: UserIdentity,
    pub tokens: TokenPair,
}

/// Exchanges credentials for tokens and resolves the user's profile.
/// Makes the two outbound calls and nothing else; persisting the result is
/// the caller's job.
#[derive(Clone)]
pub struct CredentialVerifier {
    api: ApiClient,
}

impl CredentialVerifier {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn verify(&self, credentials: &Credentials) -> Result<VerifiedIdentity, AuthError> {
        credentials.validate()?;
        let email = credentials.email.trim();

        let response = self
            .api
            .obtain_token_pair(email, &credentials.password)
            .await
            .map_err(|e| match e {
                // Accepted, but not in a shape we can read tokens from
                ApiError::UnexpectedBody(detail) => {
                    error!(error = %detail, "Token endpoint returned an unreadable body");
                    AuthError::Configuration(format!("unreadable token response: {}", detail))
                }
                e => {
                    warn!(email = %email, error = %e, "Credential exchange rejected");
                    AuthError::authentication(&e)
                }
            })?;

        let (access, refresh) = match (response.access, response.refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                (access, refresh)
            }
            (access, refresh) => {
                error!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "Token endpoint succeeded without both tokens"
                );
                return Err(AuthError::Configuration(
                    "token response is missing the access or refresh token".to_string(),
                ));
            }
        };

        let profile = self.api.fetch_profile(&access).await.map_err(|e| {
            warn!(email = %email, error = %e, "Profile fetch failed after token exchange");
            AuthError::authentication(&e)
        })?;

        let tokens = TokenPair::new(access, refresh)?;
        let identity = UserIdentity::from_profile(profile, email);

        info!(user_id = %identity.id, "Credentials verified");
        Ok(VerifiedIdentity { identity, tokens })
    }
}
