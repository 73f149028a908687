use tracing::{debug, warn};

use super::{AuthError, TokenPair};
use crate::api::ApiClient;

/// Trades a refresh token for a new [`TokenPair`].
///
/// A rejected refresh is terminal for the session and is not retried here;
/// retry policy belongs to the caller.
#[derive(Clone)]
pub struct RefreshExecutor {
    api: ApiClient,
}

impl RefreshExecutor {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn refresh(&self, current: &TokenPair) -> Result<TokenPair, AuthError> {
        let response = self
            .api
            .refresh_access_token(current.refresh_token())
            .await
            .map_err(|e| {
                if e.is_rejection() {
                    warn!(error = %e, "Refresh endpoint rejected the refresh token");
                } else {
                    warn!(error = %e, "Refresh request failed");
                }
                AuthError::refresh(&e)
            })?;

        let rotated = response.refresh.is_some();
        let tokens = current.rotate(response.access, response.refresh)?;

        debug!(
            rotated,
            expires_at_ms = tokens.access_token_expires_at_ms(),
            "Access token refreshed"
        );
        Ok(tokens)
    }
}
