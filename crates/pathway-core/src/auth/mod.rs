//! Authentication module: the session and token lifecycle.
//!
//! This module provides:
//! - `CredentialVerifier`: exchanges an email/password pair for tokens and a profile
//! - `token`: access-token expiry decoding and refresh-window checks
//! - `RefreshExecutor`: trades a refresh token for a new token pair
//! - `SessionManager`: the read-triggered refresh state machine
//! - `ForcedSignOut`: turns errored sessions into a sign-in redirect
//!
//! Access tokens are refreshed lazily, 60 seconds before they expire by default.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod refresh;
pub mod session;
pub mod signout;
pub mod token;

pub use credentials::{CredentialVerifier, Credentials, VerifiedIdentity};
pub use error::AuthError;
pub use manager::{Observation, RefreshLocks, SessionManager};
pub use refresh::RefreshExecutor;
pub use session::{SessionError, SessionRecord, SessionState, SessionView, UserIdentity};
pub use signout::{ForcedSignOut, SignInNotice, SignOutReason, SignOutRedirect};
pub use token::{decode_expiry, is_expiring_soon, is_expiring_soon_at, TokenPair, DEFAULT_REFRESH_BUFFER};
