//! Pathway session core.
//!
//! Signs users in against the Pathway backend, keeps their access tokens
//! fresh, and forces a sign-out when a refresh is rejected. Framework
//! independent: a web layer calls [`SessionManager::observe`] with the
//! session id from its cookie and acts on the [`Observation`].
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use pathway_core::{AuthConfig, Credentials, MemoryStore, Observation, SessionManager};
//!
//! let config = AuthConfig::from_env()?;
//! let manager = SessionManager::new(config, Arc::new(MemoryStore::new()))?;
//!
//! let record = manager.sign_in(&Credentials::new("a@b.com", "x")).await?;
//! match manager.observe(record.id()).await {
//!     Observation::Authenticated(view) => println!("hello {}", view.identity.display_name),
//!     Observation::SignOut(redirect) => println!("go to {}", redirect.location),
//!     Observation::Anonymous => println!("please sign in"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, Credentials, Observation, RefreshLocks, SessionManager, SessionRecord, SessionState,
    SessionView, SignOutRedirect, TokenPair, UserIdentity,
};
pub use config::{AuthConfig, EntryPoints};
pub use guard::{RouteDecision, RouteGuard};
pub use store::{MemoryStore, SealedFileStore, SessionStore};
