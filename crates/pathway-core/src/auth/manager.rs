//! Session state machine.
//!
//! Every read re-checks the access token against the refresh buffer. There
//! is no background timer: a session that nobody reads is never refreshed.
//!
//! ```text
//! Unauthenticated --sign_in ok--> Active
//! Active --read, fresh--> Active
//! Active --read, expiring--> (refresh) --ok--> Active
//!                                      --err--> Errored
//! Errored --observe--> Unauthenticated
//! Active/Errored --sign_out--> Unauthenticated
//! ```
//!
//! Refreshes are single-flight per session id: concurrent readers of an
//! expiring session queue on one lock, and everyone after the first finds
//! the already-refreshed record when they get it. Managers that share a
//! store must also share their [`RefreshLocks`], see
//! [`SessionManager::with_refresh_locks`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::credentials::{CredentialVerifier, Credentials};
use super::refresh::RefreshExecutor;
use super::session::{SessionError, SessionRecord, SessionState, SessionView};
use super::signout::{ForcedSignOut, SignOutRedirect};
use super::AuthError;
use crate::api::{ApiClient, ApiError};
use crate::config::AuthConfig;
use crate::store::SessionStore;

/// What a caller asking for "the current session" gets back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Anonymous,
    Authenticated(SessionView),
    /// The session was destroyed; send the user here to sign in again
    SignOut(SignOutRedirect),
}

pub struct SessionManager {
    config: AuthConfig,
    verifier: CredentialVerifier,
    refresher: RefreshExecutor,
    sign_out: ForcedSignOut,
    store: Arc<dyn SessionStore>,
    locks: RefreshLocks,
}

impl SessionManager {
    pub fn new(config: AuthConfig, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout)?;
        Ok(Self::with_client(config, api, store))
    }

    /// Build a manager around an existing client, sharing its connection pool
    pub fn with_client(config: AuthConfig, api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            verifier: CredentialVerifier::new(api.clone()),
            refresher: RefreshExecutor::new(api),
            sign_out: ForcedSignOut::new(&config.entry_points),
            config,
            store,
            locks: RefreshLocks::default(),
        }
    }

    /// Coordinate refreshes with other managers over the same store
    pub fn with_refresh_locks(mut self, locks: RefreshLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Handle to this manager's lock table, for sharing with another manager
    pub fn refresh_locks(&self) -> RefreshLocks {
        self.locks.clone()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verify credentials and persist a new active session.
    /// On failure nothing is stored.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SessionRecord, AuthError> {
        let verified = self.verifier.verify(credentials).await?;
        let record = SessionRecord::issue(verified.identity, verified.tokens);

        self.store.save(&record).map_err(|e| {
            error!(error = %e, "Failed to save new session");
            AuthError::Storage(e.to_string())
        })?;

        info!(user_id = %record.identity().id, "Signed in");
        Ok(record)
    }

    /// Read a session, refreshing its access token first if it is inside
    /// the refresh buffer.
    pub async fn read(&self, session_id: &str) -> SessionState {
        let Some(record) = self.load_current(session_id) else {
            return SessionState::Unauthenticated;
        };
        if record.error().is_some() {
            return SessionState::Errored(record);
        }
        if !record.tokens().is_expiring_soon(self.config.refresh_buffer) {
            debug!(user_id = %record.identity().id, "Session token still fresh");
            return SessionState::Active(record);
        }

        let lease = self.locks.lease(session_id);
        let _guard = lease.lock().lock().await;
        self.refresh_if_due(session_id).await
    }

    /// Read a session and carry out a forced sign-out if it has errored
    pub async fn observe(&self, session_id: &str) -> Observation {
        let state = self.read(session_id).await;
        if let Some(redirect) = self.sign_out.check(&state) {
            if let Err(e) = self.discard(session_id) {
                warn!(error = %e, "Failed to remove errored session");
            }
            info!(reason = redirect.reason.code(), "Forced sign-out");
            return Observation::SignOut(redirect);
        }

        match state.view() {
            Some(view) => Observation::Authenticated(view),
            None => Observation::Anonymous,
        }
    }

    /// Explicit sign-out. Unknown ids are ignored.
    pub fn sign_out(&self, session_id: &str) -> Result<()> {
        self.discard(session_id)?;
        info!("Signed out");
        Ok(())
    }

    /// Runs with the session's refresh lock held
    async fn refresh_if_due(&self, session_id: &str) -> SessionState {
        // Another reader may have refreshed (or failed) while we waited
        let Some(record) = self.load_current(session_id) else {
            return SessionState::Unauthenticated;
        };
        if record.error().is_some() {
            return SessionState::Errored(record);
        }
        if !record.tokens().is_expiring_soon(self.config.refresh_buffer) {
            return SessionState::Active(record);
        }

        match self.refresher.refresh(record.tokens()).await {
            Ok(tokens) => {
                let updated = record.with_tokens(tokens);
                self.persist(&updated);
                info!(user_id = %updated.identity().id, "Session refreshed");
                SessionState::Active(updated)
            }
            Err(e) => {
                warn!(user_id = %record.identity().id, error = %e, "Session refresh failed");
                let errored = record.with_error(SessionError::RefreshFailed);
                self.persist(&errored);
                SessionState::Errored(errored)
            }
        }
    }

    /// Save a record produced under the refresh lock. If the store refuses
    /// it, the record is held in the lock table and served from there until
    /// a later read manages to write it back: the refresh may have consumed
    /// the stored refresh token, so the old record must not resurface.
    fn persist(&self, record: &SessionRecord) {
        match self.store.save(record) {
            Ok(()) => self.locks.forget_unsaved(record.id()),
            Err(e) => {
                error!(error = %e, "Failed to save session, keeping it in memory");
                self.locks.hold_unsaved(record.clone());
            }
        }
    }

    fn discard(&self, session_id: &str) -> Result<()> {
        self.locks.forget_unsaved(session_id);
        self.store.remove(session_id)
    }

    /// Load a record, dropping it if it has outlived the session max-age.
    /// Store failures read as "no session".
    fn load_current(&self, session_id: &str) -> Option<SessionRecord> {
        let record = match self.locks.unsaved(session_id) {
            Some(record) => {
                self.write_back(&record);
                record
            }
            None => match self.store.load(session_id) {
                Ok(record) => record?,
                Err(e) => {
                    warn!(error = %e, "Failed to load session");
                    return None;
                }
            },
        };

        if record.is_past_max_age(self.config.session_max_age) {
            info!(user_id = %record.identity().id, "Session past max age");
            if let Err(e) = self.discard(session_id) {
                warn!(error = %e, "Failed to remove expired session");
            }
            return None;
        }
        Some(record)
    }

    /// Retry saving a record that an earlier refresh could not persist
    fn write_back(&self, record: &SessionRecord) {
        match self.store.save(record) {
            Ok(()) => {
                info!(user_id = %record.identity().id, "Unsaved session written back");
                self.locks.forget_unsaved_if(record);
            }
            Err(e) => debug!(error = %e, "Session still not saved"),
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

// ============================================================================
// Refresh locks
// ============================================================================

/// Per-session async locks, created on demand and dropped once the last
/// holder lets go. Also holds records whose save failed after a refresh.
///
/// Cloning shares the table. Hand one table to every manager that works
/// on the same store, or each will refresh independently.
#[derive(Clone, Default)]
pub struct RefreshLocks {
    inner: Arc<StdMutex<LockTable>>,
}

#[derive(Default)]
struct LockTable {
    locks: HashMap<String, Arc<Mutex<()>>>,
    unsaved: HashMap<String, SessionRecord>,
}

impl RefreshLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lease(&self, session_id: &str) -> LockLease<'_> {
        let lock = self
            .table()
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        LockLease {
            locks: self,
            session_id: session_id.to_string(),
            lock,
        }
    }

    fn release(&self, session_id: &str, lock: &Arc<Mutex<()>>) {
        let mut table = self.table();
        // One reference in the map, one held by the lease being dropped
        if Arc::strong_count(lock) <= 2 {
            table.locks.remove(session_id);
        }
    }

    fn unsaved(&self, session_id: &str) -> Option<SessionRecord> {
        self.table().unsaved.get(session_id).cloned()
    }

    fn hold_unsaved(&self, record: SessionRecord) {
        self.table().unsaved.insert(record.id().to_string(), record);
    }

    fn forget_unsaved(&self, session_id: &str) {
        self.table().unsaved.remove(session_id);
    }

    /// Drop the held record only if nothing newer replaced it meanwhile
    fn forget_unsaved_if(&self, record: &SessionRecord) {
        let mut table = self.table();
        if table.unsaved.get(record.id()) == Some(record) {
            table.unsaved.remove(record.id());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().locks.len()
    }
}

/// Keeps a session's lock alive in the table. Dropping it (including when a
/// read is cancelled mid-refresh) releases the table entry.
struct LockLease<'a> {
    locks: &'a RefreshLocks,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl LockLease<'_> {
    fn lock(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.session_id, &self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::sample_record;
    use crate::store::MemoryStore;

    fn manager(store: Arc<MemoryStore>) -> SessionManager {
        let config = AuthConfig::new("http://127.0.0.1:9", "secret");
        SessionManager::new(config, store).expect("manager should build")
    }

    #[tokio::test]
    async fn test_read_unknown_session_is_unauthenticated() {
        let manager = manager(Arc::new(MemoryStore::new()));
        assert_eq!(manager.read("nope").await, SessionState::Unauthenticated);
        assert_eq!(manager.observe("nope").await, Observation::Anonymous);
    }

    #[tokio::test]
    async fn test_fresh_session_is_returned_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let record = sample_record();
        store.save(&record).expect("save");

        let manager = manager(store);
        assert_eq!(
            manager.read(record.id()).await,
            SessionState::Active(record.clone())
        );
        assert_eq!(
            manager.observe(record.id()).await,
            Observation::Authenticated(record.view())
        );
        assert_eq!(manager.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_errored_session_is_destroyed_on_observe() {
        let store = Arc::new(MemoryStore::new());
        let record = sample_record().with_error(SessionError::RefreshFailed);
        store.save(&record).expect("save");

        let manager = manager(store.clone());
        assert!(matches!(
            manager.read(record.id()).await,
            SessionState::Errored(_)
        ));
        // Reading alone does not destroy it
        assert_eq!(store.len(), 1);

        match manager.observe(record.id()).await {
            Observation::SignOut(redirect) => {
                assert_eq!(redirect.location, "/auth/login?error=SessionExpired")
            }
            other => panic!("expected sign-out, got {:?}", other),
        }
        assert!(store.is_empty());
        assert_eq!(manager.read(record.id()).await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_session_past_max_age_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let record = sample_record();
        store.save(&record).expect("save");

        let config = AuthConfig::new("http://127.0.0.1:9", "secret")
            .with_session_max_age(std::time::Duration::ZERO);
        let manager = SessionManager::new(config, store.clone()).expect("manager");

        assert_eq!(manager.read(record.id()).await, SessionState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sign_out_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let record = sample_record();
        store.save(&record).expect("save");

        let manager = manager(store.clone());
        manager.sign_out(record.id()).expect("sign out");
        manager.sign_out(record.id()).expect("sign out again");
        assert!(store.is_empty());
    }

    #[test]
    fn test_lock_table_entries_are_released() {
        let locks = RefreshLocks::default();
        {
            let first = locks.lease("s1");
            let second = locks.lease("s1");
            assert!(Arc::ptr_eq(&first.lock, &second.lock));
            assert_eq!(locks.len(), 1);
            drop(first);
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_cloned_lock_tables_hand_out_the_same_lock() {
        let locks = RefreshLocks::new();
        let shared = locks.clone();
        let first = locks.lease("s1");
        let second = shared.lease("s1");
        assert!(Arc::ptr_eq(&first.lock, &second.lock));
    }

    #[test]
    fn test_unsaved_record_is_only_forgotten_if_unchanged() {
        let locks = RefreshLocks::new();
        let record = sample_record();
        let newer = record.with_error(SessionError::RefreshFailed);

        locks.hold_unsaved(newer.clone());
        locks.forget_unsaved_if(&record);
        assert_eq!(locks.unsaved(record.id()), Some(newer.clone()));

        locks.forget_unsaved_if(&newer);
        assert_eq!(locks.unsaved(record.id()), None);
    }

    #[tokio::test]
    async fn test_unsaved_record_is_served_and_written_back() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(store.clone());
        let record = sample_record();
        manager.locks.hold_unsaved(record.clone());

        assert_eq!(
            manager.read(record.id()).await,
            SessionState::Active(record.clone())
        );
        assert_eq!(store.load(record.id()).expect("load"), Some(record.clone()));
        assert_eq!(manager.locks.unsaved(record.id()), None);

        manager.sign_out(record.id()).expect("sign out");
        assert_eq!(manager.read(record.id()).await, SessionState::Unauthenticated);
    }
}
