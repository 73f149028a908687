//! Session persistence.
//!
//! The session manager treats storage as opaque: anything implementing
//! [`SessionStore`] can hold records. Two stores ship with the crate:
//! - `MemoryStore`: process-local map, for servers with sticky sessions and tests
//! - `SealedFileStore`: one encrypted file per session, keyed by the session secret

pub mod memory;
pub mod sealed;

pub use memory::MemoryStore;
pub use sealed::SealedFileStore;

use anyhow::Result;

use crate::auth::SessionRecord;

/// Keyed storage for session records.
///
/// Implementations must treat an unknown id as absent (`Ok(None)` /
/// no-op), not as an error.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>>;

    fn save(&self, record: &SessionRecord) -> Result<()>;

    fn remove(&self, id: &str) -> Result<()>;
}
