use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::SessionStore;
use crate::auth::SessionRecord;

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.records()?.get(id).cloned())
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        self.records()?
            .insert(record.id().to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.records()?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::sample_record;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        let record = sample_record();
        store.save(&record).expect("save");
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(record.id()).expect("load"), Some(record.clone()));
        assert_eq!(store.load("unknown").expect("load"), None);

        store.remove(record.id()).expect("remove");
        store.remove(record.id()).expect("remove twice");
        assert!(store.is_empty());
    }
}
