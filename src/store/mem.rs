//! In-memory state store backed by DashMap.
//!
//! For tests, simulation, and deployments that accept re-warning after a
//! restart. All data is lost on process exit.

use dashmap::DashMap;

use crate::clock::Timestamp;
use crate::store::{StateKey, StateStore, StoreResult};

/// Concurrent in-memory store using a sharded hashmap.
#[derive(Debug)]
pub struct MemoryStateStore {
    data: DashMap<StateKey, Timestamp>,
}

impl MemoryStateStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Number of recorded timestamps.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: StateKey) -> StoreResult<Option<Timestamp>> {
        Ok(self.data.get(&key).map(|v| *v.value()))
    }

    fn put(&self, key: StateKey, at: Timestamp) -> StoreResult<()> {
        self.data.insert(key, at);
        Ok(())
    }

    fn remove(&self, key: StateKey) -> StoreResult<bool> {
        Ok(self.data.remove(&key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_reads_as_none() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get(StateKey::StaleSince).unwrap(), None);
    }

    #[test]
    fn put_and_get() {
        let store = MemoryStateStore::new();
        store
            .put(StateKey::StaleSince, Timestamp::from_millis(42))
            .unwrap();
        assert_eq!(
            store.get(StateKey::StaleSince).unwrap(),
            Some(Timestamp::from_millis(42))
        );
    }

    #[test]
    fn overwrite() {
        let store = MemoryStateStore::new();
        store
            .put(StateKey::LastStaleWarning, Timestamp::from_millis(1))
            .unwrap();
        store
            .put(StateKey::LastStaleWarning, Timestamp::from_millis(2))
            .unwrap();
        assert_eq!(
            store.get(StateKey::LastStaleWarning).unwrap(),
            Some(Timestamp::from_millis(2))
        );
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryStateStore::new();
        store
            .put(StateKey::LastVersionCheck, Timestamp::from_millis(7))
            .unwrap();
        assert_eq!(store.get(StateKey::StaleSince).unwrap(), None);
        assert_eq!(store.get(StateKey::LastStaleWarning).unwrap(), None);
    }

    #[test]
    fn remove_reports_presence() {
        let store = MemoryStateStore::new();
        store
            .put(StateKey::StaleSince, Timestamp::from_millis(1))
            .unwrap();
        assert!(store.remove(StateKey::StaleSince).unwrap());
        assert!(!store.remove(StateKey::StaleSince).unwrap());
        assert_eq!(store.get(StateKey::StaleSince).unwrap(), None);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;
        let store = Arc::new(MemoryStateStore::new());
        let handles: Vec<_> = (0..100u64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .put(StateKey::LastVersionCheck, Timestamp::from_millis(i))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
        assert!(store.get(StateKey::LastVersionCheck).unwrap().is_some());
    }
}
