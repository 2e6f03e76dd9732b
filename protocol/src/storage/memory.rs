//! # MemoryState
//!
//! An in-process [`WorldState`] backed by a `BTreeMap` behind a
//! `parking_lot::RwLock`. Same commit semantics as [`LedgerDb`]: reads are
//! validated and writes applied while holding the write lock, so a commit
//! is atomic with respect to every other reader and committer.
//!
//! Used by unit tests, benches, and `evaluate`-only tooling.
//!
//! [`LedgerDb`]: super::LedgerDb

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{ReadWriteSet, StoreError, StoreResult, VersionedScan, VersionedValue, WorldState};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, VersionedValue>,
    last_version: u64,
}

/// Thread-safe in-memory world state.
#[derive(Debug, Default)]
pub struct MemoryState {
    inner: RwLock<Inner>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorldState for MemoryState {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        Ok(self.inner.read().entries.get(key).cloned())
    }

    fn scan_prefix<'a>(&'a self, prefix: &str) -> StoreResult<VersionedScan<'a>> {
        // Snapshot the range so the lock is not held while the caller iterates.
        let snapshot: Vec<(String, VersionedValue)> = self
            .inner
            .read()
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn commit(&self, rwset: &ReadWriteSet) -> StoreResult<u64> {
        let mut inner = self.inner.write();

        for (key, expected) in rwset.reads() {
            let current = inner.entries.get(key).map(|v| v.version);
            if current != *expected {
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }

        if rwset.is_read_only() {
            return Ok(inner.last_version);
        }

        let version = inner.last_version + 1;
        for (key, value) in rwset.writes() {
            match value {
                Some(bytes) => {
                    inner.entries.insert(
                        key.clone(),
                        VersionedValue {
                            version,
                            value: bytes.clone(),
                        },
                    );
                }
                None => {
                    inner.entries.remove(key);
                }
            }
        }
        inner.last_version = version;
        Ok(version)
    }

    fn last_version(&self) -> StoreResult<u64> {
        Ok(self.inner.read().last_version)
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }
}
