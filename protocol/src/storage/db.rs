//! # LedgerDb: Persistent World State
//!
//! The sled-backed [`WorldState`]. All on-disk ledger data flows through
//! this module.
//!
//! ## Tree Layout
//!
//! | Tree          | Key                   | Value                          |
//! |---------------|-----------------------|--------------------------------|
//! | `world_state` | state key (UTF-8)     | `version` (8B BE) ‖ value      |
//! | `metadata`    | key (UTF-8)           | value (bytes)                  |
//!
//! The version lives in the same entry as the value, so a range scan reads
//! both in one step and cannot pair a value with the wrong version.
//!
//! ## Atomicity
//!
//! `commit` runs as one sled transaction spanning both trees. The read-set
//! check, every write, and the bump of `last_version` land together or not
//! at all. sled re-runs the closure internally on its own conflicts; a
//! version mismatch aborts it with [`StoreError::Conflict`].

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;

use super::{ReadWriteSet, StoreError, StoreResult, VersionedScan, VersionedValue, WorldState};
use crate::config::{METADATA_TREE, VERSION_PREFIX_LEN, WORLD_STATE_TREE};

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the latest commit version.
const META_LAST_VERSION: &[u8] = b"last_commit_version";

// ---------------------------------------------------------------------------
// Entry Encoding
// ---------------------------------------------------------------------------

fn encode_entry(version: u64, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(VERSION_PREFIX_LEN + value.len());
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(value);
    out
}

fn decode_u64(bytes: &[u8]) -> StoreResult<u64> {
    let head: [u8; VERSION_PREFIX_LEN] = bytes
        .get(..VERSION_PREFIX_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "expected {VERSION_PREFIX_LEN} version bytes, got {}",
                bytes.len()
            ))
        })?;
    Ok(u64::from_be_bytes(head))
}

fn decode_entry(raw: &[u8]) -> StoreResult<VersionedValue> {
    let version = decode_u64(raw)?;
    Ok(VersionedValue {
        version,
        value: raw[VERSION_PREFIX_LEN..].to_vec(),
    })
}

fn decode_key(raw: &IVec) -> StoreResult<String> {
    String::from_utf8(raw.to_vec()).map_err(|e| StoreError::Corrupt(format!("non UTF-8 key: {e}")))
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent world state backed by sled.
///
/// Cheap to clone; clones share the same database handle. sled trees
/// support concurrent readers and serialized transactional writers, so a
/// `LedgerDb` can be shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    /// Versioned world-state entries.
    state: Tree,
    /// Commit bookkeeping (latest version).
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let state = db.open_tree(WORLD_STATE_TREE)?;
        let metadata = db.open_tree(METADATA_TREE)?;
        Ok(Self { db, state, metadata })
    }

    /// Block until every committed write is durable on disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl WorldState for LedgerDb {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        match self.state.get(key.as_bytes())? {
            Some(raw) => Ok(Some(decode_entry(&raw)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix<'a>(&'a self, prefix: &str) -> StoreResult<VersionedScan<'a>> {
        let iter = self
            .state
            .scan_prefix(prefix.as_bytes())
            .map(|item| -> StoreResult<(String, VersionedValue)> {
                let (key, raw) = item?;
                Ok((decode_key(&key)?, decode_entry(&raw)?))
            });
        Ok(Box::new(iter))
    }

    fn commit(&self, rwset: &ReadWriteSet) -> StoreResult<u64> {
        let result = (&self.state, &self.metadata).transaction(|(state, metadata)| {
            for (key, expected) in rwset.reads() {
                let current = match state.get(key.as_bytes())? {
                    Some(raw) => {
                        Some(decode_u64(&raw).map_err(ConflictableTransactionError::Abort)?)
                    }
                    None => None,
                };
                if current != *expected {
                    return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                        key: key.clone(),
                    }));
                }
            }

            let last = match metadata.get(META_LAST_VERSION)? {
                Some(raw) => decode_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                None => 0,
            };
            if rwset.is_read_only() {
                return Ok(last);
            }

            let version = last + 1;
            for (key, value) in rwset.writes() {
                match value {
                    Some(bytes) => {
                        state.insert(key.as_bytes(), encode_entry(version, bytes))?;
                    }
                    None => {
                        state.remove(key.as_bytes())?;
                    }
                }
            }
            metadata.insert(META_LAST_VERSION, &version.to_be_bytes()[..])?;
            Ok(version)
        });

        match result {
            Ok(version) => Ok(version),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }

    fn last_version(&self) -> StoreResult<u64> {
        match self.metadata.get(META_LAST_VERSION)? {
            Some(raw) => decode_u64(&raw),
            None => Ok(0),
        }
    }

    fn len(&self) -> usize {
        self.state.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
