//! # Storage Module
//!
//! The world state the asset ledger runs against: a transactional
//! key-value store with per-key versions and optimistic commit.
//!
//! ## Architecture
//!
//! ```text
//! key.rs    : composite-key encoding (namespace + attributes)
//! context.rs: TxContext, the per-invocation transaction handle
//! iter.rs   : StateIterator, the scoped range-scan cursor
//! memory.rs : MemoryState, an in-process WorldState for tests and tools
//! db.rs     : LedgerDb, the sled-backed WorldState
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! contract op ──get/put/del/scan──▶ TxContext ──read set + write set──▶ WorldState::commit
//!                                      │                                     │
//!                                      └──────── committed reads ◀───────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every committed entry carries a version. A `TxContext` remembers the
//! version of each key it read from committed state. `commit` re-checks
//! those versions and applies the write set only if none moved; otherwise
//! it fails with [`StoreError::Conflict`] and applies nothing. Re-running
//! the invocation from scratch is the caller's job.

pub mod context;
pub mod db;
pub mod iter;
pub mod key;
pub mod memory;

use std::collections::BTreeMap;

pub use context::{CommitReceipt, TxContext};
pub use db::LedgerDb;
pub use iter::{KeyValue, StateIterator};
pub use key::{create_composite_key, partial_key_prefix, split_composite_key, KeyError};
pub use memory::MemoryState;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors surfaced by a world-state implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// A key read by the transaction was modified by a concurrent commit.
    /// The whole invocation must be re-run.
    #[error("read conflict on key {key:?}")]
    Conflict { key: String },

    #[error("corrupt state entry: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl StoreError {
    /// Whether re-running the invocation from scratch can succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Versioned Values
// ---------------------------------------------------------------------------

/// A committed value together with the commit version that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: u64,
    pub value: Vec<u8>,
}

/// Ordered scan over committed entries, as returned by
/// [`WorldState::scan_prefix`].
pub type VersionedScan<'a> = Box<dyn Iterator<Item = StoreResult<(String, VersionedValue)>> + 'a>;

// ---------------------------------------------------------------------------
// Read / Write Set
// ---------------------------------------------------------------------------

/// Everything one transaction observed and intends to change.
///
/// `reads` maps each key read from committed state to the version seen
/// (`None` when the key was absent). `writes` maps each key to its new value
/// (`None` for a delete). Both are ordered so commits touch keys in a
/// deterministic sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadWriteSet {
    pub(crate) reads: BTreeMap<String, Option<u64>>,
    pub(crate) writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl ReadWriteSet {
    pub fn reads(&self) -> &BTreeMap<String, Option<u64>> {
        &self.reads
    }

    pub fn writes(&self) -> &BTreeMap<String, Option<Vec<u8>>> {
        &self.writes
    }

    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Record the version observed for `key`. The first observation wins:
    /// later reads of the same key must not mask an earlier one.
    pub(crate) fn record_read(&mut self, key: &str, version: Option<u64>) {
        self.reads.entry(key.to_string()).or_insert(version);
    }
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// A transactional key-value store.
///
/// Implementations must make `commit` atomic: either every write in the set
/// becomes visible under one new version, or none does.
pub trait WorldState: Send + Sync {
    /// Read the committed value at `key`.
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Scan committed entries whose key starts with `prefix`, in ascending
    /// key order.
    fn scan_prefix<'a>(&'a self, prefix: &str) -> StoreResult<VersionedScan<'a>>;

    /// Validate `rwset.reads` against current versions and apply
    /// `rwset.writes`. Returns the version assigned to the commit.
    fn commit(&self, rwset: &ReadWriteSet) -> StoreResult<u64>;

    /// Version of the most recent successful commit (0 for a fresh store).
    fn last_version(&self) -> StoreResult<u64>;

    /// Number of committed keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
