//! # Transaction Context
//!
//! `TxContext` is the handle every contract operation receives. It scopes
//! one unit of work against a [`WorldState`]:
//!
//! - reads go to the store, unless the key has a pending write in this
//!   context (read-your-writes);
//! - writes and deletes are buffered in the write set and invisible to
//!   everyone else until [`TxContext::commit`];
//! - dropping the context without committing discards the write set.
//!
//! The context also carries the transaction id and the caller identity the
//! host attached to the invocation.

use uuid::Uuid;

use super::iter::StateIterator;
use super::{ReadWriteSet, StoreResult, WorldState};

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub tx_id: Uuid,
    /// Version assigned by the store. Equals the previous version when the
    /// transaction wrote nothing.
    pub version: u64,
    pub keys_read: usize,
    pub keys_written: usize,
}

/// One unit of work against a world state.
pub struct TxContext<'s> {
    tx_id: Uuid,
    creator: Option<String>,
    store: &'s dyn WorldState,
    rwset: ReadWriteSet,
}

impl<'s> TxContext<'s> {
    /// Open a new unit of work with a fresh transaction id.
    pub fn new(store: &'s dyn WorldState) -> Self {
        Self {
            tx_id: Uuid::new_v4(),
            creator: None,
            store,
            rwset: ReadWriteSet::default(),
        }
    }

    /// Attach the identity of the caller that submitted this invocation.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn rwset(&self) -> &ReadWriteSet {
        &self.rwset
    }

    // -- Reads --------------------------------------------------------------

    /// Read the value at `key` as this transaction currently sees it.
    pub fn get_state(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.rwset.writes.get(key) {
            return Ok(pending.clone());
        }
        let committed = self.store.get(key)?;
        self.rwset.record_read(key, committed.as_ref().map(|v| v.version));
        tracing::debug!(tx_id = %self.tx_id, key = ?key, found = committed.is_some(), "get_state");
        Ok(committed.map(|v| v.value))
    }

    /// Open a cursor over every key starting with `prefix`, in ascending
    /// key order, including this transaction's pending writes.
    pub fn get_state_by_prefix(&mut self, prefix: &str) -> StoreResult<StateIterator<'_>> {
        let committed = self.store.scan_prefix(prefix)?;
        tracing::debug!(tx_id = %self.tx_id, prefix = ?prefix, "get_state_by_prefix");
        let ReadWriteSet { reads, writes } = &mut self.rwset;
        Ok(StateIterator::new(prefix.to_string(), committed, writes, reads))
    }

    // -- Writes -------------------------------------------------------------

    /// Buffer a write of `value` at `key`.
    pub fn put_state(&mut self, key: &str, value: Vec<u8>) {
        tracing::debug!(tx_id = %self.tx_id, key = ?key, bytes = value.len(), "put_state");
        self.rwset.writes.insert(key.to_string(), Some(value));
    }

    /// Buffer a delete of `key`.
    pub fn del_state(&mut self, key: &str) {
        tracing::debug!(tx_id = %self.tx_id, key = ?key, "del_state");
        self.rwset.writes.insert(key.to_string(), None);
    }

    // -- Completion ---------------------------------------------------------

    /// Validate the read set and apply the write set atomically.
    ///
    /// On [`StoreError::Conflict`](super::StoreError::Conflict) nothing was
    /// applied and the invocation may be re-run in a new context.
    pub fn commit(self) -> StoreResult<CommitReceipt> {
        let version = match self.store.commit(&self.rwset) {
            Ok(v) => v,
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(tx_id = %self.tx_id, error = %e, "commit rejected");
                }
                return Err(e);
            }
        };
        let receipt = CommitReceipt {
            tx_id: self.tx_id,
            version,
            keys_read: self.rwset.reads.len(),
            keys_written: self.rwset.writes.len(),
        };
        tracing::info!(
            tx_id = %receipt.tx_id,
            version = receipt.version,
            reads = receipt.keys_read,
            writes = receipt.keys_written,
            "transaction committed"
        );
        Ok(receipt)
    }
}
