//! # State Iterator
//!
//! The range-scan cursor handed out by [`TxContext::get_state_by_prefix`].
//! It merges two ordered sources:
//!
//! 1. committed entries from the world state, and
//! 2. the transaction's own pending writes under the same prefix,
//!
//! so a scan sees exactly what a point read would see. Pending writes
//! shadow committed entries with the same key, and pending deletes hide
//! them. Every committed key the cursor yields is recorded in the read set.
//!
//! The cursor owns its underlying store iterator. Dropping it, whether
//! after exhaustion, after an early `?` return, or through
//! [`StateIterator::close`], releases that iterator.
//!
//! [`TxContext::get_state_by_prefix`]: super::TxContext::get_state_by_prefix

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;

use super::{StoreResult, VersionedScan, VersionedValue};

/// One entry yielded by a [`StateIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

type Overlay<'a> = Box<dyn Iterator<Item = (&'a String, &'a Option<Vec<u8>>)> + 'a>;

/// Scoped, one-shot cursor over a key prefix.
pub struct StateIterator<'a> {
    prefix: String,
    committed: Peekable<VersionedScan<'a>>,
    pending: Peekable<Overlay<'a>>,
    reads: &'a mut BTreeMap<String, Option<u64>>,
    yielded: usize,
    done: bool,
}

impl<'a> StateIterator<'a> {
    pub(crate) fn new(
        prefix: String,
        committed: VersionedScan<'a>,
        writes: &'a BTreeMap<String, Option<Vec<u8>>>,
        reads: &'a mut BTreeMap<String, Option<u64>>,
    ) -> Self {
        let scan_prefix = prefix.clone();
        let pending: Overlay<'a> = Box::new(
            writes
                .range(prefix.clone()..)
                .take_while(move |(key, _)| key.starts_with(&scan_prefix)),
        );
        tracing::trace!(prefix = ?prefix, "state iterator opened");
        Self {
            prefix,
            committed: committed.peekable(),
            pending: pending.peekable(),
            reads,
            yielded: 0,
            done: false,
        }
    }

    /// Release the cursor explicitly. Equivalent to dropping it.
    pub fn close(self) {}

    fn take_committed(&mut self) -> Option<StoreResult<KeyValue>> {
        match self.committed.next()? {
            Ok((key, VersionedValue { version, value })) => {
                self.reads.entry(key.clone()).or_insert(Some(version));
                Some(Ok(KeyValue { key, value }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> Iterator for StateIterator<'a> {
    type Item = StoreResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            // Which source holds the smaller key? Errors from the committed
            // side surface immediately.
            let order = match (self.committed.peek(), self.pending.peek()) {
                (None, None) => {
                    self.done = true;
                    return None;
                }
                (Some(Err(_)), _) => return self.take_committed(),
                (Some(Ok(_)), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(Ok((committed_key, _))), Some((pending_key, _))) => {
                    committed_key.as_str().cmp(pending_key.as_str())
                }
            };

            let item = match order {
                Ordering::Less => self.take_committed(),
                Ordering::Greater | Ordering::Equal => {
                    if order == Ordering::Equal {
                        // Shadowed by a pending write; the committed version
                        // still counts as read.
                        if let Some(Ok((key, v))) = self.committed.next() {
                            self.reads.entry(key).or_insert(Some(v.version));
                        }
                    }
                    match self.pending.next() {
                        Some((key, Some(value))) => Some(Ok(KeyValue {
                            key: key.clone(),
                            value: value.clone(),
                        })),
                        // Pending delete: skip.
                        Some((_, None)) => continue,
                        None => None,
                    }
                }
            };

            if let Some(Ok(_)) = item {
                self.yielded += 1;
            }
            return item;
        }
    }
}

impl Drop for StateIterator<'_> {
    fn drop(&mut self) {
        tracing::trace!(prefix = ?self.prefix, yielded = self.yielded, "state iterator released");
    }
}
