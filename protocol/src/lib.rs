// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # GemLedger Protocol: World State Library
//!
//! Everything the asset contract needs from its surroundings, and nothing
//! the contract itself decides:
//!
//! - **storage**: the `WorldState` trait, its in-memory and sled
//!   implementations, the per-invocation `TxContext`, composite keys, and
//!   the scoped range-scan cursor.
//! - **config**: namespace, kinds, genesis table, and storage layout.
//!
//! The contract logic lives in `gemledger-contracts`; the host binary in
//! `gemledger-node`.

pub mod config;
pub mod storage;

pub use storage::{
    CommitReceipt, KeyError, LedgerDb, MemoryState, StoreError, StoreResult, TxContext, WorldState,
};
