// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # GemLedger Contracts
//!
//! The asset ledger: fungible `(kind, owner)` balances with creation,
//! transfer, and gem-to-exp conversion, run against a world state through
//! a per-invocation transaction context.
//!
//! - **asset**: the stored record and its key derivation.
//! - **ledger**: `AssetContract`, the typed operations.
//! - **dispatch**: name + string-argument invocations for hosts.
//! - **host**: submit/evaluate with commit and conflict retry.
//!
//! ## Design Principles
//!
//! 1. Amounts are unsigned and every credit or debit is checked, so no
//!    balance can wrap or go negative.
//! 2. Operations never touch storage except through their `TxContext`; a
//!    failed invocation commits nothing.
//! 3. Contract code never retries. Conflicts surface at commit and the host
//!    decides whether to run the invocation again.

pub mod asset;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod ledger;

pub use asset::Asset;
pub use dispatch::{invoke, Invocation};
pub use error::{LedgerError, LedgerResult};
pub use host::{ContractHost, Receipt};
pub use ledger::AssetContract;
