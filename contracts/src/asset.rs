//! # Asset Record
//!
//! The value stored at every asset key. The JSON form uses the field names
//! `ID`, `Owner`, `Amount`, in that order, which is the ledger's
//! compatibility format. `ID` carries the asset kind.

use serde::{Deserialize, Serialize};

use gemledger_protocol::config::ASSET_NAMESPACE;
use gemledger_protocol::storage::create_composite_key;

use crate::error::{LedgerError, LedgerResult};

/// A fungible balance of one kind held by one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset kind (`gem`, `exp`, ...).
    #[serde(rename = "ID")]
    pub kind: String,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
}

impl Asset {
    pub fn new(kind: impl Into<String>, owner: impl Into<String>, amount: u64) -> Self {
        Self {
            kind: kind.into(),
            owner: owner.into(),
            amount,
        }
    }

    /// World-state key of this record.
    pub fn key(&self) -> LedgerResult<String> {
        asset_key(&self.kind, &self.owner)
    }

    pub fn to_bytes(&self) -> LedgerResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Add `amount`, refusing to wrap.
    pub fn credit(&mut self, amount: u64) -> LedgerResult<()> {
        self.amount = self.amount.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidArgument(format!(
                "crediting {amount} to {}/{} overflows its balance of {}",
                self.kind, self.owner, self.amount
            ))
        })?;
        Ok(())
    }

    /// Subtract `amount`, refusing to go negative.
    pub fn debit(&mut self, amount: u64) -> LedgerResult<()> {
        self.amount = self.amount.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientBalance {
                kind: self.kind.clone(),
                owner: self.owner.clone(),
                available: self.amount,
                requested: amount,
            }
        })?;
        Ok(())
    }
}

/// The single key derivation every operation uses for `(kind, owner)`.
pub fn asset_key(kind: &str, owner: &str) -> LedgerResult<String> {
    create_composite_key(ASSET_NAMESPACE, &[kind, owner])
        .map_err(|e| LedgerError::InvalidArgument(e.to_string()))
}
