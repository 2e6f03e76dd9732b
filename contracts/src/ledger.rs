//! # Asset Ledger Contract
//!
//! State transitions over `(kind, owner)` balance records. Every operation
//! takes the invocation's [`TxContext`] explicitly and touches the world
//! state only through it, so a failed operation leaves nothing behind once
//! the host drops the context.
//!
//! ## Operations
//!
//! | Operation            | Reads                          | Writes                         |
//! |----------------------|--------------------------------|--------------------------------|
//! | `init_ledger`        | none                           | six genesis records            |
//! | `create_asset`       | target                         | target                         |
//! | `read_asset`         | target                         | none                           |
//! | `update_asset`       | target                         | target                         |
//! | `delete_asset`       | target                         | target (delete)                |
//! | `asset_exists`       | target                         | none                           |
//! | `transfer_asset`     | source, destination            | source, destination            |
//! | `convert_gem_to_exp` | user gem, collector gem, user exp | all three                   |
//! | `get_all_assets`     | `Asset` namespace scan         | none                           |
//! | `get_assets_by_kind` | one-kind scan                  | none                           |
//! | `total_supply`       | one-kind scan                  | none                           |
//!
//! ## Conservation
//!
//! Transfers debit the source and credit the destination by the same amount
//! inside one context; the destination is credited by addition, never
//! overwritten. Only `convert_gem_to_exp` changes a supply: exp is minted
//! one-for-one with the gem it collects.

use serde::de::Error as _;

use gemledger_protocol::config::{
    ASSET_NAMESPACE, DEFAULT_COLLECTOR, GENESIS_ASSETS, KIND_EXP, KIND_GEM,
};
use gemledger_protocol::storage::partial_key_prefix;
use gemledger_protocol::TxContext;

use crate::asset::{asset_key, Asset};
use crate::error::{LedgerError, LedgerResult};

/// The asset ledger contract. Holds configuration only; all state lives in
/// the world state behind the [`TxContext`] of each call.
#[derive(Debug, Clone)]
pub struct AssetContract {
    collector: String,
}

impl Default for AssetContract {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetContract {
    pub fn new() -> Self {
        Self {
            collector: DEFAULT_COLLECTOR.to_string(),
        }
    }

    /// Use `collector` as the owner that receives converted gem.
    pub fn with_collector(collector: impl Into<String>) -> Self {
        Self {
            collector: collector.into(),
        }
    }

    pub fn collector(&self) -> &str {
        &self.collector
    }

    // -- Helpers ------------------------------------------------------------

    /// Decode the record stored at `key`. A record naming another identity
    /// is rejected, so every later write lands on the key that was read.
    fn decode(key: &str, bytes: &[u8]) -> LedgerResult<Asset> {
        let asset = Asset::from_bytes(bytes)?;
        if asset.key()? != key {
            return Err(LedgerError::Serialization(serde_json::Error::custom(format!(
                "record {}/{} is stored under a foreign key",
                asset.kind, asset.owner
            ))));
        }
        Ok(asset)
    }

    fn load(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
    ) -> LedgerResult<Option<Asset>> {
        let key = asset_key(kind, owner)?;
        match ctx.get_state(&key)? {
            Some(bytes) => Ok(Some(Self::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn load_or_empty(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
    ) -> LedgerResult<Asset> {
        Ok(self
            .load(ctx, kind, owner)?
            .unwrap_or_else(|| Asset::new(kind, owner, 0)))
    }

    fn save(&self, ctx: &mut TxContext<'_>, asset: &Asset) -> LedgerResult<()> {
        let key = asset.key()?;
        ctx.put_state(&key, asset.to_bytes()?);
        Ok(())
    }

    fn scan(&self, ctx: &mut TxContext<'_>, attributes: &[&str]) -> LedgerResult<Vec<Asset>> {
        let prefix = partial_key_prefix(ASSET_NAMESPACE, attributes)
            .map_err(|e| LedgerError::InvalidArgument(e.to_string()))?;

        let mut assets = Vec::new();
        for entry in ctx.get_state_by_prefix(&prefix)? {
            let entry = entry?;
            assets.push(Self::decode(&entry.key, &entry.value)?);
        }
        Ok(assets)
    }

    // -- Bootstrap ----------------------------------------------------------

    /// Write the genesis records, overwriting whatever is at their keys.
    pub fn init_ledger(&self, ctx: &mut TxContext<'_>) -> LedgerResult<()> {
        for (kind, owner, amount) in GENESIS_ASSETS {
            self.save(ctx, &Asset::new(kind, owner, amount))?;
        }
        tracing::info!(
            tx_id = %ctx.tx_id(),
            records = GENESIS_ASSETS.len(),
            "ledger seeded"
        );
        Ok(())
    }

    // -- CRUD ---------------------------------------------------------------

    /// Issue a new record. Fails if `(kind, owner)` already exists.
    pub fn create_asset(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
        amount: u64,
    ) -> LedgerResult<()> {
        if self.load(ctx, kind, owner)?.is_some() {
            return Err(LedgerError::AlreadyExists {
                kind: kind.to_string(),
                owner: owner.to_string(),
            });
        }
        self.save(ctx, &Asset::new(kind, owner, amount))?;
        tracing::info!(tx_id = %ctx.tx_id(), kind, owner, amount, "asset created");
        Ok(())
    }

    pub fn read_asset(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
    ) -> LedgerResult<Asset> {
        self.load(ctx, kind, owner)?.ok_or_else(|| LedgerError::NotFound {
            kind: kind.to_string(),
            owner: owner.to_string(),
        })
    }

    /// Overwrite the balance of an existing record. The write goes to the
    /// key that was checked for existence.
    pub fn update_asset(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
        amount: u64,
    ) -> LedgerResult<()> {
        let mut asset = self.read_asset(ctx, kind, owner)?;
        let previous = asset.amount;
        asset.amount = amount;
        self.save(ctx, &asset)?;
        tracing::info!(
            tx_id = %ctx.tx_id(),
            kind,
            owner,
            previous,
            amount,
            "asset updated"
        );
        Ok(())
    }

    pub fn delete_asset(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
    ) -> LedgerResult<()> {
        let asset = self.read_asset(ctx, kind, owner)?;
        ctx.del_state(&asset.key()?);
        tracing::info!(
            tx_id = %ctx.tx_id(),
            kind,
            owner,
            amount = asset.amount,
            "asset deleted"
        );
        Ok(())
    }

    pub fn asset_exists(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        owner: &str,
    ) -> LedgerResult<bool> {
        let key = asset_key(kind, owner)?;
        Ok(ctx.get_state(&key)?.is_some())
    }

    // -- Transfers ----------------------------------------------------------

    /// Move `amount` of `kind` from `from` to `to`, creating the destination
    /// record if needed. A zero amount is accepted and moves nothing.
    /// Returns the owner the value was taken from.
    pub fn transfer_asset(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> LedgerResult<String> {
        asset_key(kind, to)?;

        let mut source = self.read_asset(ctx, kind, from)?;
        source.debit(amount)?;
        // Persist the debit before reading the destination: a self-transfer
        // must then see the debited balance.
        self.save(ctx, &source)?;

        let mut destination = self.load_or_empty(ctx, kind, to)?;
        destination.credit(amount)?;
        self.save(ctx, &destination)?;

        tracing::info!(tx_id = %ctx.tx_id(), kind, from, to, amount, "asset transferred");
        Ok(source.owner)
    }

    /// Spend `gem_amount` gem from `user` to the collector and mint the same
    /// amount of exp to `user`.
    pub fn convert_gem_to_exp(
        &self,
        ctx: &mut TxContext<'_>,
        user: &str,
        gem_amount: u64,
    ) -> LedgerResult<()> {
        if gem_amount == 0 {
            return Err(LedgerError::InvalidArgument("gem amount must be positive".into()));
        }

        let mut user_gem = self.read_asset(ctx, KIND_GEM, user)?;
        user_gem.debit(gem_amount)?;
        self.save(ctx, &user_gem)?;

        let mut collected = self.load_or_empty(ctx, KIND_GEM, &self.collector)?;
        collected.credit(gem_amount)?;
        self.save(ctx, &collected)?;

        let mut user_exp = self.load_or_empty(ctx, KIND_EXP, user)?;
        user_exp.credit(gem_amount)?;
        self.save(ctx, &user_exp)?;

        tracing::info!(
            tx_id = %ctx.tx_id(),
            user,
            collector = %self.collector,
            amount = gem_amount,
            "gem converted to exp"
        );
        Ok(())
    }

    // -- Enumeration --------------------------------------------------------

    /// Every asset record, in key order.
    pub fn get_all_assets(&self, ctx: &mut TxContext<'_>) -> LedgerResult<Vec<Asset>> {
        self.scan(ctx, &[])
    }

    /// Every record of one kind, in owner order.
    pub fn get_assets_by_kind(
        &self,
        ctx: &mut TxContext<'_>,
        kind: &str,
    ) -> LedgerResult<Vec<Asset>> {
        self.scan(ctx, &[kind])
    }

    /// Sum of all balances of `kind`.
    pub fn total_supply(&self, ctx: &mut TxContext<'_>, kind: &str) -> LedgerResult<u64> {
        self.get_assets_by_kind(ctx, kind)?
            .iter()
            .try_fold(0u64, |sum, asset| sum.checked_add(asset.amount))
            .ok_or_else(|| {
                LedgerError::InvalidArgument(format!("total {kind} supply overflows u64"))
            })
    }
}
