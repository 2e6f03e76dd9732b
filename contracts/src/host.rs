//! # Contract Host
//!
//! Runs invocations against a shared world state. A *submit* opens a
//! [`TxContext`], dispatches, and commits; when the commit loses an
//! optimistic concurrency race the whole invocation is re-run in a fresh
//! context, up to `max_attempts` times. An *evaluate* dispatches and then
//! drops the context, so nothing it writes is ever applied.
//!
//! ```text
//!   submit ──► TxContext::new ──► dispatch::invoke ──► commit ──► Receipt
//!                  ▲                                     │
//!                  └──────────── Conflict (retry) ◄──────┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use gemledger_protocol::config::DEFAULT_MAX_ATTEMPTS;
use gemledger_protocol::{TxContext, WorldState};

use crate::dispatch::{invoke, Invocation};
use crate::error::LedgerResult;
use crate::ledger::AssetContract;

/// Result of a committed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub tx_id: Uuid,
    /// World-state version after the commit.
    pub version: u64,
    /// How many times the invocation ran before it committed.
    pub attempts: u32,
    pub payload: Value,
}

pub struct ContractHost {
    store: Arc<dyn WorldState>,
    contract: AssetContract,
    max_attempts: u32,
}

impl ContractHost {
    pub fn new(store: Arc<dyn WorldState>, contract: AssetContract) -> Self {
        Self {
            store,
            contract,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound the number of runs per submission. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn contract(&self) -> &AssetContract {
        &self.contract
    }

    pub fn store(&self) -> &Arc<dyn WorldState> {
        &self.store
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_version(&self) -> LedgerResult<u64> {
        Ok(self.store.last_version()?)
    }

    fn open(&self, identity: Option<&str>) -> TxContext<'_> {
        let ctx = TxContext::new(self.store.as_ref());
        match identity {
            Some(id) => ctx.with_creator(id),
            None => ctx,
        }
    }

    /// Run `invocation` and commit its writes.
    ///
    /// Contract errors are returned as-is on the first run. Only a commit
    /// conflict triggers a retry; the last conflict is returned once the
    /// attempt budget is spent.
    pub fn submit(&self, invocation: &Invocation, identity: Option<&str>) -> LedgerResult<Receipt> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut ctx = self.open(identity);
            let span = tracing::info_span!(
                "submit",
                function = %invocation.function,
                tx_id = %ctx.tx_id(),
                identity = identity.unwrap_or("-"),
                attempt,
            );
            let _guard = span.enter();

            let payload = invoke(&self.contract, &mut ctx, invocation)?;
            match ctx.commit() {
                Ok(receipt) => {
                    return Ok(Receipt {
                        tx_id: receipt.tx_id,
                        version: receipt.version,
                        attempts: attempt,
                        payload,
                    });
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    tracing::warn!(error = %e, "retrying after conflict");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run `invocation` without committing anything.
    pub fn evaluate(&self, invocation: &Invocation, identity: Option<&str>) -> LedgerResult<Value> {
        let mut ctx = self.open(identity);
        let span = tracing::debug_span!(
            "evaluate",
            function = %invocation.function,
            tx_id = %ctx.tx_id(),
            identity = identity.unwrap_or("-"),
        );
        let _guard = span.enter();
        invoke(&self.contract, &mut ctx, invocation)
    }

    /// [`submit`](Self::submit) on the blocking pool, for async callers.
    pub async fn submit_async(
        self: Arc<Self>,
        invocation: Invocation,
        identity: Option<String>,
    ) -> LedgerResult<Receipt> {
        let span = tracing::Span::current();
        run_blocking(move || {
            let _guard = span.enter();
            self.submit(&invocation, identity.as_deref())
        })
        .await
    }

    /// [`evaluate`](Self::evaluate) on the blocking pool, for async callers.
    pub async fn evaluate_async(
        self: Arc<Self>,
        invocation: Invocation,
        identity: Option<String>,
    ) -> LedgerResult<Value> {
        let span = tracing::Span::current();
        run_blocking(move || {
            let _guard = span.enter();
            self.evaluate(&invocation, identity.as_deref())
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> LedgerResult<T>
where
    F: FnOnce() -> LedgerResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join) => std::panic::resume_unwind(join.into_panic()),
    }
}
