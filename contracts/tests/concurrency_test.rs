//! Integration tests for optimistic concurrency.
//!
//! Two contexts racing on the same record must never both commit, and the
//! host's retry loop must converge to the serial result under contention.

use std::sync::Arc;
use std::thread;

use gemledger_contracts::{AssetContract, ContractHost, Invocation, LedgerError};
use gemledger_protocol::{LedgerDb, MemoryState, StoreError, TxContext, WorldState};

fn seed(store: &dyn WorldState) {
    let mut ctx = TxContext::new(store);
    AssetContract::new().init_ledger(&mut ctx).unwrap();
    ctx.commit().unwrap();
}

fn balance(store: &dyn WorldState, kind: &str, owner: &str) -> u64 {
    let mut ctx = TxContext::new(store);
    AssetContract::new().read_asset(&mut ctx, kind, owner).unwrap().amount
}

fn supply(store: &dyn WorldState, kind: &str) -> u64 {
    let mut ctx = TxContext::new(store);
    AssetContract::new().total_supply(&mut ctx, kind).unwrap()
}

// ---------------------------------------------------------------------------
// Racing Contexts
// ---------------------------------------------------------------------------

fn conflicting_transfers_leave_no_lost_update(store: &dyn WorldState) {
    seed(store);
    let contract = AssetContract::new();

    let mut first = TxContext::new(store);
    let mut second = TxContext::new(store);
    contract.transfer_asset(&mut first, "gem", "Team2", "alice", 5).unwrap();
    contract.transfer_asset(&mut second, "gem", "Team2", "bob", 7).unwrap();

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert!(LedgerError::from(err).is_retryable());

    // Nothing from the losing context is visible.
    let mut probe = TxContext::new(store);
    assert!(!contract.asset_exists(&mut probe, "gem", "bob").unwrap());
    drop(probe);

    // Re-running the loser from scratch yields the serial outcome.
    let mut retry = TxContext::new(store);
    contract.transfer_asset(&mut retry, "gem", "Team2", "bob", 7).unwrap();
    retry.commit().unwrap();

    assert_eq!(balance(store, "gem", "Team2"), 3);
    assert_eq!(balance(store, "gem", "alice"), 5);
    assert_eq!(balance(store, "gem", "bob"), 7);
    assert_eq!(supply(store, "gem"), 3016);
}

#[test]
fn conflicting_transfers_memory() {
    conflicting_transfers_leave_no_lost_update(&MemoryState::new());
}

#[test]
fn conflicting_transfers_sled() {
    conflicting_transfers_leave_no_lost_update(&LedgerDb::open_temporary().unwrap());
}

#[test]
fn racing_creates_of_same_key_admit_one() {
    let store = MemoryState::new();
    let contract = AssetContract::new();

    let mut first = TxContext::new(&store);
    let mut second = TxContext::new(&store);
    contract.create_asset(&mut first, "gem", "alice", 1).unwrap();
    contract.create_asset(&mut second, "gem", "alice", 2).unwrap();

    first.commit().unwrap();
    assert!(second.commit().unwrap_err().is_conflict());
    assert_eq!(balance(&store, "gem", "alice"), 1);
}

#[test]
fn disjoint_transfers_both_commit() {
    let store = MemoryState::new();
    seed(&store);
    let contract = AssetContract::new();

    let mut first = TxContext::new(&store);
    let mut second = TxContext::new(&store);
    contract.transfer_asset(&mut first, "gem", "SEO", "alice", 10).unwrap();
    contract.transfer_asset(&mut second, "exp", "Team2", "bob", 10).unwrap();

    first.commit().unwrap();
    second.commit().unwrap();
    assert_eq!(balance(&store, "gem", "alice"), 10);
    assert_eq!(balance(&store, "exp", "bob"), 10);
}

#[test]
fn enumeration_conflicts_with_concurrent_update_of_a_scanned_record() {
    let store = MemoryState::new();
    seed(&store);
    let contract = AssetContract::new();

    let mut reader = TxContext::new(&store);
    let total = contract.total_supply(&mut reader, "exp").unwrap();
    contract.create_asset(&mut reader, "audit", "exp", total).unwrap();

    let mut writer = TxContext::new(&store);
    contract.update_asset(&mut writer, "exp", "Team1", 600).unwrap();
    writer.commit().unwrap();

    assert!(reader.commit().unwrap_err().is_conflict());
}

// ---------------------------------------------------------------------------
// Host Retry Under Contention
// ---------------------------------------------------------------------------

const THREADS: usize = 8;
const TRANSFERS_PER_THREAD: usize = 10;

fn contended_submits_converge(store: Arc<dyn WorldState>) {
    seed(store.as_ref());
    let host =
        Arc::new(ContractHost::new(store.clone(), AssetContract::new()).with_max_attempts(500));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let host = host.clone();
            thread::spawn(move || {
                let owner = format!("user{i}");
                for _ in 0..TRANSFERS_PER_THREAD {
                    let inv = Invocation::new("TransferAsset", ["gem", "SEO", owner.as_str(), "1"]);
                    host.submit(&inv, Some(owner.as_str())).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let moved = (THREADS * TRANSFERS_PER_THREAD) as u64;
    assert_eq!(balance(store.as_ref(), "gem", "SEO"), 3000 - moved);
    for i in 0..THREADS {
        assert_eq!(
            balance(store.as_ref(), "gem", &format!("user{i}")),
            TRANSFERS_PER_THREAD as u64
        );
    }
    assert_eq!(supply(store.as_ref(), "gem"), 3016);
    // One commit for the seed plus one per transfer.
    assert_eq!(store.last_version().unwrap(), moved + 1);
}

#[test]
fn contended_submits_converge_memory() {
    contended_submits_converge(Arc::new(MemoryState::new()));
}

#[test]
fn contended_submits_converge_sled() {
    contended_submits_converge(Arc::new(LedgerDb::open_temporary().unwrap()));
}
