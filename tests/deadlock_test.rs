mod common;

use common::setup;
use latchdb::{EngineError, LockTable, PageId, TransactionId};
use std::{sync::Arc, thread, time::Duration};

/// Two transactions each hold one page and request the other's — one
/// must be aborted for deadlock, the other must proceed to completion
/// (scenario 8 of the protocol's end-to-end test matrix).
#[test]
fn cross_waiting_transactions_resolve_via_deadlock_abort() {
    setup();
    let table = Arc::new(LockTable::new());
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();
    let p1 = PageId::new(0, 0);
    let p2 = PageId::new(0, 1);

    table.acquire_exclusive(t1, p1).unwrap();
    table.acquire_exclusive(t2, p2).unwrap();

    let table2 = Arc::clone(&table);
    let second = thread::spawn(move || table2.acquire_exclusive(t2, p1));

    // give t2 a moment to start waiting on p1 before t1 requests p2
    thread::sleep(Duration::from_millis(100));
    let first_result = table.acquire_exclusive(t1, p2);
    let second_result = second.join().unwrap();

    // exactly one side must see the deadlock
    let aborts = [
        matches!(first_result, Err(EngineError::TransactionAborted(_))),
        matches!(second_result, Err(EngineError::TransactionAborted(_))),
    ];
    assert_eq!(aborts.iter().filter(|a| **a).count(), 1);

    table.release_all(t1);
    table.release_all(t2);
}

/// A writer waiting on a page held exclusively by another transaction
/// must unblock once that transaction releases, without ever
/// deadlocking with itself.
#[test]
fn exclusive_waiter_unblocks_after_holder_releases() {
    setup();
    let table = Arc::new(LockTable::new());
    let holder = TransactionId::new();
    let waiter = TransactionId::new();
    let pid = PageId::new(0, 0);

    table.acquire_exclusive(holder, pid).unwrap();

    let table2 = Arc::clone(&table);
    let handle = thread::spawn(move || table2.acquire_exclusive(waiter, pid));

    thread::sleep(Duration::from_millis(200));
    assert!(!handle.is_finished());

    table.release_exclusive(holder, pid).unwrap();
    handle.join().unwrap().unwrap();
    assert!(table.is_locked(waiter, pid));
}
