use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    error::EngineResult,
    ids::{PageId, TransactionId},
    page_lock::PageLock,
    permission::Lock,
    wait_graph::WaitGraph,
};

/// Process-wide `PageId -> PageLock` map, plus the wait-for graph shared
/// by every `PageLock`.
///
/// Thin façade, as specified: lock lookups only hold the table mutex
/// long enough to find-or-create the `PageLock`, then drop it before
/// calling into the (possibly blocking) lock itself — mirrors the
/// teacher's separation between `ConcurrentStatus`'s map mutation and
/// the per-lock latch logic in `add_latch`/`release_latch`.
pub struct LockTable {
    locks: Mutex<HashMap<PageId, Arc<PageLock>>>,
    wait_graph: WaitGraph,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait_graph: WaitGraph::new(),
        }
    }

    fn lock_for(&self, pid: PageId) -> Arc<PageLock> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(pid)
            .or_insert_with(|| Arc::new(PageLock::new(pid)))
            .clone()
    }

    pub fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> EngineResult<()> {
        self.lock_for(pid).shared_lock(tid, &self.wait_graph)
    }

    pub fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> EngineResult<()> {
        self.lock_for(pid).exclusive_lock(tid, &self.wait_graph)
    }

    /// Acquire `pid` in whichever mode `lock` names, dispatching the
    /// way the teacher's page-cache call sites dispatch on
    /// `Permission::to_lock()` rather than hand-matching the mode.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, lock: Lock) -> EngineResult<()> {
        match lock {
            Lock::Shared => self.acquire_shared(tid, pid),
            Lock::Exclusive => self.acquire_exclusive(tid, pid),
        }
    }

    pub fn release_shared(&self, tid: TransactionId, pid: PageId) -> EngineResult<()> {
        self.lock_for(pid).release_shared(tid, &self.wait_graph)
    }

    pub fn release_exclusive(&self, tid: TransactionId, pid: PageId) -> EngineResult<()> {
        self.lock_for(pid).release_exclusive(tid, &self.wait_graph)
    }

    /// What mode (if any) `tid` currently holds `pid` in.
    pub fn held_lock(&self, tid: TransactionId, pid: PageId) -> Option<Lock> {
        self.lock_for(pid).held_by(tid)
    }

    pub fn is_locked(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held_lock(tid, pid).is_some()
    }

    /// Release every lock `tid` holds, across every page this table has
    /// ever seen. The value collection is snapshotted up front (per
    /// §9's allowance) so the table mutex is not held across each
    /// page's release — only `PageLock::try_release`'s own short
    /// critical section is.
    pub fn release_all(&self, tid: TransactionId) {
        let snapshot: Vec<Arc<PageLock>> = {
            let locks = self.locks.lock().unwrap();
            locks.values().cloned().collect()
        };
        for lock in snapshot {
            lock.try_release(tid, &self.wait_graph);
        }
        self.wait_graph.forget(tid);
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_all_clears_every_page() {
        let table = LockTable::new();
        let t = TransactionId::new();
        let p1 = PageId::new(0, 0);
        let p2 = PageId::new(0, 1);

        table.acquire_shared(t, p1).unwrap();
        table.acquire_exclusive(t, p2).unwrap();

        table.release_all(t);

        assert!(!table.is_locked(t, p1));
        assert!(!table.is_locked(t, p2));
    }

    #[test]
    fn lazy_creation_is_idempotent() {
        let table = LockTable::new();
        let t = TransactionId::new();
        let pid = PageId::new(1, 0);

        table.acquire_shared(t, pid).unwrap();
        // second call on the already-created lock should re-enter cleanly
        table.acquire_shared(t, pid).unwrap();
        assert!(table.is_locked(t, pid));
    }
}
