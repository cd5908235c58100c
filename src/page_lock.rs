use std::{
    collections::HashSet,
    sync::{Condvar, Mutex},
};

use crate::{
    error::{EngineError, EngineResult},
    ids::{PageId, TransactionId},
    permission::Lock,
    wait_graph::WaitGraph,
};

struct LockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

/// A single page's shared/exclusive lock, with upgrade and deadlock
/// detection baked into every blocking wait.
///
/// Where the teacher lineage's `ConcurrentStatus` polls
/// (`add_latch` + `sleep(10ms)` in a timeout loop, see
/// `transaction/concurrent_status.rs`), this uses the platform condition
/// variable directly: every suspension point is a `Condvar::wait` on
/// this page's own mutex, woken by `notify_all` on every release.
pub(crate) struct PageLock {
    pid: PageId,
    state: Mutex<LockState>,
    cvar: Condvar,
}

impl PageLock {
    pub fn new(pid: PageId) -> Self {
        Self {
            pid,
            state: Mutex::new(LockState {
                shared: HashSet::new(),
                exclusive: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Acquire a shared (read) lock for `t`, blocking while another
    /// transaction holds exclusive.
    pub fn shared_lock(&self, t: TransactionId, graph: &WaitGraph) -> EngineResult<()> {
        let node = graph.get_node(t);
        let mut state = self.state.lock().unwrap();

        if state.exclusive == Some(t) {
            // Exclusive subsumes shared.
            return Ok(());
        }
        if state.shared.contains(&t) {
            // Re-entrant shared acquisition.
            return Ok(());
        }

        while let Some(holder) = state.exclusive {
            node.add_wait(graph, holder);
            if node.check_cycle(graph) {
                node.release_this(graph);
                let err = EngineError::TransactionAborted(format!(
                    "{} deadlocked waiting for shared lock on {} (held exclusively by {})",
                    t, self.pid, holder
                ));
                err.show_backtrace();
                return Err(err);
            }
            state = self.cvar.wait(state).unwrap();
        }

        state.shared.insert(t);
        drop(state);
        node.release_this(graph);
        Ok(())
    }

    /// Acquire an exclusive (write) lock for `t`. Implements the
    /// claim-then-drain upgrade protocol: `t` marks itself as the
    /// reserved exclusive holder as soon as the slot is free, which
    /// blocks any *new* shared acquisition before the existing shared
    /// holders have drained — this is what prevents writer starvation.
    pub fn exclusive_lock(&self, t: TransactionId, graph: &WaitGraph) -> EngineResult<()> {
        let node = graph.get_node(t);
        let mut state = self.state.lock().unwrap();

        while state.exclusive != Some(t) {
            if let Some(holder) = state.exclusive {
                node.add_wait(graph, holder);
                if node.check_cycle(graph) {
                    node.release_this(graph);
                    let err = EngineError::TransactionAborted(format!(
                        "{} deadlocked waiting for exclusive lock on {} (held by {})",
                        t, self.pid, holder
                    ));
                    err.show_backtrace();
                    return Err(err);
                }
                state = self.cvar.wait(state).unwrap();
                continue;
            }
            state.exclusive = Some(t);
        }

        // Upgrade: `t` may already be a shared holder; claiming the
        // exclusive slot above already keeps new readers out, so it's
        // safe to drop `t` from `shared` now.
        state.shared.remove(&t);

        loop {
            let other_readers: Vec<TransactionId> =
                state.shared.iter().copied().filter(|s| *s != t).collect();
            if other_readers.is_empty() {
                break;
            }
            node.add_waits(graph, other_readers.iter().copied());
            if node.check_cycle(graph) {
                node.release_this(graph);
                // `t` still holds the claimed exclusive slot in `state`;
                // normal transaction cleanup (`LockTable::release_all`)
                // will release it through `try_release`.
                let err = EngineError::TransactionAborted(format!(
                    "{} deadlocked draining readers of {} before exclusive grant",
                    t, self.pid
                ));
                err.show_backtrace();
                return Err(err);
            }
            state = self.cvar.wait(state).unwrap();
        }

        drop(state);
        node.release_this(graph);
        Ok(())
    }

    pub fn release_shared(&self, t: TransactionId, graph: &WaitGraph) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.shared.remove(&t) {
            return Err(EngineError::NotHeld(format!(
                "{} does not hold a shared lock on {}",
                t, self.pid
            )));
        }
        let now_empty = state.shared.is_empty();
        drop(state);

        graph.get_node(t).release_this(graph);
        if now_empty {
            self.cvar.notify_all();
        }
        Ok(())
    }

    pub fn release_exclusive(&self, t: TransactionId, graph: &WaitGraph) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.exclusive != Some(t) {
            return Err(EngineError::NotHeld(format!(
                "{} does not hold an exclusive lock on {}",
                t, self.pid
            )));
        }
        state.exclusive = None;
        drop(state);

        graph.get_node(t).release_this(graph);
        self.cvar.notify_all();
        Ok(())
    }

    /// Release whatever `t` holds on this page, shared or exclusive; a
    /// no-op if `t` holds nothing. Used during transaction cleanup,
    /// where the caller has no reason to track which mode each of its
    /// pages was locked in.
    pub fn try_release(&self, t: TransactionId, graph: &WaitGraph) {
        let mut state = self.state.lock().unwrap();
        if state.shared.remove(&t) {
            let now_empty = state.shared.is_empty();
            drop(state);
            graph.get_node(t).release_this(graph);
            if now_empty {
                self.cvar.notify_all();
            }
        } else if state.exclusive == Some(t) {
            state.exclusive = None;
            drop(state);
            graph.get_node(t).release_this(graph);
            self.cvar.notify_all();
        }
    }

    /// Returns the mode `t` currently holds this lock in, if any.
    pub fn held_by(&self, t: TransactionId) -> Option<Lock> {
        let state = self.state.lock().unwrap();
        if state.exclusive == Some(t) {
            Some(Lock::Exclusive)
        } else if state.shared.contains(&t) {
            Some(Lock::Shared)
        } else {
            None
        }
    }

    pub fn is_held_by_anyone(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.exclusive.is_some() || !state.shared.is_empty()
    }
}
