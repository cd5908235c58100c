use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::ids::TransactionId;

/// Directed wait-for graph, one node per live transaction.
///
/// Grounded in the teacher's `transaction::wait_for_graph::WaitForGraph`
/// (same DFS-with-visited/rec_stack shape), but reworked into a
/// `map<Tid, Node>` of independently-locked nodes with symmetric
/// `next`/`prev` edges, as required to support racy, lock-free
/// traversal of a single node's edges from another thread.
pub(crate) struct WaitGraph {
    nodes: Mutex<HashMap<TransactionId, Arc<WaitGraphNode>>>,
}

struct NodeState {
    /// Transactions that this node's owner is waiting for.
    next: HashSet<TransactionId>,
    /// Transactions waiting on this node's owner.
    prev: HashSet<TransactionId>,
}

pub(crate) struct WaitGraphNode {
    tid: TransactionId,
    state: Mutex<NodeState>,
}

impl WaitGraph {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Returns (creating if necessary) the node for `tid`. Idempotent.
    pub fn get_node(&self, tid: TransactionId) -> Arc<WaitGraphNode> {
        let mut nodes = self.nodes.lock().unwrap();
        nodes
            .entry(tid)
            .or_insert_with(|| Arc::new(WaitGraphNode::new(tid)))
            .clone()
    }

    fn lookup(&self, tid: TransactionId) -> Option<Arc<WaitGraphNode>> {
        self.nodes.lock().unwrap().get(&tid).cloned()
    }

    /// Drop the node entirely once a transaction is known to be gone for
    /// good (commit/abort). Safe to call even if the node still has
    /// dangling edges pointing at it; those reads will simply see an
    /// absent node next time and treat it as "no edge".
    pub fn forget(&self, tid: TransactionId) {
        self.nodes.lock().unwrap().remove(&tid);
    }

    /// Best-effort, lock-free-from-the-caller's-perspective read of a
    /// node's outgoing edges. A `try_lock` failure (the node's owner is
    /// concurrently mutating it) is treated the same as "no edges
    /// visible this round" — racy by design, see module docs on
    /// `WaitGraphNode::check_cycle`.
    fn racy_next(&self, tid: TransactionId) -> HashSet<TransactionId> {
        match self.lookup(tid) {
            None => HashSet::new(),
            Some(node) => match node.state.try_lock() {
                Ok(state) => state.next.clone(),
                Err(_) => HashSet::new(),
            },
        }
    }
}

impl WaitGraphNode {
    fn new(tid: TransactionId) -> Self {
        Self {
            tid,
            state: Mutex::new(NodeState {
                next: HashSet::new(),
                prev: HashSet::new(),
            }),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    /// Insert edge `self -> other` and the inverse `other.prev += self`.
    pub fn add_wait(&self, graph: &WaitGraph, other: TransactionId) {
        {
            let mut state = self.state.lock().unwrap();
            state.next.insert(other);
        }
        let other_node = graph.get_node(other);
        let mut other_state = other_node.state.lock().unwrap();
        other_state.prev.insert(self.tid);
    }

    /// Fold of `add_wait` over an iterator of targets.
    pub fn add_waits(&self, graph: &WaitGraph, others: impl IntoIterator<Item = TransactionId>) {
        for other in others {
            self.add_wait(graph, other);
        }
    }

    /// Remove this node from every neighbor's `prev`/`next`, then clear
    /// its own sets. Called once a wait is resolved (the tid was
    /// granted the lock it was waiting on) or the transaction aborts.
    pub fn release_this(&self, graph: &WaitGraph) {
        let (next, prev) = {
            let mut state = self.state.lock().unwrap();
            (
                std::mem::take(&mut state.next),
                std::mem::take(&mut state.prev),
            )
        };

        for successor in &next {
            if let Some(node) = graph.lookup(*successor) {
                node.state.lock().unwrap().prev.remove(&self.tid);
            }
        }
        for waiter in &prev {
            if let Some(node) = graph.lookup(*waiter) {
                node.state.lock().unwrap().next.remove(&self.tid);
            }
        }
    }

    /// DFS from `self`'s successors looking for a path back to `self`.
    ///
    /// Per the source contract, traversed nodes' edge sets are read
    /// without taking their locks (see `WaitGraph::racy_next`): the
    /// algorithm is re-run on every blocking wait, so a momentarily
    /// invisible edge only delays detection by one round, it never
    /// causes a false negative to go permanently undetected, and it
    /// can never produce a false positive (any cycle it reports existed
    /// in the graph at the instant of the DFS).
    pub fn check_cycle(&self, graph: &WaitGraph) -> bool {
        let mut path: HashSet<TransactionId> = HashSet::new();
        let mut checked: HashSet<TransactionId> = HashSet::new();
        self.visit(graph, self.tid, &mut path, &mut checked)
    }

    /// Returns true iff `self.tid` is reachable by following `next`
    /// edges starting at (and including the neighbors of) `current`.
    fn visit(
        &self,
        graph: &WaitGraph,
        current: TransactionId,
        path: &mut HashSet<TransactionId>,
        checked: &mut HashSet<TransactionId>,
    ) -> bool {
        if checked.contains(&current) {
            return false;
        }

        path.insert(current);

        for neighbor in graph.racy_next(current) {
            if neighbor == self.tid {
                path.remove(&current);
                return true;
            }
            if path.contains(&neighbor) {
                // Part of a cycle that doesn't loop back to `self`; not
                // our concern here.
                continue;
            }
            if self.visit(graph, neighbor, path, checked) {
                path.remove(&current);
                return true;
            }
        }

        path.remove(&current);
        checked.insert(current);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_cycle() {
        let graph = WaitGraph::new();
        let t1 = TransactionId::new();
        let node = graph.get_node(t1);

        node.add_wait(&graph, t1);
        assert!(node.check_cycle(&graph));

        node.release_this(&graph);
        assert!(!node.check_cycle(&graph));
    }

    #[test]
    fn two_node_cycle() {
        let graph = WaitGraph::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        let n1 = graph.get_node(t1);
        let n2 = graph.get_node(t2);

        n1.add_wait(&graph, t2);
        n2.add_wait(&graph, t1);

        assert!(n1.check_cycle(&graph));
        assert!(n2.check_cycle(&graph));

        n1.release_this(&graph);
        assert!(!n1.check_cycle(&graph));
        assert!(!n2.check_cycle(&graph));
    }

    #[test]
    fn no_cycle_in_a_chain() {
        let graph = WaitGraph::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let t3 = TransactionId::new();

        let n1 = graph.get_node(t1);
        let n2 = graph.get_node(t2);

        n1.add_wait(&graph, t2);
        n2.add_wait(&graph, t3);

        assert!(!n1.check_cycle(&graph));
        assert!(!n2.check_cycle(&graph));
    }

    #[test]
    fn edges_are_symmetric() {
        let graph = WaitGraph::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        let n1 = graph.get_node(t1);
        n1.add_wait(&graph, t2);

        let n2 = graph.get_node(t2);
        assert!(n2.state.lock().unwrap().prev.contains(&t1));

        n1.release_this(&graph);
        assert!(!n2.state.lock().unwrap().prev.contains(&t1));
    }

    #[test]
    fn concurrent_mutation_during_cycle_check_is_race_tolerant() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let graph = StdArc::new(WaitGraph::new());
        let ids: Vec<TransactionId> = (0..8).map(|_| TransactionId::new()).collect();
        for (i, tid) in ids.iter().enumerate() {
            let next = ids[(i + 1) % ids.len()];
            graph.get_node(*tid).add_wait(&graph, next);
        }

        let mut handles = vec![];
        for tid in ids.clone() {
            let graph = StdArc::clone(&graph);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let node = graph.get_node(tid);
                    let _ = node.check_cycle(&graph);
                }
            }));
        }
        for tid in ids.clone() {
            let graph = StdArc::clone(&graph);
            handles.push(thread::spawn(move || {
                let node = graph.get_node(tid);
                for _ in 0..200 {
                    node.release_this(&graph);
                    node.add_wait(&graph, tid);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        // No assertion beyond "did not panic/deadlock": this test exists to
        // exercise the try_lock-based racy read path under contention.
    }
}
