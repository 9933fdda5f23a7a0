use std::collections::{HashMap, HashSet};

use crate::common::types::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Wait-for graph: an edge `T -> U` means `T` is blocked until `U` releases a page.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a waiting relationship. Returns false if the edge already existed.
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) -> bool {
        self.edges.entry(waiter).or_default().insert(holder)
    }

    pub fn remove_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if let Some(holders) = self.edges.get_mut(&waiter) {
            holders.remove(&holder);
            if holders.is_empty() {
                self.edges.remove(&waiter);
            }
        }
    }

    /// Drop every edge leaving `tid` (it stopped waiting)
    pub fn clear_outgoing(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
    }

    /// Drop `tid` entirely, including edges of transactions waiting on it
    pub fn remove_vertex(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        self.edges.retain(|_, holders| {
            holders.remove(&tid);
            !holders.is_empty()
        });
    }

    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.edges.get(&tid).is_some_and(|holders| !holders.is_empty())
    }

    /// Transactions `tid` is currently waiting on, sorted
    pub fn waiting_on(&self, tid: TransactionId) -> Vec<TransactionId> {
        let mut holders: Vec<_> = self
            .edges
            .get(&tid)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default();
        holders.sort_unstable();
        holders
    }

    #[cfg(test)]
    fn edge_count(&self) -> usize {
        self.edges.values().map(|h| h.len()).sum()
    }

    /// Depth-first search with three-color marking; reaching an in-progress vertex
    /// again means a back edge, i.e. a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut colors: HashMap<TransactionId, Color> = HashMap::new();
        self.edges
            .keys()
            .any(|&start| self.visit(start, &mut colors))
    }

    fn visit(&self, tid: TransactionId, colors: &mut HashMap<TransactionId, Color>) -> bool {
        match colors.get(&tid).copied().unwrap_or(Color::Unvisited) {
            Color::InProgress => return true,
            Color::Done => return false,
            Color::Unvisited => {}
        }

        colors.insert(tid, Color::InProgress);
        if let Some(holders) = self.edges.get(&tid) {
            for &next in holders {
                if self.visit(next, colors) {
                    return true;
                }
            }
        }
        colors.insert(tid, Color::Done);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    #[test]
    fn test_chain_has_no_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(t(1), t(2));
        graph.add_edge(t(2), t(3));
        graph.add_edge(t(1), t(3));
        assert!(!graph.has_cycle());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_two_party_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(t(1), t(2));
        graph.add_edge(t(2), t(1));
        assert!(graph.has_cycle());

        graph.remove_edge(t(2), t(1));
        assert!(!graph.has_cycle());
        assert!(!graph.is_waiting(t(2)));
    }

    #[test]
    fn test_long_cycle_reached_from_tail() {
        let mut graph = WaitForGraph::new();
        // 5 -> 1 -> 2 -> 3 -> 4 -> 2
        graph.add_edge(t(5), t(1));
        graph.add_edge(t(1), t(2));
        graph.add_edge(t(2), t(3));
        graph.add_edge(t(3), t(4));
        assert!(!graph.has_cycle());

        graph.add_edge(t(4), t(2));
        assert!(graph.has_cycle());
    }

    #[test]
    fn test_remove_vertex_drops_incoming_edges() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(t(1), t(3));
        graph.add_edge(t(2), t(3));
        graph.add_edge(t(3), t(1));
        assert!(graph.has_cycle());

        graph.remove_vertex(t(3));
        assert!(!graph.has_cycle());
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.is_waiting(t(1)));
    }

    #[test]
    fn test_clear_outgoing_keeps_waiters() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(t(1), t(2));
        graph.add_edge(t(2), t(3));
        graph.clear_outgoing(t(2));
        assert_eq!(graph.waiting_on(t(1)), vec![t(2)]);
        assert!(graph.waiting_on(t(2)).is_empty());
    }
}
