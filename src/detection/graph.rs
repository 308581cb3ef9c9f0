//! Interlock graphs
//!
//! Directed graphs over requirement positions. An edge `i → j` means the
//! interlock rule held for `(reqs[i], reqs[j])`. Successors keep insertion
//! order, which fixes the order cycles are discovered in.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterlockGraph {
    adjacency: Vec<Vec<usize>>,
}

impl InterlockGraph {
    /// Graph with `nodes` nodes and no edges
    pub fn new(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
        }
    }

    /// Build from an adjacency list
    pub fn from_adjacency(adjacency: Vec<Vec<usize>>) -> Self {
        Self { adjacency }
    }

    /// Add `from → to`. Both nodes must exist.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        debug_assert!(to < self.adjacency.len(), "edge to unknown node {}", to);
        self.adjacency[from].push(to);
    }

    pub fn successors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.successors(from).contains(&to)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// All edges in insertion order per source node
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| targets.iter().map(move |&to| (from, to)))
    }
}
