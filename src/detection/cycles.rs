//! Cycle Finder
//!
//! For each start node, a depth-first walk with a fresh path trace and
//! visited marker. Reaching a node that is still on the path closes a cycle:
//! the path nodes from that node's first occurrence on.
//!
//! Candidates are merged into the accepted list so only maximal cycles
//! survive: a candidate contained in an accepted cycle is dropped, and
//! accepted cycles contained in the candidate are replaced by it. The result
//! does not depend on which of two nested cycles is found first.

use std::collections::BTreeSet;

use tracing::trace;

use super::graph::InterlockGraph;

/// Maximal cycles of `graph` with at least two nodes, in discovery order
pub fn find_cycles(graph: &InterlockGraph) -> Vec<BTreeSet<usize>> {
    let mut accepted: Vec<BTreeSet<usize>> = Vec::new();

    for start in 0..graph.node_count() {
        let mut walk = Walk {
            graph,
            visited: vec![false; graph.node_count()],
            trace: Vec::new(),
            accepted: &mut accepted,
        };
        walk.visit(start);
    }

    // self-loops are not conflicts
    accepted.retain(|cycle| cycle.len() > 1);
    accepted
}

struct Walk<'g> {
    graph: &'g InterlockGraph,
    visited: Vec<bool>,
    trace: Vec<usize>,
    accepted: &'g mut Vec<BTreeSet<usize>>,
}

impl Walk<'_> {
    fn visit(&mut self, node: usize) {
        if self.visited[node] {
            if let Some(pos) = self.trace.iter().position(|&n| n == node) {
                let candidate: BTreeSet<usize> = self.trace[pos..].iter().copied().collect();
                merge(self.accepted, candidate);
            }
            return;
        }

        self.visited[node] = true;
        self.trace.push(node);
        for &next in self.graph.successors(node) {
            self.visit(next);
        }
        self.trace.pop();
    }
}

fn merge(accepted: &mut Vec<BTreeSet<usize>>, candidate: BTreeSet<usize>) {
    if accepted.iter().any(|cycle| candidate.is_subset(cycle)) {
        trace!(?candidate, "cycle subsumed");
        return;
    }
    accepted.retain(|cycle| !cycle.is_subset(&candidate));
    trace!(?candidate, "cycle accepted");
    accepted.push(candidate);
}
