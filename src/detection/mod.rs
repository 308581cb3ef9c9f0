//! Conflict Scanner
//!
//! Detection runs in two phases, each to completion:
//!
//! 1. **Scan**: every pair `(i, j)` with `i < j` that is not a sibling pair
//!    is judged by the direct-conflict rules, and the two interlock rules add
//!    edges to their graphs in both directions.
//! 2. **Cycles**: each interlock graph is searched for maximal cycles, and
//!    every cycle becomes a multi-requirement conflict.
//!
//! The first rule error aborts the run; there are no partial results.

pub mod cycles;
pub mod graph;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use req_types::Req;

use crate::error::Result;
use crate::rules::{self, RuleSet};

pub use cycles::find_cycles;
pub use graph::InterlockGraph;

// ============================================================================
// CONFLICT KINDS AND RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    #[serde(rename = "operation inconsistency")]
    OperationInconsistency,
    #[serde(rename = "restriction inconsistency")]
    RestrictionInconsistency,
    #[serde(rename = "event inconsistency")]
    EventInconsistency,
    #[serde(rename = "operation inclusion")]
    OperationInclusion,
    #[serde(rename = "event inclusion")]
    EventInclusion,
    #[serde(rename = "operation event interlock")]
    OperationEventInterlock,
    #[serde(rename = "input output interlock")]
    InputOutputInterlock,
}

impl ConflictKind {
    /// Judged once per pair, reported as `[i, j]`
    pub const SYMMETRIC: [ConflictKind; 3] = [
        ConflictKind::OperationInconsistency,
        ConflictKind::RestrictionInconsistency,
        ConflictKind::EventInconsistency,
    ];

    /// Judged as `(i, j)`, else `(j, i)`; at most one direction is reported
    pub const DIRECTIONAL: [ConflictKind; 2] =
        [ConflictKind::OperationInclusion, ConflictKind::EventInclusion];

    /// Judged both ways to build graphs; reported from cycles
    pub const INTERLOCK: [ConflictKind; 2] = [
        ConflictKind::OperationEventInterlock,
        ConflictKind::InputOutputInterlock,
    ];

    /// Name of the rule that decides this kind
    pub fn rule_name(&self) -> &'static str {
        match self {
            ConflictKind::OperationInconsistency => rules::OPERATION_INCONSISTENCY,
            ConflictKind::RestrictionInconsistency => rules::RESTRICTION_INCONSISTENCY,
            ConflictKind::EventInconsistency => rules::EVENT_INCONSISTENCY,
            ConflictKind::OperationInclusion => rules::OPERATION_INCLUSION,
            ConflictKind::EventInclusion => rules::EVENT_INCLUSION,
            ConflictKind::OperationEventInterlock => rules::OPERATION_EVENT_INTERLOCK,
            ConflictKind::InputOutputInterlock => rules::INPUT_OUTPUT_INTERLOCK,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule_name())
    }
}

/// One detected conflict and the requirements involved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord<'a> {
    pub kind: ConflictKind,
    pub requirements: Vec<&'a Req>,
}

impl<'a> ConflictRecord<'a> {
    /// Ids of the involved requirements, in record order
    pub fn reqids(&self) -> Vec<u32> {
        self.requirements.iter().map(|r| r.reqid).collect()
    }
}

// ============================================================================
// SCANNER
// ============================================================================

/// Result of the scan phase
#[derive(Debug, Clone)]
pub struct ScanOutcome<'a> {
    /// Pairwise conflicts in scan order
    pub conflicts: Vec<ConflictRecord<'a>>,
    pub operation_event: InterlockGraph,
    pub input_output: InterlockGraph,
}

impl<'a> ScanOutcome<'a> {
    /// Run the cycle phase and append one record per interlock cycle
    pub fn finish(self, reqs: &'a [Req]) -> Vec<ConflictRecord<'a>> {
        let mut conflicts = self.conflicts;
        for (kind, graph) in [
            (ConflictKind::OperationEventInterlock, &self.operation_event),
            (ConflictKind::InputOutputInterlock, &self.input_output),
        ] {
            for cycle in find_cycles(graph) {
                debug!(%kind, ?cycle, "interlock cycle");
                conflicts.push(ConflictRecord {
                    kind,
                    requirements: cycle.iter().map(|&i| &reqs[i]).collect(),
                });
            }
        }
        conflicts
    }
}

pub struct Detector<'r> {
    rules: &'r RuleSet,
}

impl<'r> Detector<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    /// Both phases: pairwise conflicts first, then interlock cycles
    pub fn detect<'a>(&self, reqs: &'a [Req]) -> Result<Vec<ConflictRecord<'a>>> {
        let conflicts = self.scan(reqs)?.finish(reqs);
        info!(
            "Detected {} conflicts among {} requirements",
            conflicts.len(),
            reqs.len()
        );
        Ok(conflicts)
    }

    /// Scan phase only
    pub fn scan<'a>(&self, reqs: &'a [Req]) -> Result<ScanOutcome<'a>> {
        let mut outcome = ScanOutcome {
            conflicts: Vec::new(),
            operation_event: InterlockGraph::new(reqs.len()),
            input_output: InterlockGraph::new(reqs.len()),
        };

        for (i, first) in reqs.iter().enumerate() {
            for (j, second) in reqs.iter().enumerate().skip(i + 1) {
                if first.is_sibling_of(second) {
                    continue;
                }
                self.scan_pair(&mut outcome, (i, first), (j, second))?;
            }
        }

        debug!(
            pairwise = outcome.conflicts.len(),
            operation_event_edges = outcome.operation_event.edge_count(),
            input_output_edges = outcome.input_output.edge_count(),
            "scan finished"
        );
        Ok(outcome)
    }

    fn scan_pair<'a>(
        &self,
        outcome: &mut ScanOutcome<'a>,
        (i, first): (usize, &'a Req),
        (j, second): (usize, &'a Req),
    ) -> Result<()> {
        for kind in ConflictKind::SYMMETRIC {
            if self.rules.judge(kind.rule_name(), first, second)? {
                outcome.record(kind, first, second);
            }
        }

        for kind in ConflictKind::DIRECTIONAL {
            if self.rules.judge(kind.rule_name(), first, second)? {
                outcome.record(kind, first, second);
            } else if self.rules.judge(kind.rule_name(), second, first)? {
                outcome.record(kind, second, first);
            }
        }

        for (begin, end, from, to) in [(first, second, i, j), (second, first, j, i)] {
            if self
                .rules
                .judge(rules::OPERATION_EVENT_INTERLOCK, begin, end)?
            {
                debug!(from, to, "operation event edge");
                outcome.operation_event.add_edge(from, to);
            }
        }
        for (begin, end, from, to) in [(first, second, i, j), (second, first, j, i)] {
            if self.rules.judge(rules::INPUT_OUTPUT_INTERLOCK, begin, end)? {
                debug!(from, to, "input output edge");
                outcome.input_output.add_edge(from, to);
            }
        }
        Ok(())
    }
}

impl<'a> ScanOutcome<'a> {
    fn record(&mut self, kind: ConflictKind, first: &'a Req, second: &'a Req) {
        debug!(%kind, first = first.reqid, second = second.reqid, "conflict");
        self.conflicts.push(ConflictRecord {
            kind,
            requirements: vec![first, second],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        for kind in ConflictKind::SYMMETRIC
            .into_iter()
            .chain(ConflictKind::DIRECTIONAL)
            .chain(ConflictKind::INTERLOCK)
        {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.to_string()));
        }
    }

    #[test]
    fn test_finish_maps_cycles_to_requirements() {
        let reqs: Vec<Req> = (1..=3).map(Req::new).collect();
        let outcome = ScanOutcome {
            conflicts: Vec::new(),
            operation_event: InterlockGraph::new(3),
            input_output: InterlockGraph::from_adjacency(vec![vec![2], vec![], vec![0]]),
        };

        let conflicts = outcome.finish(&reqs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::InputOutputInterlock);
        assert_eq!(conflicts[0].reqids(), vec![1, 3]);
    }
}
