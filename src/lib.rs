//! Requirement conflict detection
//!
//! Finds logical conflicts among requirements that have been reduced to
//! structured tuples (see `req_types`). Detection is driven by a YAML rules
//! document; nothing about what counts as a conflict is hard-coded.
//!
//! ## Pipeline
//!
//! ```text
//! rules.yaml ──► ConfigLoader ──► RuleSet (OperatorRegistry + compiled rules)
//!                                    │
//! model file ──► EntityPool / read_model ──► [Req] ──► Detector
//!                                                       │ scan pairs
//!                                                       │ interlock graphs
//!                                                       ▼ cycles
//!                                              [ConflictRecord] ──► report
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use reqconflict::{detect, ConfigLoader, EntityPool};
//!
//! let rules = ConfigLoader::from_env().load_rule_set()?;
//! let mut pool = EntityPool::new();
//! let reqs = reqconflict::model::load_model_file("model.txt", &mut pool)?;
//! for conflict in detect(&rules, &reqs)? {
//!     println!("{}: {:?}", conflict.kind, conflict.reqids());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod expr;
pub mod model;
pub mod operators;
pub mod report;
pub mod rules;

pub use config::{ConfigLoader, RulesConfig};
pub use detection::{ConflictKind, ConflictRecord, Detector, ScanOutcome};
pub use error::{DetectionError, Result};
pub use model::{EntityPool, Tuple};
pub use operators::{OperatorRegistry, Relation};
pub use rules::RuleSet;

pub use req_types::{Condition, Entity, EntityRef, Operation, Req};

/// Run both detection phases over `reqs`
pub fn detect<'a>(rules: &RuleSet, reqs: &'a [Req]) -> Result<Vec<ConflictRecord<'a>>> {
    Detector::new(rules).detect(reqs)
}
