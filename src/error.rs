//! Error types for rule compilation and conflict detection
//!
//! Every failure in this crate is a configuration or data-contract defect, not
//! a transient condition. Nothing is retried; the first error aborts the run
//! and carries enough context (rule name, field names, type tags) to find the
//! offending line of the rules document.

use thiserror::Error;

use crate::expr::ExprError;
use crate::operators::Relation;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Main error type for the detection engine
#[derive(Debug, Error)]
pub enum DetectionError {
    // =========================================================================
    // Type errors (operator registry)
    // =========================================================================
    #[error("type error: field '{field}' has no declared type")]
    UndeclaredField { field: String },

    #[error(
        "type error: cannot relate '{field1}' ({type1}) to '{field2}' ({type2}): declared types differ"
    )]
    TypeMismatch {
        field1: String,
        type1: String,
        field2: String,
        type2: String,
    },

    #[error("type error: relation '{relation}' is not permitted for type '{type_tag}'")]
    RelationNotPermitted { relation: Relation, type_tag: String },

    #[error("no '{relation}' comparison registered for type '{type_tag}'")]
    MissingComparison { relation: Relation, type_tag: String },

    #[error("unknown relation '{0}', expected one of: equal, include, contradict")]
    UnknownRelation(String),

    #[error("invalid '{relation}' comparison for type '{type_tag}': {source}")]
    Comparison {
        relation: Relation,
        type_tag: String,
        #[source]
        source: ExprError,
    },

    // =========================================================================
    // Rule compilation errors
    // =========================================================================
    #[error("syntax error in rule '{rule}': {message}")]
    Syntax { rule: String, message: String },

    #[error("rule '{rule}' references undefined rule '{target}'")]
    UndefinedRule { rule: String, target: String },

    #[error("required rule '{0}' is not defined in the rules document")]
    MissingRule(String),

    // =========================================================================
    // Evaluation errors
    // =========================================================================
    #[error("field '{field}' is absent on {tuple}")]
    MissingField { field: String, tuple: &'static str },

    #[error("field '{field}' holds {found}, expected a condition list to iterate")]
    NotIterable { field: String, found: &'static str },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("in rule '{rule}': {source}")]
    InRule {
        rule: String,
        #[source]
        source: Box<DetectionError>,
    },
}

impl DetectionError {
    pub(crate) fn syntax(rule: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn in_rule(rule: &str, source: DetectionError) -> Self {
        Self::InRule {
            rule: rule.to_string(),
            source: Box::new(source),
        }
    }

    /// Strip `InRule` wrappers down to the error that caused them
    pub fn root_cause(&self) -> &DetectionError {
        match self {
            Self::InRule { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
