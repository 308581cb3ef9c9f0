//! Comparison expressions
//!
//! The per-type comparison bodies of the rules document are written in a
//! small closed language instead of host code:
//!
//! ```yaml
//! include:
//!   entity: a == b or (a.base == b.base and subset(a.modifier, b.modifier))
//! ```
//!
//! [`parse_expression`] turns the text into a resolved [`Expr`] (the scope,
//! attribute and arity checks happen here, at load time), and
//! [`evaluate_comparison`] interprets it over two field values.

mod ast;
mod eval;
mod parser;
mod value;

pub use ast::{Attribute, Builtin, CompareOp, Expr, Quantifier};
pub use eval::{evaluate, evaluate_comparison, Env};
pub use parser::parse_expression;
pub use value::Value;

use thiserror::Error;

/// Errors raised while parsing or interpreting a comparison expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error in expression:\n{0}")]
    Syntax(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    #[error("{found} has no attribute '{attribute}'")]
    NoAttribute {
        attribute: Attribute,
        found: &'static str,
    },

    #[error("{operation} expects {expected}, found {found}")]
    Type {
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot compare {left} with {right}")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
}
