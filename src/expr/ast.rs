//! Comparison expression AST
//!
//! A closed expression language for the comparison bodies of the rules
//! document. The AST is produced by [`super::parse_expression`] after scope
//! and arity checks, so every `Var` root is bound and every `Call` has the
//! right number of arguments.

use std::fmt;

/// Resolved expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    Text(String),
    /// Variable with an attribute path: `a`, `a.base`, `v.agent.base`
    Var {
        name: String,
        attrs: Vec<Attribute>,
    },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: Builtin,
        args: Vec<Expr>,
    },
    /// `any(v in list, body)` / `all(v in list, body)`
    Quantified {
        quantifier: Quantifier,
        var: String,
        list: Box<Expr>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
}

impl Quantifier {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "any" => Some(Quantifier::Any),
            "all" => Some(Quantifier::All),
            _ => None,
        }
    }
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// Attribute reachable through `.` on a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    // Entity
    Base,
    Modifier,
    IsAll,
    Entirety,
    // Operation
    Predicate,
    Not,
    Able,
    // Condition / requirement fields
    Agent,
    Operation,
    Input,
    Output,
    Restriction,
    Event,
}

impl Attribute {
    pub fn from_name(name: &str) -> Option<Self> {
        let attr = match name {
            "base" => Attribute::Base,
            "modifier" => Attribute::Modifier,
            "is_all" => Attribute::IsAll,
            "entirety" => Attribute::Entirety,
            "predicate" => Attribute::Predicate,
            "not" => Attribute::Not,
            "able" => Attribute::Able,
            "agent" => Attribute::Agent,
            "operation" => Attribute::Operation,
            "input" => Attribute::Input,
            "output" => Attribute::Output,
            "restriction" => Attribute::Restriction,
            "event" => Attribute::Event,
            _ => return None,
        };
        Some(attr)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Base => "base",
            Attribute::Modifier => "modifier",
            Attribute::IsAll => "is_all",
            Attribute::Entirety => "entirety",
            Attribute::Predicate => "predicate",
            Attribute::Not => "not",
            Attribute::Able => "able",
            Attribute::Agent => "agent",
            Attribute::Operation => "operation",
            Attribute::Input => "input",
            Attribute::Output => "output",
            Attribute::Restriction => "restriction",
            Attribute::Event => "event",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// BUILTINS
// ============================================================================

/// Functions callable from comparison expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `set_eq(a, b)`: equal as sets
    SetEq,
    /// `subset(a, b)`: every element of `a` is in `b`
    Subset,
    /// `disjoint(a, b)`: no shared element
    Disjoint,
    /// `empty(a)`
    Empty,
    /// `entity_set_include(a, b)`: every entity of `b` is included by some entity of `a`
    EntitySetInclude,
    /// `condition_set_include(a, b)`: `condition include` holds for some condition of `b`
    /// followed by some condition of `a`
    ConditionSetInclude,
    /// `condition_contradict(a)`: two distinct conditions of `a` contradict
    ConditionContradict,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::SetEq,
        Builtin::Subset,
        Builtin::Disjoint,
        Builtin::Empty,
        Builtin::EntitySetInclude,
        Builtin::ConditionSetInclude,
        Builtin::ConditionContradict,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::SetEq => "set_eq",
            Builtin::Subset => "subset",
            Builtin::Disjoint => "disjoint",
            Builtin::Empty => "empty",
            Builtin::EntitySetInclude => "entity_set_include",
            Builtin::ConditionSetInclude => "condition_set_include",
            Builtin::ConditionContradict => "condition_contradict",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Builtin::Empty | Builtin::ConditionContradict => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Expr {
    /// Whether any call in the expression is `func`
    pub fn calls(&self, func: Builtin) -> bool {
        match self {
            Expr::Bool(_) | Expr::Text(_) | Expr::Var { .. } => false,
            Expr::Not(inner) => inner.calls(func),
            Expr::And(items) | Expr::Or(items) => items.iter().any(|e| e.calls(func)),
            Expr::Compare { left, right, .. } => left.calls(func) || right.calls(func),
            Expr::Call { func: f, args } => *f == func || args.iter().any(|e| e.calls(func)),
            Expr::Quantified { list, body, .. } => list.calls(func) || body.calls(func),
        }
    }
}
