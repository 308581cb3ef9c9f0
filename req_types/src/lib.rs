//! Requirement Types - Level 1 Foundation Types
//!
//! Pure data structures for modelled requirements. Every other part of the
//! workspace (entity interning, tuple parsing, rule evaluation, conflict
//! reports) builds on these types; this crate depends on nothing but serde.
//!
//! ## Contents
//!
//! - [`Entity`] / [`EntityRef`]: actors, objects and concepts
//! - [`Operation`]: the verb phrase with its negation and capability flags
//! - [`Condition`]: a triggering event clause (5-tuple)
//! - [`Req`]: a modelled requirement (8-tuple), the unit of conflict analysis
//!
//! ## Textual Form
//!
//! The `Display` impls produce the persisted tuple text:
//!
//! ```text
//! (1) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)
//! ```
//!
//! Parsing lives in the `reqconflict` crate next to the entity pool.
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - constructors, accessors and formatting only
//! 2. **NO WORKSPACE DEPENDENCIES**
//! 3. **SERIALIZABLE** - all types support serde
//! 4. **THREAD SAFE** - entities are shared through `Arc`, everything is `Send + Sync`

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Marker used in tuple text for the implicit system actor.
pub const SYSTEM_MARKER: &str = "*system*";
/// Marker used in tuple text for an empty list.
pub const VOID_MARKER: &str = "*void*";
/// Marker used in tuple text for an empty event list.
pub const ALWAYS_MARKER: &str = "*always*";
/// Prefix that makes the next character of a text value literal.
pub const ESCAPE_CHAR: char = '\\';
/// Characters that delimit tuple text; escaped when they occur inside a value.
pub const RESERVED_CHARS: &str = "\\,()[]{}*";

// ============================================================================
// ENTITIES
// ============================================================================

/// Shared handle to an entity.
///
/// Entities handed out by an interning pool are canonical: structurally equal
/// entities share one allocation, so `Arc::ptr_eq` and `==` agree.
pub type EntityRef = Arc<Entity>;

/// An actor, object or concept referenced by a requirement.
///
/// Equality is structural: `base`, `is_all` and `entirety` must match and the
/// modifier sets must be equal as sets. Modifiers are held in a `BTreeSet`, so
/// the order in which they were supplied never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical lemma; empty for the implicit system actor
    pub base: String,
    /// Qualifiers ("new", "active", ...)
    pub modifier: BTreeSet<String>,
    /// Universal quantifier flag ("ALL users")
    pub is_all: bool,
    /// Owning entity for possessive / part-of phrases
    pub entirety: Option<EntityRef>,
}

impl Entity {
    /// Create an entity with no modifiers and no owner
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// The implicit system actor
    pub fn system() -> Self {
        Self::default()
    }

    /// Add modifiers (builder style)
    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifier.extend(modifiers.into_iter().map(Into::into));
        self
    }

    /// Mark as universally quantified (builder style)
    pub fn all(mut self) -> Self {
        self.is_all = true;
        self
    }

    /// Attach the owning entity (builder style)
    pub fn of(mut self, entirety: impl Into<EntityRef>) -> Self {
        self.entirety = Some(entirety.into());
        self
    }

    /// Whether this is the implicit system actor
    pub fn is_system(&self) -> bool {
        self.base.is_empty()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all {
            f.write_str("ALL ")?;
        }
        for modifier in &self.modifier {
            write!(f, "[{}]", Escaped::new(modifier))?;
        }
        if self.is_system() {
            f.write_str(SYSTEM_MARKER)?;
        } else {
            write!(f, "{}", Escaped::new(&self.base).guarding(&["ALL "]))?;
        }
        if let Some(whole) = &self.entirety {
            write!(f, "[of {}]", whole)?;
        }
        Ok(())
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// The action of a requirement or condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Verb phrase
    pub predicate: String,
    /// Negated ("shall not")
    pub not: bool,
    /// Capability / possibility ("can")
    pub able: bool,
}

impl Operation {
    /// Create a plain, affirmative operation
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            ..Self::default()
        }
    }

    /// Create a negated operation
    pub fn negated(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            not: true,
            able: false,
        }
    }

    /// Set the capability flag (builder style)
    pub fn able(mut self) -> Self {
        self.able = true;
        self
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.able {
            f.write_str("ABLE ")?;
        }
        if self.not {
            f.write_str("NOT ")?;
        }
        write!(
            f,
            "{}",
            Escaped::new(&self.predicate).guarding(&["ABLE ", "NOT "])
        )
    }
}

// ============================================================================
// CONDITIONS AND REQUIREMENTS
// ============================================================================

/// Triggering event clause: `(agent, operation, input, output, restriction)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub agent: EntityRef,
    pub operation: Operation,
    pub input: Vec<EntityRef>,
    pub output: Vec<EntityRef>,
    pub restriction: Vec<String>,
}

impl Condition {
    /// Create a condition with the given agent and operation and empty lists
    pub fn new(agent: impl Into<EntityRef>, operation: Operation) -> Self {
        Self {
            agent: agent.into(),
            operation,
            input: Vec::new(),
            output: Vec::new(),
            restriction: Vec::new(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        write_body(
            f,
            &self.agent,
            &self.operation,
            &self.input,
            &self.output,
            &self.restriction,
        )?;
        f.write_str("}")
    }
}

/// A modelled requirement:
/// `(reqid, groupid, event, agent, operation, input, output, restriction)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Req {
    /// Unique within one detection run
    pub reqid: u32,
    /// 0 = standalone; equal nonzero ids mark siblings split from one sentence
    pub groupid: u32,
    /// Triggering clauses; empty means the requirement always applies
    pub event: Vec<Condition>,
    pub agent: EntityRef,
    pub operation: Operation,
    pub input: Vec<EntityRef>,
    pub output: Vec<EntityRef>,
    pub restriction: Vec<String>,
}

impl Req {
    /// Create a standalone requirement performed by the system actor
    pub fn new(reqid: u32) -> Self {
        Self {
            reqid,
            groupid: 0,
            event: Vec::new(),
            agent: Arc::new(Entity::system()),
            operation: Operation::default(),
            input: Vec::new(),
            output: Vec::new(),
            restriction: Vec::new(),
        }
    }

    /// Whether the requirement has no triggering clause
    pub fn always_applies(&self) -> bool {
        self.event.is_empty()
    }

    /// Whether both requirements were split from the same original sentence
    pub fn is_sibling_of(&self, other: &Req) -> bool {
        self.groupid != 0 && self.groupid == other.groupid
    }
}

impl fmt::Display for Req {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) , ({}) , (", self.reqid, self.groupid)?;
        if self.event.is_empty() {
            f.write_str(ALWAYS_MARKER)?;
        } else {
            write_joined(f, &self.event)?;
        }
        f.write_str(") , ")?;
        write_body(
            f,
            &self.agent,
            &self.operation,
            &self.input,
            &self.output,
            &self.restriction,
        )
    }
}

// ============================================================================
// FORMATTING HELPERS
// ============================================================================

fn write_body(
    f: &mut fmt::Formatter<'_>,
    agent: &Entity,
    operation: &Operation,
    input: &[EntityRef],
    output: &[EntityRef],
    restriction: &[String],
) -> fmt::Result {
    write!(f, "({}) , ({}) , (", agent, operation)?;
    write_list(f, input)?;
    f.write_str(") , (")?;
    write_list(f, output)?;
    f.write_str(") , (")?;
    if restriction.is_empty() {
        f.write_str(VOID_MARKER)?;
    } else {
        let escaped: Vec<Escaped<'_>> = restriction.iter().map(|r| Escaped::new(r)).collect();
        write_joined(f, &escaped)?;
    }
    f.write_str(")")
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    if items.is_empty() {
        f.write_str(VOID_MARKER)
    } else {
        write_joined(f, items)
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// A text value written with its reserved characters escaped.
///
/// `guarding` lists keyword prefixes the parser would otherwise take as
/// flags; a value starting with one gets its first character escaped.
struct Escaped<'a> {
    text: &'a str,
    keywords: &'static [&'static str],
}

impl<'a> Escaped<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, keywords: &[] }
    }

    fn guarding(mut self, keywords: &'static [&'static str]) -> Self {
        self.keywords = keywords;
        self
    }
}

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guarded = self.keywords.iter().any(|k| self.text.starts_with(k));
        for (i, c) in self.text.chars().enumerate() {
            if RESERVED_CHARS.contains(c) || (i == 0 && guarded) {
                write!(f, "{}", ESCAPE_CHAR)?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
