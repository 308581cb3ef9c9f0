//! Operator Registry
//!
//! Typed relational operators keyed by declared field type. A base relation
//! `1 input include 2 output` is applied in three steps:
//!
//! 1. Look up both fields on their tuples (absent field is an error)
//! 2. Check both fields declare the same type tag, and that the relation is
//!    permitted for it
//! 3. Run the comparison registered for `(relation, type tag)`
//!
//! The registry is built once from the rules document and is immutable
//! afterwards. Every permitted `(relation, type tag)` pair is checked for a
//! comparison at load time, so step 3 cannot miss at detection time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::{info, trace, warn};

use req_types::{Condition, EntityRef};

use crate::config::RulesConfig;
use crate::error::{DetectionError, Result};
use crate::expr::{evaluate_comparison, parse_expression, Expr, Value};
use crate::model::Tuple;

/// Type tag whose `include` comparison backs `entity_set_include`
pub const ENTITY_TYPE: &str = "entity";

// ============================================================================
// RELATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Equal,
    Include,
    Contradict,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::Equal, Relation::Include, Relation::Contradict];

    pub fn name(&self) -> &'static str {
        match self {
            Relation::Equal => "equal",
            Relation::Include => "include",
            Relation::Contradict => "contradict",
        }
    }
}

impl FromStr for Relation {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self> {
        Relation::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| DetectionError::UnknownRelation(s.to_string()))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// COMPOSITE HELPERS
// ============================================================================

/// List-level helpers callable from comparison expressions.
///
/// `entity_set_include` only needs the registry. The condition helpers run
/// named rules, so the full implementation lives on the rule set.
pub trait CompositeHelpers {
    /// Every entity of `b` is included by some entity of `a`
    fn entity_set_include(&self, a: &[EntityRef], b: &[EntityRef]) -> Result<bool>;

    /// `condition include` holds for some `(c_b, c_a)`, `c_a` from `a` and `c_b` from `b`
    fn condition_set_include(&self, a: &[Condition], b: &[Condition]) -> Result<bool>;

    /// Two distinct conditions of `a` contradict each other
    fn condition_contradict(&self, a: &[Condition]) -> Result<bool>;
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    field_types: BTreeMap<String, String>,
    allowed: HashMap<Relation, BTreeSet<String>>,
    comparisons: HashMap<Relation, HashMap<String, Expr>>,
}

impl OperatorRegistry {
    /// Build and validate the registry from the rules document
    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        let mut allowed: HashMap<Relation, BTreeSet<String>> = HashMap::new();
        for (relation, tags) in &config.allowed_types {
            let relation = Relation::from_str(relation)?;
            allowed.entry(relation).or_default().extend(tags.iter().cloned());
        }

        let mut comparisons: HashMap<Relation, HashMap<String, Expr>> = HashMap::new();
        for (relation, table) in &config.operators {
            let relation = Relation::from_str(relation)?;
            for (type_tag, source) in table {
                let expr = parse_expression(source).map_err(|source| DetectionError::Comparison {
                    relation,
                    type_tag: type_tag.clone(),
                    source,
                })?;
                let permitted = allowed
                    .get(&relation)
                    .map_or(false, |tags| tags.contains(type_tag));
                if !permitted {
                    warn!(
                        "'{}' comparison declared for type '{}', which is not in its allowed types",
                        relation, type_tag
                    );
                }
                comparisons
                    .entry(relation)
                    .or_default()
                    .insert(type_tag.clone(), expr);
            }
        }

        let registry = Self {
            field_types: config.field_types.clone(),
            allowed,
            comparisons,
        };
        registry.validate()?;

        info!(
            "Operator registry ready: {} field types, {} comparisons",
            registry.field_types.len(),
            registry.comparisons.values().map(HashMap::len).sum::<usize>()
        );
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        for (relation, tags) in &self.allowed {
            for tag in tags {
                self.comparison(*relation, tag)?;
            }
        }
        // entity_set_include is defined through it
        self.comparison(Relation::Include, ENTITY_TYPE)?;
        Ok(())
    }

    fn comparison(&self, relation: Relation, type_tag: &str) -> Result<&Expr> {
        self.comparisons
            .get(&relation)
            .and_then(|table| table.get(type_tag))
            .ok_or_else(|| DetectionError::MissingComparison {
                relation,
                type_tag: type_tag.to_string(),
            })
    }

    /// Declared type tag of a field
    pub fn field_type(&self, field: &str) -> Result<&str> {
        self.field_types
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| DetectionError::UndeclaredField {
                field: field.to_string(),
            })
    }

    pub fn is_permitted(&self, relation: Relation, type_tag: &str) -> bool {
        self.allowed
            .get(&relation)
            .map_or(false, |tags| tags.contains(type_tag))
    }

    /// Static check of `field1 relation field2`; returns the shared type tag
    pub fn check(&self, field1: &str, relation: Relation, field2: &str) -> Result<&str> {
        let type1 = self.field_type(field1)?;
        let type2 = self.field_type(field2)?;
        if type1 != type2 {
            return Err(DetectionError::TypeMismatch {
                field1: field1.to_string(),
                type1: type1.to_string(),
                field2: field2.to_string(),
                type2: type2.to_string(),
            });
        }
        if !self.is_permitted(relation, type1) {
            return Err(DetectionError::RelationNotPermitted {
                relation,
                type_tag: type1.to_string(),
            });
        }
        Ok(type1)
    }

    /// Apply `relation` between `object1.field1` and `object2.field2`
    pub fn evaluate(
        &self,
        helpers: &dyn CompositeHelpers,
        object1: &dyn Tuple,
        field1: &str,
        relation: Relation,
        object2: &dyn Tuple,
        field2: &str,
    ) -> Result<bool> {
        let a = object1.field(field1).ok_or_else(|| DetectionError::MissingField {
            field: field1.to_string(),
            tuple: object1.kind(),
        })?;
        let b = object2.field(field2).ok_or_else(|| DetectionError::MissingField {
            field: field2.to_string(),
            tuple: object2.kind(),
        })?;
        let type_tag = self.check(field1, relation, field2)?;
        self.compare(helpers, relation, type_tag, a, b)
    }

    /// Run the comparison registered for `(relation, type_tag)` on two values
    pub fn compare(
        &self,
        helpers: &dyn CompositeHelpers,
        relation: Relation,
        type_tag: &str,
        a: Value<'_>,
        b: Value<'_>,
    ) -> Result<bool> {
        let expr = self.comparison(relation, type_tag)?;
        let result = evaluate_comparison(expr, a, b, helpers)?;
        trace!(%relation, type_tag, result, "comparison");
        Ok(result)
    }

    /// `entity_set_include` with the given helpers threaded through nested calls
    pub(crate) fn entity_set_include_with(
        &self,
        helpers: &dyn CompositeHelpers,
        a: &[EntityRef],
        b: &[EntityRef],
    ) -> Result<bool> {
        for wanted in b {
            let mut covered = false;
            for candidate in a {
                if self.compare(
                    helpers,
                    Relation::Include,
                    ENTITY_TYPE,
                    Value::Entity(candidate),
                    Value::Entity(wanted),
                )? {
                    covered = true;
                    break;
                }
            }
            if !covered {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl CompositeHelpers for OperatorRegistry {
    fn entity_set_include(&self, a: &[EntityRef], b: &[EntityRef]) -> Result<bool> {
        self.entity_set_include_with(self, a, b)
    }

    fn condition_set_include(&self, _a: &[Condition], _b: &[Condition]) -> Result<bool> {
        Err(DetectionError::MissingRule(
            crate::rules::CONDITION_INCLUDE.to_string(),
        ))
    }

    fn condition_contradict(&self, _a: &[Condition]) -> Result<bool> {
        Err(DetectionError::MissingRule(
            crate::rules::CONDITION_CONTRADICT.to_string(),
        ))
    }
}
