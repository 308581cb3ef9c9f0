//! Runtime values of the expression interpreter
//!
//! Values borrow from the tuples under comparison; nothing is cloned while a
//! rule is evaluated.

use std::collections::BTreeSet;

use req_types::{Condition, Entity, EntityRef, Operation};

use super::ast::Attribute;
use super::ExprError;

#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Bool(bool),
    Text(&'a str),
    /// Absent optional value (an entity without an owner)
    Nothing,
    Entity(&'a Entity),
    Operation(&'a Operation),
    Entities(&'a [EntityRef]),
    Strings(&'a [String]),
    Modifiers(&'a BTreeSet<String>),
    Conditions(&'a [Condition]),
    Condition(&'a Condition),
}

impl<'a> Value<'a> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Text(_) => "text",
            Value::Nothing => "nothing",
            Value::Entity(_) => "entity",
            Value::Operation(_) => "operation",
            Value::Entities(_) => "entity list",
            Value::Strings(_) => "string list",
            Value::Modifiers(_) => "modifier set",
            Value::Conditions(_) => "condition list",
            Value::Condition(_) => "condition",
        }
    }

    pub fn as_bool(&self, operation: &'static str) -> Result<bool, ExprError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ExprError::Type {
                operation,
                expected: "bool",
                found: other.kind_name(),
            }),
        }
    }

    /// Follow one attribute step. Attributes of `Nothing` are `Nothing`.
    pub fn attribute(self, attribute: Attribute) -> Result<Value<'a>, ExprError> {
        let value = match (self, attribute) {
            (Value::Nothing, _) => Value::Nothing,

            (Value::Entity(e), Attribute::Base) => Value::Text(&e.base),
            (Value::Entity(e), Attribute::Modifier) => Value::Modifiers(&e.modifier),
            (Value::Entity(e), Attribute::IsAll) => Value::Bool(e.is_all),
            (Value::Entity(e), Attribute::Entirety) => match &e.entirety {
                Some(whole) => Value::Entity(whole),
                None => Value::Nothing,
            },

            (Value::Operation(op), Attribute::Predicate) => Value::Text(&op.predicate),
            (Value::Operation(op), Attribute::Not) => Value::Bool(op.not),
            (Value::Operation(op), Attribute::Able) => Value::Bool(op.able),

            (Value::Condition(c), Attribute::Agent) => Value::Entity(&c.agent),
            (Value::Condition(c), Attribute::Operation) => Value::Operation(&c.operation),
            (Value::Condition(c), Attribute::Input) => Value::Entities(&c.input),
            (Value::Condition(c), Attribute::Output) => Value::Entities(&c.output),
            (Value::Condition(c), Attribute::Restriction) => Value::Strings(&c.restriction),

            (other, attribute) => {
                return Err(ExprError::NoAttribute {
                    attribute,
                    found: other.kind_name(),
                })
            }
        };
        Ok(value)
    }

    /// Equality as used by `==` and by the set builtins.
    ///
    /// Lists compare in order; use `set_eq` for order-insensitive comparison.
    /// An entity compared with `Nothing` is unequal rather than an error, so
    /// `a.entirety == b.entirety` works when only one side has an owner.
    pub fn equals(&self, other: &Value<'a>) -> Result<bool, ExprError> {
        let equal = match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::Nothing, Value::Entity(_)) | (Value::Entity(_), Value::Nothing) => false,
            (Value::Entity(a), Value::Entity(b)) => std::ptr::eq(*a, *b) || a == b,
            (Value::Operation(a), Value::Operation(b)) => a == b,
            (Value::Entities(a), Value::Entities(b)) => a == b,
            (Value::Strings(a), Value::Strings(b)) => a == b,
            (Value::Modifiers(a), Value::Modifiers(b)) => a == b,
            (Value::Conditions(a), Value::Conditions(b)) => a == b,
            (Value::Condition(a), Value::Condition(b)) => a == b,
            (left, right) => {
                return Err(ExprError::Incomparable {
                    left: left.kind_name(),
                    right: right.kind_name(),
                })
            }
        };
        Ok(equal)
    }

    /// Members of a list or set value
    pub fn elements(&self, operation: &'static str) -> Result<Vec<Value<'a>>, ExprError> {
        let members = match *self {
            Value::Entities(list) => list.iter().map(|e| Value::Entity(e)).collect(),
            Value::Strings(list) => list.iter().map(|s| Value::Text(s)).collect(),
            Value::Modifiers(set) => set.iter().map(|s| Value::Text(s)).collect(),
            Value::Conditions(list) => list.iter().map(Value::Condition).collect(),
            other => {
                return Err(ExprError::Type {
                    operation,
                    expected: "a list or set",
                    found: other.kind_name(),
                })
            }
        };
        Ok(members)
    }
}

// ============================================================================
// Set operations over element lists
// ============================================================================

pub(crate) fn contains(haystack: &[Value<'_>], needle: &Value<'_>) -> Result<bool, ExprError> {
    for item in haystack {
        if item.equals(needle)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every member of `a` is a member of `b`
pub(crate) fn is_subset(a: &[Value<'_>], b: &[Value<'_>]) -> Result<bool, ExprError> {
    for item in a {
        if !contains(b, item)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn is_disjoint(a: &[Value<'_>], b: &[Value<'_>]) -> Result<bool, ExprError> {
    for item in a {
        if contains(b, item)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_entity_attributes() {
        let car = Arc::new(Entity::new("car"));
        let wheel = Entity::new("wheel").with_modifiers(["front"]).of(Arc::clone(&car));

        let value = Value::Entity(&wheel);
        assert!(matches!(
            value.attribute(Attribute::Base).unwrap(),
            Value::Text("wheel")
        ));
        assert!(matches!(
            value.attribute(Attribute::Entirety).unwrap(),
            Value::Entity(e) if e.base == "car"
        ));

        // the owner has no owner, and attributes of nothing stay nothing
        let nothing = value
            .attribute(Attribute::Entirety)
            .and_then(|v| v.attribute(Attribute::Entirety))
            .and_then(|v| v.attribute(Attribute::Base))
            .unwrap();
        assert!(matches!(nothing, Value::Nothing));
    }

    #[test]
    fn test_missing_attribute_is_error() {
        let op = Operation::new("open");
        let err = Value::Operation(&op).attribute(Attribute::Base).unwrap_err();
        assert_eq!(
            err,
            ExprError::NoAttribute {
                attribute: Attribute::Base,
                found: "operation"
            }
        );
    }

    #[test]
    fn test_equality_rules() {
        let door = Entity::new("door");
        let other_door = Entity::new("door");
        assert!(Value::Entity(&door).equals(&Value::Entity(&other_door)).unwrap());
        assert!(!Value::Entity(&door).equals(&Value::Nothing).unwrap());
        assert!(Value::Text("x").equals(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_set_operations() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "x".to_string(), "z".to_string()];
        let c = vec!["q".to_string()];

        let a = Value::Strings(&a).elements("test").unwrap();
        let b = Value::Strings(&b).elements("test").unwrap();
        let c = Value::Strings(&c).elements("test").unwrap();

        assert!(is_subset(&a, &b).unwrap());
        assert!(!is_subset(&b, &a).unwrap());
        assert!(is_disjoint(&a, &c).unwrap());
        assert!(!is_disjoint(&a, &b).unwrap());
    }
}
