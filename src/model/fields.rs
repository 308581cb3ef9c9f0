//! Named field access over requirement tuples
//!
//! Rules address fields by name (`1 input include 2 output`), so both tuple
//! shapes expose their fields through [`Tuple`]. A condition has no `event`
//! field; asking for one yields `None`, which the operator registry turns
//! into a missing-field error.

use req_types::{Condition, Req};

use crate::expr::Value;

pub trait Tuple {
    /// Human-readable tuple kind for error messages
    fn kind(&self) -> &'static str;

    /// Borrow a field by name
    fn field(&self, name: &str) -> Option<Value<'_>>;
}

impl Tuple for Req {
    fn kind(&self) -> &'static str {
        "requirement"
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        let value = match name {
            "agent" => Value::Entity(&self.agent),
            "operation" => Value::Operation(&self.operation),
            "input" => Value::Entities(&self.input),
            "output" => Value::Entities(&self.output),
            "restriction" => Value::Strings(&self.restriction),
            "event" => Value::Conditions(&self.event),
            _ => return None,
        };
        Some(value)
    }
}

impl Tuple for Condition {
    fn kind(&self) -> &'static str {
        "condition"
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        let value = match name {
            "agent" => Value::Entity(&self.agent),
            "operation" => Value::Operation(&self.operation),
            "input" => Value::Entities(&self.input),
            "output" => Value::Entities(&self.output),
            "restriction" => Value::Strings(&self.restriction),
            _ => return None,
        };
        Some(value)
    }
}
