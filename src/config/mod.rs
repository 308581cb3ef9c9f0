//! Rules document configuration
//!
//! The detection behaviour is driven entirely by one YAML document: field
//! types, the types each relation may be applied to, per-type comparison
//! expressions and the named rules.

pub mod loader;
pub mod types;

pub use loader::{parse_rules_yaml, ConfigLoader, RulesSource, BUILTIN_RULES, RULES_ENV_VAR};
pub use types::RulesConfig;
