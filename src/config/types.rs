//! Rules document types
//!
//! Serde types for the YAML rules document. Keys use the spaced names of
//! the document (`field types`, `allowed types`), mapped to snake case here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesConfig {
    /// Field name → type tag (`input: entity-set`)
    #[serde(rename = "field types", default)]
    pub field_types: BTreeMap<String, String>,

    /// Relation name → type tags the relation may be applied to
    #[serde(rename = "allowed types", default)]
    pub allowed_types: BTreeMap<String, Vec<String>>,

    /// Relation name → type tag → comparison expression over `a` and `b`
    #[serde(default)]
    pub operators: BTreeMap<String, BTreeMap<String, String>>,

    /// Named rules in definition order. A rule may only reference rules
    /// defined above it, so the mapping order is significant.
    #[serde(default)]
    pub rules: serde_yaml::Mapping,
}

impl RulesConfig {
    /// Rule names in definition order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().filter_map(|k| k.as_str())
    }
}
