//! Rule Compiler
//!
//! Compiles the `rules` section of the rules document into a [`RuleSet`]:
//! named predicates over an ordered pair of tuples `(x, y)`.
//!
//! ## Grammar
//!
//! ```yaml
//! some rule: 1 agent equal 2 agent        # base relation, 1 = x, 2 = y
//! other rule:
//!   and:                                  # also: or
//!     - 1 operation contradict 2 operation
//!     - not: 1 restriction contradict 2 restriction
//!     - function: some rule               # call a rule defined above
//!     - for:                              # quantify over a condition list
//!         label: or                       # or = any, and = all
//!         index: 1                        # side owning the list
//!         field: event
//!         condition: 1 agent equal 2 agent
//! ```
//!
//! In a `for`, each element of the list takes the argument position of the
//! side that owns the list; the other side is passed through unchanged.
//!
//! Base relations are type-checked against the operator registry while
//! compiling, so a rules document that compiles cannot raise type errors at
//! detection time. Missing fields and non-iterable lists are still checked
//! per evaluation.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, info, warn};

use req_types::{Condition, EntityRef};

use crate::config::RulesConfig;
use crate::error::{DetectionError, Result};
use crate::expr::{ExprError, Quantifier, Value};
use crate::model::Tuple;
use crate::operators::{CompositeHelpers, OperatorRegistry, Relation, ENTITY_TYPE};

pub const CONDITION_INCLUDE: &str = "condition include";
pub const CONDITION_CONTRADICT: &str = "condition contradict";
pub const OPERATION_INCONSISTENCY: &str = "operation inconsistency";
pub const RESTRICTION_INCONSISTENCY: &str = "restriction inconsistency";
pub const EVENT_INCONSISTENCY: &str = "event inconsistency";
pub const OPERATION_INCLUSION: &str = "operation inclusion";
pub const EVENT_INCLUSION: &str = "event inclusion";
pub const OPERATION_EVENT_INTERLOCK: &str = "operation event interlock";
pub const INPUT_OUTPUT_INTERLOCK: &str = "input output interlock";

/// Rules the scanner and the composite helpers call by name
pub const REQUIRED_RULES: [&str; 8] = [
    CONDITION_INCLUDE,
    CONDITION_CONTRADICT,
    OPERATION_INCONSISTENCY,
    RESTRICTION_INCONSISTENCY,
    EVENT_INCONSISTENCY,
    OPERATION_INCLUSION,
    EVENT_INCLUSION,
    OPERATION_EVENT_INTERLOCK,
];

// ============================================================================
// RULE AST
// ============================================================================

/// Which tuple of the pair an index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Index `1`
    X,
    /// Index `2`
    Y,
}

impl Side {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Side::X),
            "2" => Some(Side::Y),
            _ => None,
        }
    }

    fn pick<'t>(self, x: &'t dyn Tuple, y: &'t dyn Tuple) -> &'t dyn Tuple {
        match self {
            Side::X => x,
            Side::Y => y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Relation {
        left: Side,
        field1: String,
        relation: Relation,
        right: Side,
        field2: String,
    },
    Not(Box<Rule>),
    And(Vec<Rule>),
    Or(Vec<Rule>),
    /// Call of an earlier rule, by position in the rule set
    Named { index: usize, name: String },
    For {
        quantifier: Quantifier,
        owner: Side,
        field: String,
        body: Box<Rule>,
    },
    /// No event inconsistency either way, and an output of `x` includes an
    /// input of `y`
    InputOutputInterlock { event_inconsistency: usize },
}

#[derive(Debug, Clone)]
pub struct NamedRule {
    pub name: String,
    pub rule: Rule,
}

// ============================================================================
// COMPILER
// ============================================================================

struct Compiler<'c> {
    operators: &'c OperatorRegistry,
    defined: &'c HashMap<String, usize>,
    rule: &'c str,
}

impl Compiler<'_> {
    fn compile(&self, definition: &YamlValue) -> Result<Rule> {
        match definition {
            YamlValue::String(text) => self.base_relation(text),
            YamlValue::Mapping(map) => self.labelled(map),
            other => Err(DetectionError::syntax(
                self.rule,
                format!(
                    "expected a base relation or a labelled rule, found {}",
                    yaml_kind(other)
                ),
            )),
        }
    }

    fn labelled(&self, map: &Mapping) -> Result<Rule> {
        let mut entries = map.iter();
        let (label, content) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(DetectionError::syntax(
                    self.rule,
                    format!("expected exactly one label, found {}", map.len()),
                ))
            }
        };

        match label.as_str() {
            Some("and") => Ok(Rule::And(self.compile_list("and", content)?)),
            Some("or") => Ok(Rule::Or(self.compile_list("or", content)?)),
            Some("not") => Ok(Rule::Not(Box::new(self.compile(content)?))),
            Some("function") => self.named(content),
            Some("for") => self.quantified(content),
            Some(other) => Err(DetectionError::syntax(
                self.rule,
                format!("unrecognized label '{}'", other),
            )),
            None => Err(DetectionError::syntax(self.rule, "labels must be strings")),
        }
    }

    fn compile_list(&self, label: &str, content: &YamlValue) -> Result<Vec<Rule>> {
        let items = content.as_sequence().ok_or_else(|| {
            DetectionError::syntax(self.rule, format!("'{}' takes a list of rules", label))
        })?;
        if items.is_empty() {
            return Err(DetectionError::syntax(
                self.rule,
                format!("'{}' needs at least one rule", label),
            ));
        }
        items.iter().map(|item| self.compile(item)).collect()
    }

    /// `index1 field1 relation index2 field2`
    fn base_relation(&self, text: &str) -> Result<Rule> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [index1, field1, relation, index2, field2] = tokens[..] else {
            return Err(DetectionError::syntax(
                self.rule,
                format!(
                    "base relation '{}' must read 'index field relation index field'",
                    text
                ),
            ));
        };

        let side = |token: &str| {
            Side::from_token(token).ok_or_else(|| {
                DetectionError::syntax(
                    self.rule,
                    format!("index '{}' in '{}' must be 1 or 2", token, text),
                )
            })
        };
        let left = side(index1)?;
        let right = side(index2)?;
        let relation: Relation = relation.parse()?;

        self.operators.check(field1, relation, field2)?;

        Ok(Rule::Relation {
            left,
            field1: field1.to_string(),
            relation,
            right,
            field2: field2.to_string(),
        })
    }

    fn named(&self, content: &YamlValue) -> Result<Rule> {
        let name = content
            .as_str()
            .ok_or_else(|| DetectionError::syntax(self.rule, "'function' takes a rule name"))?;
        let index = self
            .defined
            .get(name)
            .copied()
            .ok_or_else(|| DetectionError::UndefinedRule {
                rule: self.rule.to_string(),
                target: name.to_string(),
            })?;
        Ok(Rule::Named {
            index,
            name: name.to_string(),
        })
    }

    fn quantified(&self, content: &YamlValue) -> Result<Rule> {
        let body = content
            .as_mapping()
            .ok_or_else(|| DetectionError::syntax(self.rule, "'for' takes a mapping"))?;
        let get = |key: &str| {
            body.get(key).ok_or_else(|| {
                DetectionError::syntax(self.rule, format!("'for' is missing '{}'", key))
            })
        };

        let quantifier = match get("label")?.as_str() {
            Some("or") => Quantifier::Any,
            Some("and") => Quantifier::All,
            _ => {
                return Err(DetectionError::syntax(
                    self.rule,
                    "'for' label must be 'and' or 'or'",
                ))
            }
        };

        let index = get("index")?;
        let owner = match index {
            YamlValue::Number(n) => n.as_u64().and_then(|n| Side::from_token(&n.to_string())),
            YamlValue::String(s) => Side::from_token(s),
            _ => None,
        }
        .ok_or_else(|| DetectionError::syntax(self.rule, "'for' index must be 1 or 2"))?;

        let field = get("field")?
            .as_str()
            .ok_or_else(|| DetectionError::syntax(self.rule, "'for' field must be a field name"))?;
        self.operators.field_type(field)?;

        let condition = self.compile(get("condition")?)?;

        Ok(Rule::For {
            quantifier,
            owner,
            field: field.to_string(),
            body: Box::new(condition),
        })
    }
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "nothing",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a list",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}

// ============================================================================
// RULE SET
// ============================================================================

/// Compiled, immutable rules plus the operator registry they run on
#[derive(Debug, Clone)]
pub struct RuleSet {
    operators: OperatorRegistry,
    rules: Vec<NamedRule>,
    index: HashMap<String, usize>,
}

impl RuleSet {
    /// Compile the whole rules document
    pub fn from_config(config: &RulesConfig) -> Result<Self> {
        let operators = OperatorRegistry::from_config(config)?;
        let mut rules: Vec<NamedRule> = Vec::with_capacity(config.rules.len() + 1);
        let mut index: HashMap<String, usize> = HashMap::new();

        for (key, definition) in &config.rules {
            let name = key.as_str().ok_or_else(|| {
                DetectionError::syntax(&format!("{:?}", key), "rule names must be strings")
            })?;
            if name == INPUT_OUTPUT_INTERLOCK {
                warn!(
                    "Rule '{}' is derived; the definition in the rules document is ignored",
                    name
                );
                continue;
            }

            let compiler = Compiler {
                operators: &operators,
                defined: &index,
                rule: name,
            };
            let rule = compiler.compile(definition).map_err(|e| match e {
                DetectionError::Syntax { .. } | DetectionError::UndefinedRule { .. } => e,
                other => DetectionError::in_rule(name, other),
            })?;

            debug!(rule = name, "compiled rule");
            index.insert(name.to_string(), rules.len());
            rules.push(NamedRule {
                name: name.to_string(),
                rule,
            });
        }

        if let Some(missing) = REQUIRED_RULES.iter().find(|name| !index.contains_key(**name)) {
            return Err(DetectionError::MissingRule(missing.to_string()));
        }

        let event_inconsistency = index[EVENT_INCONSISTENCY];
        index.insert(INPUT_OUTPUT_INTERLOCK.to_string(), rules.len());
        rules.push(NamedRule {
            name: INPUT_OUTPUT_INTERLOCK.to_string(),
            rule: Rule::InputOutputInterlock { event_inconsistency },
        });

        info!("Compiled {} rules", rules.len());
        Ok(Self {
            operators,
            rules,
            index,
        })
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i].rule)
    }

    /// Rule names in definition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Evaluate the named rule on `(x, y)`
    pub fn judge(&self, name: &str, x: &dyn Tuple, y: &dyn Tuple) -> Result<bool> {
        let index = self
            .index
            .get(name)
            .copied()
            .ok_or_else(|| DetectionError::MissingRule(name.to_string()))?;
        self.judge_at(index, x, y)
    }

    fn judge_at(&self, index: usize, x: &dyn Tuple, y: &dyn Tuple) -> Result<bool> {
        let named = &self.rules[index];
        self.eval(&named.rule, x, y)
            .map_err(|e| DetectionError::in_rule(&named.name, e))
    }

    fn eval(&self, rule: &Rule, x: &dyn Tuple, y: &dyn Tuple) -> Result<bool> {
        match rule {
            Rule::Relation {
                left,
                field1,
                relation,
                right,
                field2,
            } => self.operators.evaluate(
                self,
                left.pick(x, y),
                field1,
                *relation,
                right.pick(x, y),
                field2,
            ),
            Rule::Not(inner) => Ok(!self.eval(inner, x, y)?),
            Rule::And(items) => {
                for item in items {
                    if !self.eval(item, x, y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or(items) => {
                for item in items {
                    if self.eval(item, x, y)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Rule::Named { index, .. } => self.judge_at(*index, x, y),
            Rule::For {
                quantifier,
                owner,
                field,
                body,
            } => self.eval_for(*quantifier, *owner, field, body, x, y),
            Rule::InputOutputInterlock {
                event_inconsistency,
            } => {
                if self.judge_at(*event_inconsistency, x, y)?
                    || self.judge_at(*event_inconsistency, y, x)?
                {
                    return Ok(false);
                }
                let outputs = entity_list(x, "output")?;
                let inputs = entity_list(y, "input")?;
                for produced in outputs {
                    for consumed in inputs {
                        if self.operators.compare(
                            self,
                            Relation::Include,
                            ENTITY_TYPE,
                            Value::Entity(produced),
                            Value::Entity(consumed),
                        )? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }

    fn eval_for(
        &self,
        quantifier: Quantifier,
        owner: Side,
        field: &str,
        body: &Rule,
        x: &dyn Tuple,
        y: &dyn Tuple,
    ) -> Result<bool> {
        let source = owner.pick(x, y);
        let list = match source.field(field) {
            Some(Value::Conditions(list)) => list,
            Some(other) => {
                return Err(DetectionError::NotIterable {
                    field: field.to_string(),
                    found: other.kind_name(),
                })
            }
            None => {
                return Err(DetectionError::MissingField {
                    field: field.to_string(),
                    tuple: source.kind(),
                })
            }
        };

        let wanted = quantifier == Quantifier::Any;
        for element in list {
            let holds = match owner {
                Side::X => self.eval(body, element, y)?,
                Side::Y => self.eval(body, x, element)?,
            };
            if holds == wanted {
                return Ok(wanted);
            }
        }
        Ok(!wanted)
    }
}

fn entity_list<'t>(tuple: &'t dyn Tuple, field: &str) -> Result<&'t [EntityRef]> {
    match tuple.field(field) {
        Some(Value::Entities(list)) => Ok(list),
        Some(other) => Err(ExprError::Type {
            operation: "input output interlock",
            expected: "entity list",
            found: other.kind_name(),
        }
        .into()),
        None => Err(DetectionError::MissingField {
            field: field.to_string(),
            tuple: tuple.kind(),
        }),
    }
}

impl CompositeHelpers for RuleSet {
    fn entity_set_include(&self, a: &[EntityRef], b: &[EntityRef]) -> Result<bool> {
        self.operators.entity_set_include_with(self, a, b)
    }

    /// `condition include` is judged as `(c_b, c_a)`: the rule reads "the
    /// second condition covers the first".
    fn condition_set_include(&self, a: &[Condition], b: &[Condition]) -> Result<bool> {
        for c_a in a {
            for c_b in b {
                if self.judge(CONDITION_INCLUDE, c_b, c_a)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn condition_contradict(&self, a: &[Condition]) -> Result<bool> {
        for (i, c1) in a.iter().enumerate() {
            for (j, c2) in a.iter().enumerate() {
                if i != j && self.judge(CONDITION_CONTRADICT, c1, c2)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_rules_yaml, BUILTIN_RULES};
    use req_types::{Entity, Operation, Req};
    use std::sync::Arc;

    fn builtin_config() -> RulesConfig {
        parse_rules_yaml(BUILTIN_RULES).unwrap()
    }

    /// The built-in document plus one extra rule called `probe`
    fn with_probe(definition: &str) -> Result<RuleSet> {
        let mut config = builtin_config();
        config.rules.insert(
            YamlValue::String("probe".to_string()),
            serde_yaml::from_str(definition).unwrap(),
        );
        RuleSet::from_config(&config)
    }

    fn req(agent: &str, op: Operation) -> Req {
        let mut req = Req::new(1);
        req.agent = Arc::new(Entity::new(agent));
        req.operation = op;
        req
    }

    #[test]
    fn test_builtin_rules_compile() {
        let rules = RuleSet::from_config(&builtin_config()).unwrap();
        for name in REQUIRED_RULES {
            assert!(rules.contains(name), "missing {}", name);
        }
        assert_eq!(rules.names().last(), Some(INPUT_OUTPUT_INTERLOCK));
    }

    #[test]
    fn test_base_relation_compiles_sides() {
        let rules = with_probe("'2 input include 1 output'").unwrap();
        assert_eq!(
            rules.rule("probe"),
            Some(&Rule::Relation {
                left: Side::Y,
                field1: "input".to_string(),
                relation: Relation::Include,
                right: Side::X,
                field2: "output".to_string(),
            })
        );
    }

    #[test]
    fn test_unrecognized_label() {
        let err = with_probe("xor: ['1 agent equal 2 agent']").unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Syntax { ref rule, ref message }
                if rule == "probe" && message.contains("'xor'")
        ));
    }

    #[test]
    fn test_malformed_base_relations() {
        for definition in ["'1 agent equal 2'", "'3 agent equal 2 agent'", "'1 agent equal 2 agent extra'"] {
            let err = with_probe(definition).unwrap_err();
            assert!(matches!(err, DetectionError::Syntax { .. }), "{} gave {:?}", definition, err);
        }
    }

    #[test]
    fn test_type_errors_at_compile_time() {
        let err = with_probe("'1 agent equal 2 restriction'").unwrap_err();
        assert!(matches!(err.root_cause(), DetectionError::TypeMismatch { .. }));
        assert!(err.to_string().starts_with("in rule 'probe'"));

        let err = with_probe("'1 agent contradict 2 agent'").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DetectionError::RelationNotPermitted { .. }
        ));

        let err = with_probe("'1 agent overlaps 2 agent'").unwrap_err();
        assert!(matches!(err.root_cause(), DetectionError::UnknownRelation(_)));
    }

    #[test]
    fn test_undefined_and_forward_references() {
        let err = with_probe("function: no such rule").unwrap_err();
        assert!(matches!(
            err,
            DetectionError::UndefinedRule { ref target, .. } if target == "no such rule"
        ));

        // a rule cannot call itself
        let err = with_probe("function: probe").unwrap_err();
        assert!(matches!(err, DetectionError::UndefinedRule { .. }));
    }

    #[test]
    fn test_missing_required_rule() {
        let mut config = builtin_config();
        config.rules.remove("event inclusion");
        let err = RuleSet::from_config(&config).unwrap_err();
        assert!(matches!(err, DetectionError::MissingRule(ref name) if name == EVENT_INCLUSION));
    }

    #[test]
    fn test_for_iterates_owner_side() {
        let mut x = req("guard", Operation::new("open"));
        x.event.push(Condition::new(Entity::new("alarm"), Operation::new("ring")));
        let y = req("alarm", Operation::new("ring"));

        // index 1: elements of x.event against y
        let rules = with_probe(
            "for: {label: or, index: 1, field: event, condition: '1 agent equal 2 agent'}",
        )
        .unwrap();
        assert!(rules.judge("probe", &x, &y).unwrap());
        assert!(!rules.judge("probe", &y, &x).unwrap());

        // index 2: x against elements of y.event
        let rules = with_probe(
            "for: {label: or, index: '2', field: event, condition: '1 agent equal 2 agent'}",
        )
        .unwrap();
        assert!(!rules.judge("probe", &x, &y).unwrap());
        assert!(rules.judge("probe", &y, &x).unwrap());
    }

    #[test]
    fn test_for_over_empty_list() {
        let x = req("guard", Operation::new("open"));
        let y = req("guard", Operation::new("open"));
        let any = with_probe(
            "for: {label: or, index: 1, field: event, condition: '1 agent equal 2 agent'}",
        )
        .unwrap();
        let all = with_probe(
            "for: {label: and, index: 1, field: event, condition: '1 agent equal 2 agent'}",
        )
        .unwrap();
        assert!(!any.judge("probe", &x, &y).unwrap());
        assert!(all.judge("probe", &x, &y).unwrap());
    }

    #[test]
    fn test_for_requires_condition_list() {
        let x = req("guard", Operation::new("open"));
        let rules = with_probe(
            "for: {label: or, index: 1, field: input, condition: '1 agent equal 2 agent'}",
        )
        .unwrap();
        let err = rules.judge("probe", &x, &x).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DetectionError::NotIterable { found: "entity list", .. }
        ));
    }

    #[test]
    fn test_missing_field_on_condition() {
        let rules = with_probe("'1 event equal 2 event'").unwrap();
        let condition = Condition::new(Entity::new("alarm"), Operation::new("ring"));
        let err = rules.judge("probe", &condition, &condition).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DetectionError::MissingField { tuple: "condition", .. }
        ));
    }

    #[test]
    fn test_condition_contradict_ignores_self_pairs() {
        let rules = RuleSet::from_config(&builtin_config()).unwrap();
        let door = Arc::new(Entity::new("door"));

        let mut lock = Condition::new(Entity::new("guard"), Operation::new("lock"));
        lock.input.push(Arc::clone(&door));
        let mut keep_open = Condition::new(Entity::new("guard"), Operation::negated("lock"));
        keep_open.input.push(door);

        assert!(!rules.condition_contradict(&[lock.clone()]).unwrap());
        assert!(!rules.condition_contradict(&[lock.clone(), lock.clone()]).unwrap());
        assert!(rules.condition_contradict(&[lock, keep_open]).unwrap());
    }

    #[test]
    fn test_condition_set_include() {
        let rules = RuleSet::from_config(&builtin_config()).unwrap();
        let anyone_rings = Condition::new(Entity::new("alarm").all(), Operation::new("ring"));
        let fire_alarm_rings = Condition::new(
            Entity::new("alarm").with_modifiers(["fire"]),
            Operation::new("ring"),
        );

        // the rule itself reads "second covers first"
        assert!(rules
            .judge(CONDITION_INCLUDE, &fire_alarm_rings, &anyone_rings)
            .unwrap());
        assert!(!rules
            .judge(CONDITION_INCLUDE, &anyone_rings, &fire_alarm_rings)
            .unwrap());

        // the helper judges (element of b, element of a)
        assert!(rules
            .condition_set_include(&[anyone_rings.clone()], &[fire_alarm_rings.clone()])
            .unwrap());
        assert!(!rules
            .condition_set_include(&[fire_alarm_rings], &[anyone_rings])
            .unwrap());
        assert!(!rules.condition_set_include(&[], &[]).unwrap());
    }

    #[test]
    fn test_io_interlock_definition_is_overridden() {
        let mut config = builtin_config();
        config.rules.insert(
            YamlValue::String(INPUT_OUTPUT_INTERLOCK.to_string()),
            YamlValue::String("1 agent equal 2 agent".to_string()),
        );
        let rules = RuleSet::from_config(&config).unwrap();
        assert!(matches!(
            rules.rule(INPUT_OUTPUT_INTERLOCK),
            Some(Rule::InputOutputInterlock { .. })
        ));

        let a = req("clerk", Operation::new("file"));
        assert!(!rules.judge(INPUT_OUTPUT_INTERLOCK, &a, &a).unwrap());
    }

    #[test]
    fn test_unknown_rule_name() {
        let rules = RuleSet::from_config(&builtin_config()).unwrap();
        let x = Req::new(1);
        assert!(matches!(
            rules.judge("nonsense", &x, &x).unwrap_err(),
            DetectionError::MissingRule(_)
        ));
    }
}
