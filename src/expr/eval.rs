//! Expression interpreter

use tracing::trace;

use super::ast::{Builtin, CompareOp, Expr, Quantifier};
use super::value::{is_disjoint, is_subset, Value};
use super::ExprError;
use crate::error::Result;
use crate::operators::CompositeHelpers;

/// Variable bindings, innermost last
pub type Env<'a> = Vec<(&'a str, Value<'a>)>;

/// Evaluate a comparison body with `a` and `b` bound; the result must be a bool
pub fn evaluate_comparison<'a>(
    expr: &'a Expr,
    a: Value<'a>,
    b: Value<'a>,
    helpers: &dyn CompositeHelpers,
) -> Result<bool> {
    let mut env: Env<'a> = vec![("a", a), ("b", b)];
    let result = evaluate(expr, &mut env, helpers)?;
    Ok(result.as_bool("comparison")?)
}

/// Evaluate an expression in `env`
pub fn evaluate<'a>(
    expr: &'a Expr,
    env: &mut Env<'a>,
    helpers: &dyn CompositeHelpers,
) -> Result<Value<'a>> {
    let value = match expr {
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Text(text) => Value::Text(text),
        Expr::Var { name, attrs } => {
            let mut value = lookup(env, name)?;
            for attr in attrs {
                value = value.attribute(*attr)?;
            }
            value
        }
        Expr::Not(inner) => Value::Bool(!evaluate(inner, env, helpers)?.as_bool("not")?),
        Expr::And(items) => {
            for item in items {
                if !evaluate(item, env, helpers)?.as_bool("and")? {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        Expr::Or(items) => {
            for item in items {
                if evaluate(item, env, helpers)?.as_bool("or")? {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
        Expr::Compare { op, left, right } => {
            let left = evaluate(left, env, helpers)?;
            let right = evaluate(right, env, helpers)?;
            let equal = left.equals(&right)?;
            Value::Bool(match op {
                CompareOp::Eq => equal,
                CompareOp::Ne => !equal,
            })
        }
        Expr::Call { func, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, env, helpers)?);
            }
            Value::Bool(call(*func, &values, helpers)?)
        }
        Expr::Quantified {
            quantifier,
            var,
            list,
            body,
        } => {
            let members = evaluate(list, env, helpers)?.elements("quantifier")?;
            Value::Bool(quantify(*quantifier, var, &members, body, env, helpers)?)
        }
    };
    Ok(value)
}

fn lookup<'a>(env: &Env<'a>, name: &str) -> std::result::Result<Value<'a>, ExprError> {
    env.iter()
        .rev()
        .find(|(bound, _)| *bound == name)
        .map(|(_, value)| *value)
        .ok_or_else(|| ExprError::UnboundVariable(name.to_string()))
}

fn quantify<'a>(
    quantifier: Quantifier,
    var: &'a str,
    members: &[Value<'a>],
    body: &'a Expr,
    env: &mut Env<'a>,
    helpers: &dyn CompositeHelpers,
) -> Result<bool> {
    let wanted = quantifier == Quantifier::Any;
    for member in members {
        env.push((var, *member));
        let result = evaluate(body, env, helpers).and_then(|v| Ok(v.as_bool("quantifier body")?));
        env.pop();
        if result? == wanted {
            return Ok(wanted);
        }
    }
    Ok(!wanted)
}

fn call(func: Builtin, args: &[Value<'_>], helpers: &dyn CompositeHelpers) -> Result<bool> {
    trace!(function = func.name(), "builtin call");
    let name = func.name();
    let result = match (func, args) {
        (Builtin::SetEq, [a, b]) => {
            let (a, b) = (a.elements(name)?, b.elements(name)?);
            is_subset(&a, &b)? && is_subset(&b, &a)?
        }
        (Builtin::Subset, [a, b]) => is_subset(&a.elements(name)?, &b.elements(name)?)?,
        (Builtin::Disjoint, [a, b]) => is_disjoint(&a.elements(name)?, &b.elements(name)?)?,
        (Builtin::Empty, [a]) => a.elements(name)?.is_empty(),
        (Builtin::EntitySetInclude, [Value::Entities(a), Value::Entities(b)]) => {
            helpers.entity_set_include(a, b)?
        }
        (Builtin::ConditionSetInclude, [Value::Conditions(a), Value::Conditions(b)]) => {
            helpers.condition_set_include(a, b)?
        }
        (Builtin::ConditionContradict, [Value::Conditions(a)]) => helpers.condition_contradict(a)?,
        (Builtin::EntitySetInclude, [a, b]) => return Err(helper_type_error(name, "entity list", a, b)),
        (Builtin::ConditionSetInclude, [a, b]) => {
            return Err(helper_type_error(name, "condition list", a, b))
        }
        (_, args) => {
            return Err(ExprError::Arity {
                name: name.to_string(),
                expected: func.arity(),
                found: args.len(),
            }
            .into())
        }
    };
    Ok(result)
}

fn helper_type_error(
    operation: &'static str,
    expected: &'static str,
    a: &Value<'_>,
    b: &Value<'_>,
) -> crate::error::DetectionError {
    let found = if a.kind_name() == expected {
        b.kind_name()
    } else {
        a.kind_name()
    };
    ExprError::Type {
        operation,
        expected,
        found,
    }
    .into()
}
