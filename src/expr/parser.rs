//! Comparison expression parser
//!
//! Two passes, like the DSL front end:
//!
//! ```text
//! Source → nom parser → raw Syntax (names as strings)
//!                          ↓
//!               Lowering (scope, builtin and attribute resolution)
//!                          ↓
//!                      Expr (closed AST)
//! ```
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr       := and ("or" and)*
//! and        := unary ("and" unary)*
//! unary      := "not" unary | comparison
//! comparison := primary (("==" | "!=") primary)?
//! primary    := "(" expr ")" | quantified | call | literal | path
//! quantified := ("any" | "all") "(" ident "in" expr "," expr ")"
//! call       := ident "(" (expr ("," expr)*)? ")"
//! literal    := "true" | "false" | "'" text "'"
//! path       := ident ("." ident)*
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value},
    error::{context, convert_error, ContextError, ParseError as NomParseError, VerboseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use super::ast::{Attribute, Builtin, CompareOp, Expr, Quantifier};
use super::ExprError;

/// Variables bound in every comparison body
const COMPARISON_VARS: [&str; 2] = ["a", "b"];

// ============================================================================
// Public API
// ============================================================================

/// Parse and resolve a comparison body over the variables `a` and `b`
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let syntax = match all_consuming(ws(expression::<VerboseError<&str>>))(source) {
        Ok((_, syntax)) => syntax,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ExprError::Syntax(convert_error(source, e)))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ExprError::Syntax("incomplete expression".to_string()))
        }
    };

    let mut scope: Vec<String> = COMPARISON_VARS.iter().map(|v| v.to_string()).collect();
    lower(syntax, &mut scope)
}

// ============================================================================
// Raw syntax
// ============================================================================

#[derive(Debug, Clone)]
enum Syntax {
    Bool(bool),
    Text(String),
    Path(Vec<String>),
    Not(Box<Syntax>),
    And(Vec<Syntax>),
    Or(Vec<Syntax>),
    Compare(CompareOp, Box<Syntax>, Box<Syntax>),
    Call(String, Vec<Syntax>),
    Quantified(Quantifier, String, Box<Syntax>, Box<Syntax>),
}

fn expression<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), cut(and_expr)))(input)?;
    Ok((input, fold(first, rest, Syntax::Or)))
}

fn and_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), cut(unary)))(input)?;
    Ok((input, fold(first, rest, Syntax::And)))
}

fn unary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    alt((
        map(preceded(ws(keyword("not")), cut(unary)), |inner| {
            Syntax::Not(Box::new(inner))
        }),
        comparison,
    ))(input)
}

fn comparison<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    let (input, left) = primary(input)?;
    let (input, right) = opt(pair(
        ws(alt((
            value(CompareOp::Eq, tag("==")),
            value(CompareOp::Ne, tag("!=")),
        ))),
        cut(context("right-hand side of comparison", primary)),
    ))(input)?;

    let syntax = match right {
        Some((op, right)) => Syntax::Compare(op, Box::new(left), Box::new(right)),
        None => left,
    };
    Ok((input, syntax))
}

fn primary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    ws(alt((parenthesized, quantified, call, literal, path)))(input)
}

fn parenthesized<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    delimited(
        char('('),
        ws(expression),
        cut(context("closing parenthesis", char(')'))),
    )(input)
}

fn quantified<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    let (input, quantifier) = alt((
        value(Quantifier::Any, keyword("any")),
        value(Quantifier::All, keyword("all")),
    ))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, var) = identifier(input)?;
    let (input, _) = ws(keyword("in"))(input)?;

    // Committed from here on: `any(x in ...` cannot be a plain call.
    let (input, list) = cut(expression)(input)?;
    let (input, _) = cut(context("',' before quantifier body", ws(char(','))))(input)?;
    let (input, body) = cut(expression)(input)?;
    let (input, _) = cut(context("closing parenthesis", ws(char(')'))))(input)?;

    Ok((
        input,
        Syntax::Quantified(quantifier, var.to_string(), Box::new(list), Box::new(body)),
    ))
}

fn call<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    let (input, name) = identifier(input)?;
    let (input, _) = preceded(multispace0, char('('))(input)?;
    let (input, args) = separated_list0(ws(char(',')), expression)(input)?;
    let (input, _) = cut(context("closing parenthesis", ws(char(')'))))(input)?;
    Ok((input, Syntax::Call(name.to_string(), args)))
}

fn literal<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    alt((
        value(Syntax::Bool(true), keyword("true")),
        value(Syntax::Bool(false), keyword("false")),
        map(
            delimited(
                char('\''),
                take_while(|c| c != '\''),
                cut(context("closing quote", char('\''))),
            ),
            |text: &str| Syntax::Text(text.to_string()),
        ),
    ))(input)
}

fn path<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Syntax, E> {
    map(separated_list1(char('.'), identifier), |segments| {
        Syntax::Path(segments.into_iter().map(str::to_string).collect())
    })(input)
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword<'a, E: NomParseError<&'a str>>(
    kw: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    terminated(tag(kw), not(satisfy(is_ident_char)))
}

fn ws<'a, O, E: NomParseError<&'a str>, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn fold(first: Syntax, rest: Vec<Syntax>, combine: fn(Vec<Syntax>) -> Syntax) -> Syntax {
    if rest.is_empty() {
        first
    } else {
        let mut items = Vec::with_capacity(rest.len() + 1);
        items.push(first);
        items.extend(rest);
        combine(items)
    }
}

// ============================================================================
// Lowering
// ============================================================================

fn lower(syntax: Syntax, scope: &mut Vec<String>) -> Result<Expr, ExprError> {
    let expr = match syntax {
        Syntax::Bool(b) => Expr::Bool(b),
        Syntax::Text(text) => Expr::Text(text),
        Syntax::Path(mut segments) => {
            let name = segments.remove(0);
            if !scope.contains(&name) {
                return Err(ExprError::UnboundVariable(name));
            }
            let attrs = segments
                .iter()
                .map(|s| Attribute::from_name(s).ok_or_else(|| ExprError::UnknownAttribute(s.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            Expr::Var { name, attrs }
        }
        Syntax::Not(inner) => Expr::Not(Box::new(lower(*inner, scope)?)),
        Syntax::And(items) => Expr::And(lower_all(items, scope)?),
        Syntax::Or(items) => Expr::Or(lower_all(items, scope)?),
        Syntax::Compare(op, left, right) => Expr::Compare {
            op,
            left: Box::new(lower(*left, scope)?),
            right: Box::new(lower(*right, scope)?),
        },
        Syntax::Call(name, args) => {
            let func =
                Builtin::from_name(&name).ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            if args.len() != func.arity() {
                return Err(ExprError::Arity {
                    name,
                    expected: func.arity(),
                    found: args.len(),
                });
            }
            Expr::Call {
                func,
                args: lower_all(args, scope)?,
            }
        }
        Syntax::Quantified(quantifier, var, list, body) => {
            let list = lower(*list, scope)?;
            scope.push(var.clone());
            let body = lower(*body, scope);
            scope.pop();
            Expr::Quantified {
                quantifier,
                var,
                list: Box::new(list),
                body: Box::new(body?),
            }
        }
    };
    Ok(expr)
}

fn lower_all(items: Vec<Syntax>, scope: &mut Vec<String>) -> Result<Vec<Expr>, ExprError> {
    items.into_iter().map(|item| lower(item, scope)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str, attrs: &[Attribute]) -> Expr {
        Expr::Var {
            name: name.to_string(),
            attrs: attrs.to_vec(),
        }
    }

    #[test]
    fn test_parse_equality() {
        let expr = parse_expression("a == b").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                op: CompareOp::Eq,
                left: Box::new(var("a", &[])),
                right: Box::new(var("b", &[])),
            }
        );
    }

    #[test]
    fn test_parse_precedence() {
        // `and` binds tighter than `or`, `not` tighter than `and`
        let expr = parse_expression("not a.is_all and a.base == b.base or empty(a.modifier)").unwrap();
        match expr {
            Expr::Or(items) => {
                assert_eq!(items.len(), 2);
                match &items[0] {
                    Expr::And(parts) => {
                        assert_eq!(parts[0], Expr::Not(Box::new(var("a", &[Attribute::IsAll]))));
                    }
                    other => panic!("Expected And, got {:?}", other),
                }
                assert!(matches!(
                    &items[1],
                    Expr::Call {
                        func: Builtin::Empty,
                        ..
                    }
                ));
            }
            other => panic!("Expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_operation_attributes() {
        let expr = parse_expression("a.predicate == b.predicate and a.not != b.not").unwrap();
        match expr {
            Expr::And(parts) => assert_eq!(
                parts[1],
                Expr::Compare {
                    op: CompareOp::Ne,
                    left: Box::new(var("a", &[Attribute::Not])),
                    right: Box::new(var("b", &[Attribute::Not])),
                }
            ),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_quantifier_binds_variable() {
        let expr = parse_expression("all(y in b, any(x in a, x.base == y.base))").unwrap();
        match expr {
            Expr::Quantified {
                quantifier, var, ..
            } => {
                assert_eq!(quantifier, Quantifier::All);
                assert_eq!(var, "y");
            }
            other => panic!("Expected Quantified, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_literal() {
        let expr = parse_expression("a.base == 'door'").unwrap();
        assert!(matches!(
            expr,
            Expr::Compare { right, .. } if *right == Expr::Text("door".to_string())
        ));
    }

    #[test]
    fn test_unbound_variable_rejected() {
        let err = parse_expression("c == b").unwrap_err();
        assert!(matches!(err, ExprError::UnboundVariable(name) if name == "c"));

        // quantifier variables do not leak out of their body
        let err = parse_expression("any(x in a, true) and x == b").unwrap_err();
        assert!(matches!(err, ExprError::UnboundVariable(name) if name == "x"));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert!(matches!(
            parse_expression("eval(a)").unwrap_err(),
            ExprError::UnknownFunction(name) if name == "eval"
        ));
        assert!(matches!(
            parse_expression("subset(a)").unwrap_err(),
            ExprError::Arity { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        assert!(matches!(
            parse_expression("a.colour == b.colour").unwrap_err(),
            ExprError::UnknownAttribute(name) if name == "colour"
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_expression("a == ").unwrap_err(),
            ExprError::Syntax(_)
        ));
        assert!(matches!(
            parse_expression("(a == b").unwrap_err(),
            ExprError::Syntax(_)
        ));
        assert!(matches!(
            parse_expression("lambda a, b: a == b").unwrap_err(),
            ExprError::Syntax(_)
        ));
    }

    #[test]
    fn test_calls_detects_builtin() {
        let expr = parse_expression("empty(a) or condition_set_include(a, b)").unwrap();
        assert!(expr.calls(Builtin::ConditionSetInclude));
        assert!(!expr.calls(Builtin::ConditionContradict));
    }
}
