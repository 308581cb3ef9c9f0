//! Textual tuple parser
//!
//! Reads the persisted form produced by the `Display` impls in `req_types`:
//!
//! ```text
//! (4) , (2) , ({(*system*) , (detect) , (*void*) , ([wet]floor) , (*void*)}) ,
//!     (ALL [new]user) , (ABLE NOT enter) , (room[of building]) , (*void*) , (at night)
//! ```
//!
//! Reserved characters inside a value are escaped with `\`.
//!
//! Entities come back out of the session [`EntityPool`], so parsed
//! requirements share canonical handles with everything else in the session.

use std::num::ParseIntError;
use std::sync::Arc;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{anychar, char, digit1},
    combinator::{all_consuming, map, map_res, opt, value, verify},
    error::{
        context, convert_error, ContextError, FromExternalError, ParseError as NomParseError,
        VerboseError,
    },
    multi::{many0, separated_list1},
    sequence::delimited,
    IResult,
};
use thiserror::Error;

use req_types::{
    Condition, Entity, EntityRef, Operation, Req, ALWAYS_MARKER, ESCAPE_CHAR, RESERVED_CHARS,
    SYSTEM_MARKER, VOID_MARKER,
};

use super::pool::EntityPool;

/// Errors raised while reading tuple text
#[derive(Debug, Error)]
pub enum TupleParseError {
    #[error("malformed tuple:\n{0}")]
    Syntax(String),

    #[error("incomplete tuple")]
    Incomplete,

    #[error("too many requirements: {count} already read, ids are 32-bit")]
    TooManyRequirements { count: usize },

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<TupleParseError>,
    },
}

/// Identifiers carried in the first two fields of a requirement tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReqIds {
    pub reqid: u32,
    pub groupid: u32,
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a requirement tuple.
///
/// The ids written in the text are checked for shape but replaced by `ids`;
/// callers own id assignment.
pub fn parse_req(input: &str, ids: ReqIds, pool: &mut EntityPool) -> Result<Req, TupleParseError> {
    let (_, mut req) = run(input, req_tuple)?;
    req.reqid = ids.reqid;
    req.groupid = ids.groupid;
    pool.canonicalize_req(&mut req);
    Ok(req)
}

/// Read just the `(reqid) , (groupid)` prefix of a requirement tuple
pub fn parse_req_header(input: &str) -> Result<ReqIds, TupleParseError> {
    match req_ids::<VerboseError<&str>>(input.trim_start()) {
        Ok((_, ids)) => Ok(ids),
        Err(e) => Err(from_nom(input.trim_start(), e)),
    }
}

/// Parse a braced condition clause: `{(agent) , (op) , (in) , (out) , (restr)}`
pub fn parse_condition(input: &str, pool: &mut EntityPool) -> Result<Condition, TupleParseError> {
    let mut condition = run(input, braced_condition)?;
    pool.canonicalize_condition(&mut condition);
    Ok(condition)
}

/// Parse a single entity: `ALL [mod]base[of whole]`, where base may be `*system*`
pub fn parse_entity(input: &str, pool: &mut EntityPool) -> Result<EntityRef, TupleParseError> {
    let entity = run(input, entity)?;
    Ok(pool.intern(entity))
}

fn run<'a, O, F>(input: &'a str, parser: F) -> Result<O, TupleParseError>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, VerboseError<&'a str>>,
{
    let input = input.trim();
    match all_consuming(parser)(input) {
        Ok((_, out)) => Ok(out),
        Err(e) => Err(from_nom(input, e)),
    }
}

fn from_nom(input: &str, err: nom::Err<VerboseError<&str>>) -> TupleParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => TupleParseError::Syntax(convert_error(input, e)),
        nom::Err::Incomplete(_) => TupleParseError::Incomplete,
    }
}

// ============================================================================
// Tuples
// ============================================================================

fn req_tuple<'a, E>(input: &'a str) -> IResult<&'a str, (ReqIds, Req), E>
where
    E: NomParseError<&'a str>
        + ContextError<&'a str>
        + FromExternalError<&'a str, ParseIntError>,
{
    let (input, ids) = req_ids(input)?;
    let (input, _) = separator(input)?;
    let (input, event) = context("event", field(events))(input)?;
    let (input, _) = separator(input)?;
    let (input, body) = condition_body(input)?;

    let req = Req {
        reqid: ids.reqid,
        groupid: ids.groupid,
        event,
        agent: body.agent,
        operation: body.operation,
        input: body.input,
        output: body.output,
        restriction: body.restriction,
    };
    Ok((input, (ids, req)))
}

fn req_ids<'a, E>(input: &'a str) -> IResult<&'a str, ReqIds, E>
where
    E: NomParseError<&'a str>
        + ContextError<&'a str>
        + FromExternalError<&'a str, ParseIntError>,
{
    let (input, reqid) = context("reqid", field(number))(input)?;
    let (input, _) = separator(input)?;
    let (input, groupid) = context("groupid", field(number))(input)?;
    Ok((input, ReqIds { reqid, groupid }))
}

fn events<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<Condition>, E> {
    alt((
        value(Vec::new(), tag(ALWAYS_MARKER)),
        separated_list1(tag(", "), braced_condition),
    ))(input)
}

fn braced_condition<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Condition, E> {
    context(
        "condition",
        delimited(char('{'), condition_body, char('}')),
    )(input)
}

/// The five fields shared by conditions and requirements
fn condition_body<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Condition, E> {
    let (input, agent) = context("agent", field(entity))(input)?;
    let (input, _) = separator(input)?;
    let (input, operation) = context("operation", field(operation))(input)?;
    let (input, _) = separator(input)?;
    let (input, inputs) = context("input", field(entity_list))(input)?;
    let (input, _) = separator(input)?;
    let (input, outputs) = context("output", field(entity_list))(input)?;
    let (input, _) = separator(input)?;
    let (input, restriction) = context("restriction", field(string_list))(input)?;

    let mut condition = Condition::new(agent, operation);
    condition.input = inputs;
    condition.output = outputs;
    condition.restriction = restriction;
    Ok((input, condition))
}

// ============================================================================
// Fields
// ============================================================================

fn entity<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Entity, E> {
    let (input, all) = opt(tag("ALL "))(input)?;
    let (input, modifiers) = many0(delimited(char('['), text1, char(']')))(input)?;
    let (input, base) = context(
        "entity base",
        alt((value(String::new(), tag(SYSTEM_MARKER)), text1)),
    )(input)?;
    let (input, whole) = opt(delimited(tag("[of "), entity, char(']')))(input)?;

    let mut entity = Entity::new(base).with_modifiers(modifiers);
    entity.is_all = all.is_some();
    entity.entirety = whole.map(Arc::new);
    Ok((input, entity))
}

fn entity_list<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<EntityRef>, E> {
    alt((
        value(Vec::new(), tag(VOID_MARKER)),
        separated_list1(tag(", "), map(entity, Arc::new)),
    ))(input)
}

fn string_list<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Vec<String>, E> {
    alt((
        value(Vec::new(), tag(VOID_MARKER)),
        separated_list1(tag(", "), text1),
    ))(input)
}

fn operation<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Operation, E> {
    let (input, able) = opt(tag("ABLE "))(input)?;
    let (input, not) = opt(tag("NOT "))(input)?;
    let (input, predicate) = text(input)?;
    Ok((
        input,
        Operation {
            predicate,
            not: not.is_some(),
            able: able.is_some(),
        },
    ))
}

fn number<'a, E>(input: &'a str) -> IResult<&'a str, u32, E>
where
    E: NomParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    map_res(digit1, str::parse::<u32>)(input)
}

// ============================================================================
// Text values and punctuation
// ============================================================================

/// A run of text up to the next unescaped reserved character; may be empty
fn text<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    alt((
        escaped_transform(is_not(RESERVED_CHARS), ESCAPE_CHAR, anychar),
        value(String::new(), tag("")),
    ))(input)
}

fn text1<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    verify(text, |s: &str| !s.is_empty())(input)
}

fn field<'a, O, E, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    E: NomParseError<&'a str>,
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(char('('), inner, char(')'))
}

fn separator<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    tag(" , ")(input)
}
