//! Requirement model plumbing
//!
//! The tuple types themselves live in `req_types`. This module adds what the
//! engine needs around them: the session entity pool, named field access for
//! rules, and the textual tuple format.

pub mod fields;
pub mod pool;
pub mod reader;
pub mod text;

pub use fields::Tuple;
pub use pool::EntityPool;
pub use reader::{load_model_file, read_model, render_model};
pub use text::{parse_condition, parse_entity, parse_req, parse_req_header, ReqIds, TupleParseError};
