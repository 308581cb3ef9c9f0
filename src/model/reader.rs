//! Modelled-requirements files
//!
//! One requirement tuple per line. Short lines (blank lines, separators) are
//! skipped, and requirement ids are renumbered from 1 in file order so ids
//! are unique for the run whatever the file says. Group ids are kept.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use req_types::Req;

use super::pool::EntityPool;
use super::text::{parse_req, parse_req_header, ReqIds, TupleParseError};

/// Lines this short cannot hold a tuple
const MIN_TUPLE_LINE: usize = 10;

/// Parse every requirement line of `text`
pub fn read_model(text: &str, pool: &mut EntityPool) -> std::result::Result<Vec<Req>, TupleParseError> {
    let mut reqs = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.chars().count() <= MIN_TUPLE_LINE {
            continue;
        }

        let at_line = |source| TupleParseError::AtLine {
            line: index + 1,
            source: Box::new(source),
        };
        let header = parse_req_header(line).map_err(at_line)?;
        let ids = ReqIds {
            reqid: next_reqid(reqs.len()).map_err(at_line)?,
            groupid: header.groupid,
        };
        let req = parse_req(line, ids, pool).map_err(at_line)?;
        debug!(reqid = req.reqid, groupid = req.groupid, "Read requirement");
        reqs.push(req);
    }

    Ok(reqs)
}

/// Id for the requirement after `count` already read
fn next_reqid(count: usize) -> std::result::Result<u32, TupleParseError> {
    count
        .checked_add(1)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(TupleParseError::TooManyRequirements { count })
}

/// Read and parse a modelled-requirements file
pub fn load_model_file(path: impl AsRef<Path>, pool: &mut EntityPool) -> Result<Vec<Req>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;
    let reqs = read_model(&text, pool)
        .with_context(|| format!("Failed to parse model file: {}", path.display()))?;

    info!(
        "Loaded {} requirements ({} entities) from {}",
        reqs.len(),
        pool.len(),
        path.display()
    );
    Ok(reqs)
}

/// Render requirements in the line format `read_model` accepts
pub fn render_model(reqs: &[Req]) -> String {
    let mut out = String::new();
    for req in reqs {
        out.push_str(&req.to_string());
        out.push('\n');
    }
    out
}
