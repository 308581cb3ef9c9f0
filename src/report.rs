//! Conflict report writers
//!
//! Text form, one block per conflict:
//!
//! ```text
//! operation inconsistency
//! (1) , (0) , (*always*) , (*system*) , (lock) , (door) , (*void*) , (at night)
//! (2) , (0) , (*always*) , (*system*) , (NOT lock) , (door) , (*void*) , (at night)
//!
//! ```
//!
//! JSON form is the serde serialization of the record list.

use std::io::Write;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::detection::ConflictRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => bail!("Unknown report format '{}', expected 'text' or 'json'", other),
        }
    }
}

pub fn write_text<W: Write>(out: &mut W, conflicts: &[ConflictRecord<'_>]) -> std::io::Result<()> {
    for conflict in conflicts {
        writeln!(out, "{}", conflict.kind)?;
        for req in &conflict.requirements {
            writeln!(out, "{}", req)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn render_text(conflicts: &[ConflictRecord<'_>]) -> std::io::Result<String> {
    let mut out = Vec::new();
    write_text(&mut out, conflicts)?;
    String::from_utf8(out).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

pub fn write_json<W: Write>(out: &mut W, conflicts: &[ConflictRecord<'_>]) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut *out, conflicts)?;
    writeln!(out).map_err(serde_json::Error::io)
}

pub fn write_report<W: Write>(
    out: &mut W,
    conflicts: &[ConflictRecord<'_>],
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Text => write_text(out, conflicts).context("Failed to write text report"),
        ReportFormat::Json => write_json(out, conflicts).context("Failed to write JSON report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ConflictKind;
    use pretty_assertions::assert_eq;
    use req_types::{Operation, Req};

    fn sample() -> Vec<Req> {
        let mut a = Req::new(1);
        a.operation = Operation::new("lock");
        let mut b = Req::new(2);
        b.operation = Operation::negated("lock");
        vec![a, b]
    }

    #[test]
    fn test_text_report() {
        let reqs = sample();
        let conflicts = vec![ConflictRecord {
            kind: ConflictKind::OperationInconsistency,
            requirements: vec![&reqs[0], &reqs[1]],
        }];

        assert_eq!(
            render_text(&conflicts).unwrap(),
            "operation inconsistency\n\
             (1) , (0) , (*always*) , (*system*) , (lock) , (*void*) , (*void*) , (*void*)\n\
             (2) , (0) , (*always*) , (*system*) , (NOT lock) , (*void*) , (*void*) , (*void*)\n\
             \n"
        );
    }

    #[test]
    fn test_json_report() {
        let reqs = sample();
        let conflicts = vec![ConflictRecord {
            kind: ConflictKind::OperationInclusion,
            requirements: vec![&reqs[1], &reqs[0]],
        }];

        let mut out = Vec::new();
        write_report(&mut out, &conflicts, ReportFormat::Json).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json[0]["kind"], "operation inclusion");
        assert_eq!(json[0]["requirements"][0]["reqid"], 2);
        assert_eq!(json[0]["requirements"][1]["operation"]["predicate"], "lock");
    }

    #[test]
    fn test_format_names() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
