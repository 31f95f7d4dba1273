use std::fmt::Display;
use std::io::{self, Write};
use std::num::NonZeroU64;

use serde::Serialize;

/// Final benchmark numbers for one run.
///
/// `missing` and `percent_loss` go negative when more unique records arrive
/// than the producer claims to have written. That means either the input count
/// is wrong or the pipeline invented records, and it is reported as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Objects read, only for object store sinks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_s3_obj: Option<u64>,
    pub total_input: u64,
    pub total_destination: u64,
    pub unique: u64,
    pub duplicate: i64,
    pub delay: String,
    pub percent_loss: i64,
    pub missing: i64,
}

impl ValidationReport {
    pub fn compute(
        total_input: NonZeroU64,
        total_observed: u64,
        unique_observed: u64,
        delay: impl Into<String>,
    ) -> Self {
        let input = to_signed(total_input.get());
        let unique = to_signed(unique_observed);

        let missing = input - unique;
        // i64 division truncates toward zero
        let percent_loss = missing.saturating_mul(100) / input;

        Self {
            total_s3_obj: None,
            total_input: total_input.get(),
            total_destination: total_observed,
            unique: unique_observed,
            duplicate: to_signed(total_observed) - unique,
            delay: delay.into(),
            percent_loss,
            missing,
        }
    }

    pub fn with_objects_scanned(mut self, objects: Option<u64>) -> Self {
        self.total_s3_obj = objects;
        self
    }

    /// `label,  value` lines, in the order the benchmark scripts scrape them.
    /// The two spaces after the comma are part of the format those scripts match.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(objects) = self.total_s3_obj {
            write_field(out, "total_s3_obj", objects)?;
        }
        write_field(out, "total_input", self.total_input)?;
        write_field(out, "total_destination", self.total_destination)?;
        write_field(out, "unique", self.unique)?;
        write_field(out, "duplicate", self.duplicate)?;
        write_field(out, "delay", &self.delay)?;
        write_field(out, "percent_loss", self.percent_loss)?;
        write_field(out, "missing", self.missing)
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        writeln!(out)
    }
}

fn write_field<W: Write>(out: &mut W, label: &str, value: impl Display) -> io::Result<()> {
    writeln!(out, "{label},  {value}")
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
