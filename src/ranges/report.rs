//! Report output for folded rate ranges.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::OutputFormat;
use crate::ranges::types::{RangeAggregate, RateRange};

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    years: Vec<u16>,
    columns: &'a BTreeMap<String, RateRange>,
}

/// Shortest round-trip text with a signed, two-digit exponent
/// (`1e-05`, `1.5e+16`) and lowercase `nan`/`inf`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

pub struct ReportWriter {
    format: OutputFormat,
}

impl ReportWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// One paragraph per column, in column-name order.
    pub fn render_text(aggregate: &RangeAggregate) -> String {
        let mut out = String::new();
        for (column, range) in &aggregate.columns {
            let _ = writeln!(out, "{column}:");
            let _ = writeln!(out, "  Min: {}", format_float(range.min));
            let _ = writeln!(out, "  Max: {}", format_float(range.max));
            if let Some(year) = range.earliest_year {
                let _ = writeln!(out, "  Earliest year: {year}");
            }
            out.push('\n');
        }
        out
    }

    pub fn render_json(aggregate: &RangeAggregate, generated_at: DateTime<Utc>) -> Result<String> {
        let report = JsonReport {
            generated_at,
            years: aggregate.years.iter().map(|y| y.get()).collect(),
            columns: &aggregate.columns,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn render(&self, aggregate: &RangeAggregate) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(Self::render_text(aggregate)),
            OutputFormat::Json => Self::render_json(aggregate, Utc::now()),
        }
    }

    /// Writes the report, creating parent directories as needed.
    #[tracing::instrument(skip(self, aggregate), fields(path = %path.display()))]
    pub fn write(&self, path: &Path, aggregate: &RangeAggregate) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = self.render(aggregate)?;
        fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
        info!(columns = aggregate.columns.len(), "Report written");
        Ok(())
    }
}
