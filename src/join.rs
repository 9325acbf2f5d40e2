//! Merges yearly table fields onto matching boundary features.

use serde::Serialize;
use serde_json::{Number, Value};
use tracing::{debug, info};

use crate::config::{JoinMode, RATE_SUFFIX};
use crate::geometry::GeometryStore;
use crate::keys::{MergedKey, Year};
use crate::tables::{Table, YearTables};

/// Counters reported after a join pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JoinSummary {
    pub rows_read: usize,
    pub rows_matched: usize,
    pub rows_unmatched: usize,
    pub properties_written: usize,
    pub values_skipped: usize,
}

impl JoinSummary {
    pub fn merge(&mut self, other: JoinSummary) {
        self.rows_read += other.rows_read;
        self.rows_matched += other.rows_matched;
        self.rows_unmatched += other.rows_unmatched;
        self.properties_written += other.properties_written;
        self.values_skipped += other.values_skipped;
    }
}

/// Parses a cell as a finite number. Surrounding whitespace is ignored.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Magnitude from which every `f64` is already an integer.
const INTEGRAL_FROM: f64 = 4_503_599_627_370_496.0;

/// Rounds to two decimals, ties to even on the scaled value.
///
/// Values at or beyond 2^52 have no fractional part and are returned as is,
/// so scaling by 100 can never overflow to infinity.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= INTEGRAL_FROM {
        return value;
    }
    (value * 100.0).round_ties_even() / 100.0
}

/// Two-decimal text for any parsed number, with `nan`, `inf` and `-inf`
/// for the non-finite ones.
fn format_two_decimals(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{value:.2}")
    }
}

/// Converts one cell into the value written onto a feature, or `None` when
/// the field contributes nothing in this mode.
pub fn transform_value(mode: JoinMode, field: &str, raw: &str) -> Option<Value> {
    match mode {
        JoinMode::AllFields => {
            if raw.is_empty() {
                return None;
            }
            Some(match raw.trim().parse::<f64>() {
                Ok(v) => Value::String(format_two_decimals(v)),
                Err(_) => Value::String(raw.to_string()),
            })
        }
        JoinMode::RateOnly => {
            if !field.ends_with(RATE_SUFFIX) {
                return None;
            }
            let rounded = round2(parse_number(raw)?);
            Number::from_f64(rounded).map(Value::Number)
        }
    }
}

pub struct Joiner {
    mode: JoinMode,
}

impl Joiner {
    pub fn new(mode: JoinMode) -> Self {
        Self { mode }
    }

    /// Joins every table of one year onto the store.
    #[tracing::instrument(skip_all, fields(year = %year_tables.year))]
    pub fn join_year(&self, store: &mut GeometryStore, year_tables: &YearTables) -> JoinSummary {
        let mut summary = JoinSummary::default();
        for table in &year_tables.tables {
            summary.merge(self.join_table(store, table, year_tables.year));
        }
        info!(
            rows_read = summary.rows_read,
            rows_matched = summary.rows_matched,
            rows_unmatched = summary.rows_unmatched,
            properties_written = summary.properties_written,
            "Year joined"
        );
        summary
    }

    /// Writes `{field}_{year}` properties for every row whose area code is
    /// in the store. Rows for unknown areas are dropped.
    pub fn join_table(&self, store: &mut GeometryStore, table: &Table, year: Year) -> JoinSummary {
        let mut summary = JoinSummary::default();

        for row in table.rows() {
            summary.rows_read += 1;
            let code = row.area_code();

            let Some(feature) = store.get_mut(code) else {
                summary.rows_unmatched += 1;
                continue;
            };
            summary.rows_matched += 1;

            let mut written = 0;
            for (field, raw) in row.fields() {
                match transform_value(self.mode, field, raw) {
                    Some(value) => {
                        let key = MergedKey::new(field, year).to_string();
                        feature.properties.insert(key, value);
                        written += 1;
                    }
                    None => summary.values_skipped += 1,
                }
            }
            summary.properties_written += written;

            // A matched row counts as data in the all-fields mode even when
            // every cell was empty.
            if written > 0 || self.mode == JoinMode::AllFields {
                store.mark_matched(code);
            }
        }

        debug!(
            domain = %table.domain,
            rows_read = summary.rows_read,
            rows_unmatched = summary.rows_unmatched,
            "Table joined"
        );
        summary
    }
}
