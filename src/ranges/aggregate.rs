use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::RATE_SUFFIX;
use crate::join::parse_number;
use crate::ranges::types::{ColumnStats, RangeAggregate, RateRange};
use crate::ranges::utility::{mean, sample_stddev};
use crate::tables::{Table, YearTables};

/// Rate columns of several domain tables joined on area code.
///
/// A later table, or a later row repeating an area code, overwrites an
/// identically named column for that area. Rows with an empty area code
/// cannot be joined and are counted in `rows_without_code`.
#[derive(Debug, Default)]
pub struct CombinedRates {
    columns: BTreeSet<String>,
    by_area: BTreeMap<String, BTreeMap<String, f64>>,
    rows_without_code: usize,
}

impl CombinedRates {
    pub fn from_tables(tables: &[Table]) -> Self {
        let mut combined = Self::default();

        for table in tables {
            let rate_columns: Vec<&str> = table
                .headers()
                .iter()
                .filter(|h| h.ends_with(RATE_SUFFIX))
                .map(String::as_str)
                .collect();
            combined
                .columns
                .extend(rate_columns.iter().map(|c| c.to_string()));

            for row in table.rows() {
                let code = row.area_code();
                if code.is_empty() {
                    combined.rows_without_code += 1;
                    continue;
                }
                let cells = combined.by_area.entry(code.to_string()).or_default();
                for (field, raw) in row.fields() {
                    if !rate_columns.contains(&field) {
                        continue;
                    }
                    match parse_number(raw) {
                        Some(value) => {
                            cells.insert(field.to_string(), value);
                        }
                        None => {
                            cells.remove(field);
                        }
                    }
                }
            }
        }

        if combined.rows_without_code > 0 {
            warn!(
                rows = combined.rows_without_code,
                "Rows without an area code left out of rate ranges"
            );
        }

        combined
    }

    pub fn rows_without_code(&self) -> usize {
        self.rows_without_code
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn area_count(&self) -> usize {
        self.by_area.len()
    }

    /// Numeric values of `column`, one per area that has one, in area order.
    pub fn values(&self, column: &str) -> Vec<f64> {
        self.by_area
            .values()
            .filter_map(|cells| cells.get(column).copied())
            .collect()
    }
}

pub fn column_stats(values: &[f64]) -> Option<ColumnStats> {
    let avg = mean(values);
    let sd = sample_stddev(values, avg)?;
    Some(ColumnStats {
        count: values.len(),
        mean: avg,
        stddev: sd,
    })
}

/// Ranges for every rate column with at least two numeric values.
pub fn column_ranges(combined: &CombinedRates) -> BTreeMap<String, RateRange> {
    let mut ranges = BTreeMap::new();

    for column in combined.columns() {
        let values = combined.values(column);
        match column_stats(&values) {
            Some(stats) => {
                debug!(column, count = stats.count, mean = stats.mean, stddev = stats.stddev, "Column stats");
                ranges.insert(column.to_string(), RateRange::from_stats(&stats));
            }
            None => warn!(column, count = values.len(), "Too few values for a range, skipping"),
        }
    }

    ranges
}

/// Folds yearly rate ranges into one aggregate.
pub struct StatsAggregator {
    aggregate: RangeAggregate,
    track_years: bool,
}

impl StatsAggregator {
    pub fn new(track_years: bool) -> Self {
        Self {
            aggregate: RangeAggregate::default(),
            track_years,
        }
    }

    /// Adds one year's tables. Returns the number of columns with a range.
    #[tracing::instrument(skip_all, fields(year = %year_tables.year))]
    pub fn add_year(&mut self, year_tables: &YearTables) -> usize {
        let combined = CombinedRates::from_tables(&year_tables.tables);
        let ranges = column_ranges(&combined);
        let count = ranges.len();

        info!(
            areas = combined.area_count(),
            columns = count,
            "Year ranges computed"
        );

        self.aggregate
            .fold_year(year_tables.year, ranges, self.track_years);
        count
    }

    pub fn aggregate(&self) -> &RangeAggregate {
        &self.aggregate
    }

    pub fn finish(self) -> RangeAggregate {
        self.aggregate
    }
}
