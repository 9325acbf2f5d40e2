//! Data types used by the range-statistics pipeline.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::keys::Year;

/// Mean and spread of one rate column in one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// Display bounds for one rate column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_year: Option<Year>,
}

impl RateRange {
    /// `[mean − 2·std, mean + 2·std]`
    pub fn from_stats(stats: &ColumnStats) -> Self {
        Self {
            min: stats.mean - 2.0 * stats.stddev,
            max: stats.mean + 2.0 * stats.stddev,
            earliest_year: None,
        }
    }

    /// Widens `self` to cover `other`. Never narrows.
    pub fn fold(&mut self, other: &RateRange) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.earliest_year = match (self.earliest_year, other.earliest_year) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Per-column ranges folded across every year processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeAggregate {
    pub columns: BTreeMap<String, RateRange>,
    pub years: Vec<Year>,
}

impl RangeAggregate {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&RateRange> {
        self.columns.get(column)
    }

    /// Folds one year's ranges in. `track_year` stamps new ranges with
    /// `year` so the earliest observation is kept.
    pub fn fold_year(&mut self, year: Year, ranges: BTreeMap<String, RateRange>, track_year: bool) {
        for (column, mut range) in ranges {
            if track_year {
                range.earliest_year = Some(year);
            }
            self.columns
                .entry(column)
                .and_modify(|existing| existing.fold(&range))
                .or_insert(range);
        }
        if !self.years.contains(&year) {
            self.years.push(year);
            self.years.sort();
        }
    }
}
