//! Display-range statistics for rate columns.
//!
//! Loads each year's domain tables, joins them on area code, computes a
//! mean ± 2·std range for every `_rate` column, folds ranges across years,
//! and writes the result as a text or JSON report.

pub mod aggregate;
pub mod report;
pub mod types;
pub mod utility;

pub use aggregate::StatsAggregator;
pub use report::ReportWriter;
pub use types::{RangeAggregate, RateRange};
