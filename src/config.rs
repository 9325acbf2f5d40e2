//! Pipeline configuration.
//!
//! Every path a pipeline touches is carried here explicitly; nothing is
//! resolved against module-level constants. The CLI builds these structs
//! from its arguments.

use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::keys::Year;

/// ADI domains published per year.
pub const DEFAULT_DOMAINS: &[&str] = &["claimant_counts", "crime", "health"];

/// Property on each boundary feature that carries the LSOA code.
pub const DEFAULT_KEY_FIELD: &str = "LSOA11CD";

/// Column in every domain table that carries the LSOA code.
pub const AREA_CODE_FIELD: &str = "area_code";

/// Column in domain tables carrying the human-readable area name.
pub const AREA_NAME_FIELD: &str = "area_name";

/// Suffix marking a display-relevant numeric indicator column.
pub const RATE_SUFFIX: &str = "_rate";

/// What to do when an expected domain file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingFilePolicy {
    /// Log a warning and continue with the remaining files.
    Skip,
    /// Abort the run with the path that was missing.
    Fail,
}

/// Which table fields are merged onto features, and in what form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JoinMode {
    /// Every non-identifier field; numbers become two-decimal text.
    AllFields,
    /// Only `_rate` fields; numbers are rounded and kept numeric.
    RateOnly,
}

/// Which features survive into the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Retention {
    /// Only features that received at least one joined value.
    MatchedOnly,
    /// Every feature, joined or not.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Where the yearly domain tables live and how their files are named.
#[derive(Debug, Clone)]
pub struct TableSource {
    pub input_root: PathBuf,
    pub domains: Vec<String>,
    pub on_missing: MissingFilePolicy,
}

impl TableSource {
    pub fn new(input_root: impl Into<PathBuf>, on_missing: MissingFilePolicy) -> Self {
        Self {
            input_root: input_root.into(),
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            on_missing,
        }
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        if !domains.is_empty() {
            self.domains = domains;
        }
        self
    }

    /// `ADI_{domain}_{year}.csv`
    pub fn file_name(domain: &str, year: Year) -> String {
        format!("ADI_{domain}_{year}.csv")
    }

    /// `{input_root}/ADI_{year}`
    pub fn year_dir(&self, year: Year) -> PathBuf {
        self.input_root.join(format!("ADI_{year}"))
    }
}

/// Options for the merged-collection pipeline.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    pub geometry_path: PathBuf,
    pub key_field: String,
    pub tables: TableSource,
    pub mode: JoinMode,
    pub retention: Retention,
    pub output_path: PathBuf,
    pub gzip: bool,
}

/// Options for the per-variable split pipeline.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub join: JoinConfig,
    pub output_dir: PathBuf,
}

/// Options for the rate-range statistics pipeline.
#[derive(Debug, Clone)]
pub struct RangeConfig {
    pub tables: TableSource,
    pub from_year: Year,
    pub to_year: Year,
    pub output_path: PathBuf,
    pub format: OutputFormat,
}

impl RangeConfig {
    /// Earliest-year tracking only carries information across several years.
    pub fn is_multi_year(&self) -> bool {
        self.from_year != self.to_year
    }
}

/// Appends `.gz` to a path when compression is enabled.
pub fn with_gzip_suffix(path: &Path, gzip: bool) -> PathBuf {
    if !gzip {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}
