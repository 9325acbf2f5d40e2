//! Per-year domain tables: discovery, file resolution and CSV loading.

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{AREA_CODE_FIELD, AREA_NAME_FIELD, MissingFilePolicy, TableSource};
use crate::keys::Year;

/// One domain CSV, fully read into memory.
#[derive(Debug, Clone)]
pub struct Table {
    pub domain: String,
    pub path: PathBuf,
    headers: Vec<String>,
    area_code_idx: usize,
    records: Vec<StringRecord>,
}

/// Borrowed view of one table record.
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    headers: &'a [String],
    record: &'a StringRecord,
    area_code_idx: usize,
}

impl<'a> TableRow<'a> {
    pub fn area_code(&self) -> &'a str {
        self.record.get(self.area_code_idx).unwrap_or("")
    }

    /// Named values excluding the area code and area name identifiers.
    ///
    /// Short records yield empty strings for their missing trailing cells.
    pub fn fields(self) -> impl Iterator<Item = (&'a str, &'a str)> {
        let record = self.record;
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_identifier(name))
            .map(move |(i, name)| (name.as_str(), record.get(i).unwrap_or("")))
    }
}

pub fn is_identifier(field: &str) -> bool {
    field == AREA_CODE_FIELD || field == AREA_NAME_FIELD
}

impl Table {
    /// Reads a CSV with a header row that must contain `area_code`.
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn read(domain: &str, path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_path(path)
            .with_context(|| format!("failed to open table {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let Some(area_code_idx) = headers.iter().position(|h| h == AREA_CODE_FIELD) else {
            bail!(
                "table {} has no '{}' column",
                path.display(),
                AREA_CODE_FIELD
            );
        };

        let mut records = Vec::new();
        for result in reader.records() {
            let record =
                result.with_context(|| format!("malformed record in {}", path.display()))?;
            records.push(record);
        }

        debug!(domain, rows = records.len(), columns = headers.len(), "Table read");

        Ok(Self {
            domain: domain.to_string(),
            path: path.to_path_buf(),
            headers,
            area_code_idx,
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.records.iter().map(|record| TableRow {
            headers: &self.headers,
            record,
            area_code_idx: self.area_code_idx,
        })
    }
}

/// All domain tables found for a single year.
#[derive(Debug, Clone)]
pub struct YearTables {
    pub year: Year,
    pub tables: Vec<Table>,
    pub missing: Vec<PathBuf>,
}

impl YearTables {
    /// True when none of the expected domain files existed.
    pub fn is_absent(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Lists year directories under `root`, sorted by year.
///
/// The year is the segment after the last underscore of the directory name
/// (`ADI_2013` → 2013). Hidden entries, plain files and directories without
/// a year suffix are skipped.
pub fn discover_years(root: &Path) -> Result<Vec<(Year, PathBuf)>> {
    let mut years = Vec::new();

    for entry in
        fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))?
    {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }

        let suffix = name.rsplit('_').next().unwrap_or(&name);
        match suffix.parse::<Year>() {
            Ok(year) => years.push((year, entry.path())),
            Err(_) => warn!(dir = %name, "Directory has no year suffix, skipping"),
        }
    }

    years.sort();
    info!(years = years.len(), root = %root.display(), "Year directories discovered");
    Ok(years)
}

/// `(domain, path)` for every configured domain file of `year` in `dir`.
pub fn domain_files(dir: &Path, year: Year, domains: &[String]) -> Vec<(String, PathBuf)> {
    domains
        .iter()
        .map(|domain| (domain.clone(), dir.join(TableSource::file_name(domain, year))))
        .collect()
}

/// Reads every domain table for one year, applying the missing-file policy.
///
/// A year with none of its domain files is returned absent under either
/// policy; `Fail` only rejects a partially populated year.
#[tracing::instrument(skip(dir, year, source), fields(dir = %dir.display(), year = %year))]
pub fn load_year(dir: &Path, year: Year, source: &TableSource) -> Result<YearTables> {
    let files = domain_files(dir, year, &source.domains);
    if !files.iter().any(|(_, path)| path.exists()) {
        warn!(domains = files.len(), "No domain tables present for year");
        return Ok(YearTables {
            year,
            tables: Vec::new(),
            missing: files.into_iter().map(|(_, path)| path).collect(),
        });
    }

    let mut tables = Vec::new();
    let mut missing = Vec::new();

    for (domain, path) in files {
        if !path.exists() {
            match source.on_missing {
                MissingFilePolicy::Fail => {
                    bail!("missing {} table for {}: {}", domain, year, path.display())
                }
                MissingFilePolicy::Skip => {
                    warn!(domain = %domain, path = %path.display(), "Table missing, skipping");
                    missing.push(path);
                    continue;
                }
            }
        }

        info!(domain = %domain, path = %path.display(), "Loading table");
        tables.push(Table::read(&domain, &path)?);
    }

    Ok(YearTables {
        year,
        tables,
        missing,
    })
}
