//! End-to-end pipelines wired from explicit configuration.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{JoinConfig, RangeConfig, SplitConfig};
use crate::geometry::{FeatureCollection, GeometryStore};
use crate::join::{JoinSummary, Joiner};
use crate::output::{is_safe_file_stem, write_geojson};
use crate::ranges::{RangeAggregate, ReportWriter, StatsAggregator};
use crate::split::split;
use crate::tables::{discover_years, load_year};

/// Loads the geometry and joins every discovered year onto it.
pub fn join_all(config: &JoinConfig) -> Result<(FeatureCollection, JoinSummary)> {
    let mut store = GeometryStore::load(&config.geometry_path, &config.key_field)?;
    let joiner = Joiner::new(config.mode);
    let mut summary = JoinSummary::default();

    for (year, dir) in discover_years(&config.tables.input_root)? {
        info!(year = %year, "Processing year");
        let year_tables = load_year(&dir, year, &config.tables)?;
        if year_tables.is_absent() {
            warn!(year = %year, "No tables found for year, skipping");
            continue;
        }
        summary.merge(joiner.join_year(&mut store, &year_tables));
    }

    info!(
        features = store.len(),
        matched = store.matched_count(),
        "Join complete"
    );

    Ok((store.into_collection(config.retention), summary))
}

/// Writes one merged collection.
#[tracing::instrument(skip_all, fields(output = %config.output_path.display()))]
pub fn run_join(config: &JoinConfig) -> Result<JoinSummary> {
    let (collection, summary) = join_all(config)?;
    let path = write_geojson(&config.output_path, &collection, config.gzip)?;
    info!(path = %path.display(), features = collection.features.len(), "Saved merged GeoJSON");
    Ok(summary)
}

/// Writes one collection per variable name into the output directory.
#[tracing::instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub fn run_split(config: &SplitConfig) -> Result<Vec<PathBuf>> {
    let (collection, _) = join_all(&config.join)?;
    let outputs = split(&collection, &config.join.key_field);

    let mut written = Vec::with_capacity(outputs.len());
    for (variable, output) in &outputs {
        if !is_safe_file_stem(variable) {
            warn!(variable = %variable, "Variable name is not a safe file name, skipping");
            continue;
        }
        let path = config.output_dir.join(format!("{variable}.geojson"));
        let path = write_geojson(&path, output, config.join.gzip)?;
        info!(variable = %variable, path = %path.display(), "Saved variable GeoJSON");
        written.push(path);
    }

    info!(files = written.len(), "Split complete");
    Ok(written)
}

/// Computes folded rate ranges over the configured years and writes the report.
#[tracing::instrument(skip_all, fields(from = %config.from_year, to = %config.to_year))]
pub fn run_ranges(config: &RangeConfig) -> Result<RangeAggregate> {
    let mut aggregator = StatsAggregator::new(config.is_multi_year());

    for year in config.from_year.through(config.to_year) {
        let dir = config.tables.year_dir(year);
        if !dir.is_dir() {
            warn!(year = %year, dir = %dir.display(), "Year directory missing, skipping");
            continue;
        }

        let year_tables = load_year(&dir, year, &config.tables)?;
        if year_tables.is_absent() {
            warn!(year = %year, "No tables found for year, skipping");
            continue;
        }
        aggregator.add_year(&year_tables);
    }

    let aggregate = aggregator.finish();
    if aggregate.is_empty() {
        warn!("No rate columns produced a range");
    }

    ReportWriter::new(config.format).write(&config.output_path, &aggregate)?;
    info!(path = %config.output_path.display(), "Results written");
    Ok(aggregate)
}
