//! Output formatting and persistence for merged collections.
//!
//! Supports pretty-printed GeoJSON files, optionally gzip-compressed, and
//! JSON logging of run summaries.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::with_gzip_suffix;
use crate::geometry::FeatureCollection;

/// Logs any serializable summary as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// True when `stem` can be used as a single file name inside an output
/// directory: non-empty, no path separators or drive colons, and not a
/// `.`/`..` component.
pub fn is_safe_file_stem(stem: &str) -> bool {
    !stem.is_empty()
        && stem != "."
        && stem != ".."
        && !stem.contains(['/', '\\', ':', '\0'])
}

/// Writes a feature collection as indented GeoJSON.
///
/// Creates parent directories. With `gzip` the file gains a `.gz` suffix.
/// Returns the path actually written.
pub fn write_geojson(path: &Path, collection: &FeatureCollection, gzip: bool) -> Result<PathBuf> {
    let path = with_gzip_suffix(path, gzip);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);

    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, collection)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer_pretty(&mut writer, collection)?;
        writer.flush()?;
    }

    debug!(path = %path.display(), features = collection.features.len(), gzip, "GeoJSON written");
    Ok(path)
}
