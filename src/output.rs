//! Persistence for cleaned rows, side channels and statistics.
//!
//! CSV for row data, pretty JSON for statistics, optional gzip for either.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::records::{
    DelayEvent, DropReason, DroppedRecord, REFERENCE_COLUMNS, RawRecord, UnknownCodeRecord,
};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// `dir/stem_YYYYmmdd_HHMMSS.ext`
pub fn timestamped_path(dir: &Path, stem: &str, ext: &str, at: NaiveDateTime) -> PathBuf {
    dir.join(format!("{stem}_{}.{ext}", at.format("%Y%m%d_%H%M%S")))
}

/// Serializes `rows` to a fresh CSV file with a header row.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

pub fn write_events(path: &Path, events: &[DelayEvent]) -> Result<()> {
    write_csv(path, events)?;
    info!(path = %path.display(), events = events.len(), "Cleaned dataset written");
    Ok(())
}

fn raw_cells(raw: &RawRecord) -> Vec<&str> {
    let mut cells = raw.fields().to_vec();
    cells.push(&raw.source);
    cells
}

/// Writes one `dropped_<reason>.csv` for every reason: the original cells,
/// the source name and the reason tag. Reasons with no rows get a header-only
/// file so a rerun never leaves an earlier run's rows behind.
pub fn write_dropped(dir: &Path, dropped: &[DroppedRecord]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut by_reason: BTreeMap<DropReason, Vec<&DroppedRecord>> =
        DropReason::ALL.iter().map(|r| (*r, Vec::new())).collect();
    for record in dropped {
        by_reason.entry(record.reason).or_default().push(record);
    }

    let mut header: Vec<&str> = REFERENCE_COLUMNS.to_vec();
    header.extend(["Source", "Reason"]);

    let mut written = Vec::new();
    for (reason, records) in by_reason {
        let path = dir.join(format!("dropped_{reason}.csv"));
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writer.write_record(&header)?;
        for record in &records {
            let mut cells = raw_cells(&record.raw);
            cells.push(reason.as_str());
            writer.write_record(&cells)?;
        }
        writer.flush()?;

        if !records.is_empty() {
            info!(reason = %reason, rows = records.len(), "Dropped rows written");
        }
        written.push(path);
    }

    Ok(written)
}

/// Rows whose delay code is missing from the code table, for manual review.
pub fn write_unknown_codes(path: &Path, records: &[UnknownCodeRecord]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut header: Vec<&str> = REFERENCE_COLUMNS.to_vec();
    header.push("Source");
    writer.write_record(&header)?;

    for record in records {
        writer.write_record(raw_cells(&record.raw))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = records.len(), "Unknown delay codes written");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "JSON written");
    Ok(())
}

/// Gzip-compresses `path` into `path.gz` and removes the original.
pub fn gzip_file(path: &Path) -> Result<PathBuf> {
    let contents = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&contents)?;
    let compressed = encoder.finish()?;

    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    fs::write(&target, compressed)
        .with_context(|| format!("failed to write {}", target.display()))?;
    fs::remove_file(path)?;

    debug!(path = %target.display(), "Compressed");
    Ok(target)
}
