//! Reads source batches and cleaned datasets from disk.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::merge::{SourceBatch, SubBatch};
use crate::records::DelayEvent;

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// True for `name.csv` and `name.csv.gz`.
fn is_csv(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    name.ends_with(".csv") || name.ends_with(".csv.gz")
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn decode_lossy(record: &csv::ByteRecord) -> (Vec<String>, bool) {
    let mut lossy = false;
    let cells = record
        .iter()
        .map(|cell| match std::str::from_utf8(cell) {
            Ok(text) => text.to_string(),
            Err(_) => {
                lossy = true;
                String::from_utf8_lossy(cell).into_owned()
            }
        })
        .collect();
    (cells, lossy)
}

/// Reads one CSV file as a sub-batch. Rows may be ragged.
///
/// Cells that are not valid UTF-8 are decoded lossily so one mis-encoded row
/// never costs the rest of the file.
pub fn read_sub_batch(path: &Path) -> Result<SubBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open_reader(path)?);

    let (columns, _) = decode_lossy(
        rdr.byte_headers()
            .with_context(|| format!("failed to read header of {}", path.display()))?,
    );

    let mut rows = Vec::new();
    let mut lossy_rows = 0;
    for result in rdr.byte_records() {
        let record = result.with_context(|| format!("failed to read row in {}", path.display()))?;
        let (cells, lossy) = decode_lossy(&record);
        if lossy {
            lossy_rows += 1;
        }
        rows.push(cells);
    }

    if lossy_rows > 0 {
        warn!(path = %path.display(), lossy_rows, "Replaced invalid UTF-8 bytes");
    }
    debug!(path = %path.display(), rows = rows.len(), "Sub-batch read");

    Ok(SubBatch::new(&display_name(path), columns, rows))
}

/// Reads a sub-batch, turning a read failure into an unreadable sub-batch
/// so the merge still counts and reports it.
fn read_or_report(path: &Path) -> SubBatch {
    read_sub_batch(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Unreadable file");
        SubBatch::unreadable(&display_name(path), format!("{e:#}"))
    })
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        paths.push(entry?.path());
    }
    paths.sort();
    Ok(paths)
}

/// Collects sources from `dir`.
///
/// A CSV file directly inside `dir` is a source with a single sub-batch. A
/// subdirectory is a source whose CSV files are its sub-batches (the
/// equivalent of a multi-sheet workbook). Unreadable files are kept as
/// unreadable sub-batches for the merge to report.
#[tracing::instrument(fields(dir = %dir.display()))]
pub fn load_sources(dir: &Path) -> Result<Vec<SourceBatch>> {
    let mut sources = Vec::new();

    for path in sorted_entries(dir)? {
        if path.is_dir() {
            let sub_batches: Vec<SubBatch> = sorted_entries(&path)?
                .into_iter()
                .filter(|p| is_csv(p))
                .map(|file| read_or_report(&file))
                .collect();
            if !sub_batches.is_empty() {
                sources.push(SourceBatch {
                    name: display_name(&path),
                    sub_batches,
                });
            }
        } else if is_csv(&path) {
            sources.push(SourceBatch {
                name: display_name(&path),
                sub_batches: vec![read_or_report(&path)],
            });
        }
    }

    info!(sources = sources.len(), "Sources loaded");
    Ok(sources)
}

/// Reads a cleaned dataset written by [`crate::output::write_events`].
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_events(path: &Path) -> Result<Vec<DelayEvent>> {
    let mut rdr = csv::Reader::from_reader(open_reader(path)?);

    let mut events = Vec::new();
    for result in rdr.deserialize() {
        let event: DelayEvent =
            result.with_context(|| format!("malformed event row in {}", path.display()))?;
        events.push(event);
    }

    info!(events = events.len(), "Events loaded");
    Ok(events)
}
