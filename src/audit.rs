//! Plain-text audit trail of a cleaning run.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::merge::MergeSummary;
use crate::output::timestamped_path;
use crate::pipeline::CleanOutcome;
use crate::records::{DropReason, StationCategory};

fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::new();
    for line in lines {
        body.push_str(line.as_ref());
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_merge_log(path: &Path, summary: &MergeSummary) -> Result<()> {
    write_lines(path, summary.log_lines())
}

/// One `stations_<category>.txt` per category, names sorted. Categories
/// with no stations get an empty file.
pub fn write_station_lists(
    dir: &Path,
    stations: &BTreeMap<StationCategory, BTreeSet<String>>,
) -> Result<Vec<PathBuf>> {
    let none = BTreeSet::new();
    let mut written = Vec::new();
    for category in StationCategory::ALL {
        let path = dir.join(format!("stations_{}.txt", category.slug()));
        write_lines(&path, stations.get(&category).unwrap_or(&none))?;
        written.push(path);
    }
    Ok(written)
}

pub fn write_directional_names(path: &Path, names: &BTreeSet<String>) -> Result<()> {
    write_lines(path, names)
}

/// Logs per-reason drop counts and per-category station counts.
pub fn log_summary(outcome: &CleanOutcome) {
    for reason in DropReason::ALL {
        let rows = outcome.dropped_count(reason);
        if rows > 0 {
            info!(reason = %reason, rows, "Rows dropped");
        }
    }

    for category in StationCategory::ALL {
        let stations = outcome
            .stations_by_category
            .get(&category)
            .map_or(0, BTreeSet::len);
        info!(category = %category, stations, "Distinct stations");
    }

    info!(
        kept = outcome.events.len(),
        unknown_codes = outcome.unknown_codes.len(),
        directional = outcome.directional_names.len(),
        "Run summary"
    );
}

/// Writes every audit file for `outcome` under `dir`.
pub fn write_audit(dir: &Path, outcome: &CleanOutcome, at: NaiveDateTime) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    write_merge_log(
        &timestamped_path(dir, "merge_log", "txt", at),
        &outcome.merge_summary,
    )?;
    write_station_lists(dir, &outcome.stations_by_category)?;
    write_directional_names(&dir.join("directional_stations.txt"), &outcome.directional_names)?;

    log_summary(outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_station_lists_rewritten_when_category_disappears() {
        let dir = env::temp_dir().join("subway_delays_test_station_lists");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut stations = BTreeMap::new();
        stations.insert(
            StationCategory::Unknown,
            BTreeSet::from(["MARS STATION".to_string()]),
        );
        write_station_lists(&dir, &stations).unwrap();
        assert_eq!(
            fs::read_to_string(dir.join("stations_unknown.txt")).unwrap(),
            "MARS STATION\n"
        );

        let written = write_station_lists(&dir, &BTreeMap::new()).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(fs::read_to_string(dir.join("stations_unknown.txt")).unwrap(), "");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_station_lists_and_directionals() {
        let dir = env::temp_dir().join("subway_delays_test_audit");
        let _ = fs::remove_dir_all(&dir);

        let mut outcome = CleanOutcome::default();
        outcome
            .stations_by_category
            .entry(StationCategory::NonPassenger)
            .or_default()
            .extend(["WILSON YARD".to_string(), "DAVISVILLE YARD".to_string()]);
        outcome
            .directional_names
            .insert("UNION STATION TOWARD KING".to_string());

        let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        write_audit(&dir, &outcome, at).unwrap();

        let yards = fs::read_to_string(dir.join("stations_non-passenger.txt")).unwrap();
        assert_eq!(yards, "DAVISVILLE YARD\nWILSON YARD\n");
        assert_eq!(fs::read_to_string(dir.join("stations_passenger.txt")).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.join("stations_unknown.txt")).unwrap(), "");

        let directional = fs::read_to_string(dir.join("directional_stations.txt")).unwrap();
        assert_eq!(directional, "UNION STATION TOWARD KING\n");

        let merge_log = fs::read_to_string(dir.join("merge_log_20240501_120000.txt")).unwrap();
        assert_eq!(merge_log, "No valid sub-batches were merged.\n");

        fs::remove_dir_all(&dir).unwrap();
    }
}
