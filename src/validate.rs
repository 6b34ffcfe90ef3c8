//! Structural row filter.
//!
//! Rules are checked in a fixed order and the first violation is the one
//! recorded: missing values, zero delay, zero gap, delay not below gap, zero
//! vehicle number.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::records::{DropReason, DroppedRecord, RawRecord};

/// Cell values treated the same as an empty cell.
const NULL_MARKERS: [&str; 5] = ["nan", "null", "none", "n/a", "nat"];

/// A row that passed the structural checks, with its numeric fields parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecord {
    pub raw: RawRecord,
    pub delay_minutes: i64,
    pub gap_minutes: i64,
    pub vehicle_id: i64,
}

/// Kept rows plus the rows rejected along the way.
#[derive(Debug)]
pub struct Partition<T> {
    pub kept: Vec<T>,
    pub dropped: Vec<DroppedRecord>,
}

pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || NULL_MARKERS.iter().any(|m| cell.eq_ignore_ascii_case(m))
}

/// Parses an integer cell, accepting float renderings such as `"5.0"` that
/// spreadsheet exports produce.
pub fn parse_whole_number(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(n) = cell.parse::<i64>() {
        return Some(n);
    }

    let f = cell.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Checks a single row, returning the parsed `(delay, gap, vehicle)` or the
/// first rule it breaks.
pub fn check_record(raw: &RawRecord) -> Result<(i64, i64, i64), DropReason> {
    if raw.fields().iter().any(|f| is_missing(f)) {
        return Err(DropReason::MissingValues);
    }

    let (Some(delay), Some(gap), Some(vehicle)) = (
        parse_whole_number(&raw.min_delay),
        parse_whole_number(&raw.min_gap),
        parse_whole_number(&raw.vehicle),
    ) else {
        return Err(DropReason::MissingValues);
    };

    if delay <= 0 {
        return Err(DropReason::ZeroMinDelay);
    }
    if gap <= 0 {
        return Err(DropReason::ZeroGap);
    }
    if delay >= gap {
        return Err(DropReason::DelayNotLessThanGap);
    }
    if vehicle == 0 {
        return Err(DropReason::ZeroVehicleNumber);
    }

    Ok((delay, gap, vehicle))
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn validate_records(rows: Vec<RawRecord>) -> Partition<ValidRecord> {
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = Vec::new();

    for raw in rows {
        match check_record(&raw) {
            Ok((delay_minutes, gap_minutes, vehicle_id)) => kept.push(ValidRecord {
                raw,
                delay_minutes,
                gap_minutes,
                vehicle_id,
            }),
            Err(reason) => {
                debug!(reason = %reason, source = %raw.source, "Row rejected");
                dropped.push(DroppedRecord { raw, reason });
            }
        }
    }

    info!(kept = kept.len(), dropped = dropped.len(), "Validation complete");
    Partition { kept, dropped }
}

/// Drops rows whose ten reference fields repeat an earlier row, regardless of
/// which source they came from. The first occurrence is kept.
pub fn drop_duplicates(rows: Vec<ValidRecord>) -> Partition<ValidRecord> {
    let mut seen: HashSet<[String; 10]> = HashSet::with_capacity(rows.len());
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = Vec::new();

    for row in rows {
        let key = row.raw.fields().map(str::to_string);
        if seen.insert(key) {
            kept.push(row);
        } else {
            dropped.push(DroppedRecord {
                raw: row.raw,
                reason: DropReason::DuplicateRow,
            });
        }
    }

    if !dropped.is_empty() {
        info!(duplicates = dropped.len(), "Duplicate rows removed");
    }
    Partition { kept, dropped }
}
