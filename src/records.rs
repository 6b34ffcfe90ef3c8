//! Row types shared by every pipeline stage.
//!
//! [`RawRecord`] is a merged source row as text, [`DelayEvent`] is a fully
//! cleaned canonical row, and [`DroppedRecord`] is a raw row that was rejected
//! together with the single reason it was rejected for.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source columns every batch must provide, in canonical output order.
pub const REFERENCE_COLUMNS: [&str; 10] = [
    "Date",
    "Time",
    "Day",
    "Station",
    "Code",
    "Min Delay",
    "Min Gap",
    "Bound",
    "Line",
    "Vehicle",
];

/// Row-id column some exports carry; the only extra column tolerated on merge.
pub const INTERNAL_ID_COLUMN: &str = "_id";

/// One merged source row, still as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Min Delay")]
    pub min_delay: String,
    #[serde(rename = "Min Gap")]
    pub min_gap: String,
    #[serde(rename = "Bound")]
    pub bound: String,
    #[serde(rename = "Line")]
    pub line: String,
    #[serde(rename = "Vehicle")]
    pub vehicle: String,
    /// Name of the sub-batch (file or sheet) the row was merged from.
    #[serde(rename = "Source")]
    pub source: String,
}

impl RawRecord {
    /// Builds a record from cells already ordered like [`REFERENCE_COLUMNS`].
    /// Missing trailing cells become empty strings.
    pub fn from_row(source: &str, row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        RawRecord {
            date: cell(0),
            time: cell(1),
            day: cell(2),
            station: cell(3),
            code: cell(4),
            min_delay: cell(5),
            min_gap: cell(6),
            bound: cell(7),
            line: cell(8),
            vehicle: cell(9),
            source: source.to_string(),
        }
    }

    /// The ten reference fields in [`REFERENCE_COLUMNS`] order.
    pub fn fields(&self) -> [&str; 10] {
        [
            &self.date,
            &self.time,
            &self.day,
            &self.station,
            &self.code,
            &self.min_delay,
            &self.min_gap,
            &self.bound,
            &self.line,
            &self.vehicle,
        ]
    }
}

/// Whether a canonical station name is a passenger stop, a known
/// non-passenger location (yard, wye, pocket track...), or unattributable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StationCategory {
    Passenger,
    #[serde(rename = "Non-passenger")]
    NonPassenger,
    Unknown,
}

impl StationCategory {
    pub const ALL: [StationCategory; 3] = [
        StationCategory::Passenger,
        StationCategory::NonPassenger,
        StationCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationCategory::Passenger => "Passenger",
            StationCategory::NonPassenger => "Non-passenger",
            StationCategory::Unknown => "Unknown",
        }
    }

    /// Lowercase form used in audit file names.
    pub fn slug(&self) -> &'static str {
        match self {
            StationCategory::Passenger => "passenger",
            StationCategory::NonPassenger => "non-passenger",
            StationCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutually exclusive time windows used for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RushHourBucket {
    Morning,
    #[serde(rename = "Off-peak: Afternoon")]
    OffPeakAfternoon,
    Evening,
    #[serde(rename = "Off-peak: Night")]
    OffPeakNight,
    Weekend,
}

impl RushHourBucket {
    pub const ALL: [RushHourBucket; 5] = [
        RushHourBucket::Morning,
        RushHourBucket::OffPeakAfternoon,
        RushHourBucket::Evening,
        RushHourBucket::OffPeakNight,
        RushHourBucket::Weekend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RushHourBucket::Morning => "Morning",
            RushHourBucket::OffPeakAfternoon => "Off-peak: Afternoon",
            RushHourBucket::Evening => "Evening",
            RushHourBucket::OffPeakNight => "Off-peak: Night",
            RushHourBucket::Weekend => "Weekend",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, RushHourBucket::Weekend)
    }
}

impl fmt::Display for RushHourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw row left the pipeline. Each dropped row carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingValues,
    ZeroMinDelay,
    ZeroGap,
    DelayNotLessThanGap,
    ZeroVehicleNumber,
    DuplicateRow,
    UnknownStation,
    UnparseableDatetime,
}

impl DropReason {
    pub const ALL: [DropReason; 8] = [
        DropReason::MissingValues,
        DropReason::ZeroMinDelay,
        DropReason::ZeroGap,
        DropReason::DelayNotLessThanGap,
        DropReason::ZeroVehicleNumber,
        DropReason::DuplicateRow,
        DropReason::UnknownStation,
        DropReason::UnparseableDatetime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingValues => "missing_values",
            DropReason::ZeroMinDelay => "zero_min_delay",
            DropReason::ZeroGap => "zero_gap",
            DropReason::DelayNotLessThanGap => "delay_not_less_than_gap",
            DropReason::ZeroVehicleNumber => "zero_vehicle_number",
            DropReason::DuplicateRow => "duplicate_row",
            DropReason::UnknownStation => "unknown_station",
            DropReason::UnparseableDatetime => "unparseable_datetime",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected row, kept verbatim for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    pub raw: RawRecord,
    pub reason: DropReason,
}

/// A row whose delay code is not in the code table. The row itself stays in
/// the dataset with a null code; this copy goes to manual review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCodeRecord {
    pub raw: RawRecord,
    pub code: String,
}

/// One row of the canonical cleaned dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayEvent {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Time")]
    pub time: NaiveTime,
    #[serde(rename = "Day")]
    pub day: String,
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Station Category")]
    pub station_category: StationCategory,
    #[serde(rename = "Code")]
    pub delay_code: Option<String>,
    #[serde(rename = "Min Delay")]
    pub delay_minutes: i64,
    #[serde(rename = "Min Gap")]
    pub gap_minutes: i64,
    #[serde(rename = "Bound")]
    pub bound: Option<String>,
    #[serde(rename = "Line")]
    pub line: Option<String>,
    #[serde(rename = "Vehicle")]
    pub vehicle_id: i64,
    #[serde(rename = "DateTime")]
    pub datetime: NaiveDateTime,
    #[serde(rename = "IsWeekday")]
    pub is_weekday: bool,
    #[serde(rename = "Rush Hour")]
    pub rush_hour_bucket: RushHourBucket,
    #[serde(rename = "Season")]
    pub season: Season,
    #[serde(rename = "Delay Category")]
    pub delay_category: Option<String>,
    #[serde(rename = "Delay Description")]
    pub delay_description: Option<String>,
}

impl DelayEvent {
    pub fn year(&self) -> i32 {
        self.datetime.year()
    }

    pub fn month(&self) -> u32 {
        self.datetime.month()
    }

    pub fn calendar_date(&self) -> NaiveDate {
        self.datetime.date()
    }
}
