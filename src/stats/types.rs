//! Serializable statistics objects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::records::RushHourBucket;

/// Unit for durations in statistics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Minutes per unit.
    pub fn factor(&self) -> f64 {
        match self {
            TimeUnit::Minutes => 1.0,
            TimeUnit::Hours => 60.0,
            TimeUnit::Days => 60.0 * 24.0,
        }
    }

    pub fn from_minutes(&self, minutes: f64) -> f64 {
        minutes / self.factor()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poisson buffer statistics for one (line, bound, rush-hour window).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub rush_hour: RushHourBucket,
    pub bound: String,
    pub number_of_delays: usize,
    pub total_delay: f64,
    /// Median, so a few major incidents do not dominate.
    pub avg_delay: f64,
    pub days_in_dataset: usize,
    pub expected_delays: f64,
    pub p_any_delay: f64,
    pub k_at_90pct: u64,
    pub recommended_buffer_min: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStats {
    pub line: String,
    pub unit: TimeUnit,
    pub bounds: BTreeMap<String, Vec<WindowStats>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationYearStats {
    pub station_name: String,
    pub year: i32,
    pub unit: TimeUnit,
    pub total_delays: usize,
    pub time_lost: f64,
    pub major_delays: usize,
    pub pct_of_system_delays_originating: f64,
    /// `"<category>: <Description>"`, absent when no event had a known code.
    pub top_reason_for_delays: Option<String>,
}

/// One station that stays in the per-year top N for a set of delay codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeStationStats {
    pub station: String,
    pub avg_delay_per_incident: f64,
    pub avg_count_per_year: f64,
    pub avg_time_lost_per_year_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeStats {
    pub code_name: String,
    pub codes: Vec<String>,
    pub unit: TimeUnit,
    pub top_n: usize,
    pub stations: Vec<CodeStationStats>,
}

/// A station or vehicle ranked in the top N by delay minutes in every year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistentEntry<K> {
    pub key: K,
    pub total_delay: f64,
    pub per_year: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralDelayStats {
    pub unit: TimeUnit,
    pub average_delay_time: f64,
    pub median_delay_time: Option<f64>,
    pub delays_per_year: f64,
    pub delays_per_month: f64,
    pub delays_per_day: f64,
    pub std_deviation_time: Option<f64>,
    pub percentile_90: Option<f64>,
    /// The code the stats were restricted to, or `"General"`.
    pub delay_code: String,
}
