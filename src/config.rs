//! Tunable pipeline settings.
//!
//! Stored as a JSON object on disk. Every section and field is optional and
//! falls back to [`Default`]:
//! ```json
//! {
//!   "calendar": { "morning_start": "06:00:00", "morning_end": "09:00:00" },
//!   "routes": { "line_bounds": { "YU": ["N", "S"], "BD": ["E", "W"] } },
//!   "stats": { "weekend_service_hours": 19.0, "weekend_exposure_hours": 5.0 }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::records::Season;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calendar: CalendarConfig,
    pub routes: RouteConfig,
    pub stations: StationConfig,
    pub stats: StatsConfig,
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                info!(path = %p.display(), "Loading pipeline config");
                Self::load(p)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Rush-hour boundaries (half-open, start inclusive) and the season calendar.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub morning_start: NaiveTime,
    pub morning_end: NaiveTime,
    pub evening_start: NaiveTime,
    pub evening_end: NaiveTime,
    pub seasons: Vec<SeasonMonths>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonMonths {
    pub season: Season,
    pub months: Vec<u32>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            morning_start: hm(6, 0),
            morning_end: hm(9, 0),
            evening_start: hm(15, 0),
            evening_end: hm(19, 0),
            seasons: vec![
                SeasonMonths {
                    season: Season::Winter,
                    months: vec![12, 1, 2],
                },
                SeasonMonths {
                    season: Season::Spring,
                    months: vec![3, 4, 5],
                },
                SeasonMonths {
                    season: Season::Summer,
                    months: vec![6, 7, 8],
                },
                SeasonMonths {
                    season: Season::Fall,
                    months: vec![9, 10, 11],
                },
            ],
        }
    }
}

/// Line directions and the line-code tokens that leak into station names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub line_bounds: BTreeMap<String, Vec<String>>,
    pub valid_bounds: Vec<String>,
    pub line_code_aliases: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        let line_bounds = [("YU", ["N", "S"]), ("BD", ["E", "W"]), ("SHP", ["E", "W"])]
            .into_iter()
            .map(|(line, bounds)| {
                (
                    line.to_string(),
                    bounds.iter().map(|b| b.to_string()).collect(),
                )
            })
            .collect();

        RouteConfig {
            line_bounds,
            valid_bounds: ["N", "S", "E", "W"].iter().map(|b| b.to_string()).collect(),
            line_code_aliases: ["YU", "YUS", "BD", "BDL", "BDN", "BD-S", "L1", "L2"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Known misspellings, abbreviations and interchange variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub aliases: BTreeMap<String, String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        const VMC: &str = "VAUGHAN METROPOLITAN CENTRE STATION";
        const BLOOR_YONGE: &str = "BLOOR-YONGE STATION";
        const SHEPPARD_YONGE: &str = "SHEPPARD-YONGE STATION";

        let aliases = [
            ("VMC STATION", VMC),
            ("VAUGHAN MC STATION", VMC),
            ("NORTH YORK CTR STATION", "NORTH YORK CENTRE STATION"),
            ("BLOOR STATION", BLOOR_YONGE),
            ("BLOOR/YONGE STATION", BLOOR_YONGE),
            ("BLOOR YONGE STATION", BLOOR_YONGE),
            ("YONGE STATION", BLOOR_YONGE),
            ("YONGE-UNIVERSITY AND B STATION", BLOOR_YONGE),
            ("SHEPPARDYONGE STATION", SHEPPARD_YONGE),
            ("SHEPPARD STATION", SHEPPARD_YONGE),
            ("YONGE SHEP STATION", SHEPPARD_YONGE),
            ("YONGE SHP STATION", SHEPPARD_YONGE),
            ("SHEPPARD YONGE STATION", SHEPPARD_YONGE),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        StationConfig { aliases }
    }
}

/// Constants for the Poisson buffer model and station summaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Average weekend service span in hours (Sat ~20h, Sun ~18h).
    pub weekend_service_hours: f64,
    /// Weekend slice length comparable to a weekday bucket.
    pub weekend_exposure_hours: f64,
    /// Target cumulative probability for the delay-count percentile.
    pub delay_count_percentile: f64,
    /// Upper bound for the percentile scan.
    pub max_delay_count: u64,
    /// Delays at or above this many minutes count as major.
    pub major_delay_minutes: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            weekend_service_hours: 19.0,
            weekend_exposure_hours: 5.0,
            delay_count_percentile: 0.90,
            max_delay_count: 1_000,
            major_delay_minutes: 20,
        }
    }
}
