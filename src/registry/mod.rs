//! Immutable reference tables every stage validates against.
//!
//! [`ReferenceRegistry`] is built once at startup from the station and
//! delay-code files plus [`PipelineConfig`], then passed by reference into
//! each stage. Nothing mutates it afterwards.

mod loader;

pub use loader::{
    RegistryError, parse_delay_codes, parse_station_lines, parse_station_list, strip_non_ascii,
};

use chrono::NaiveTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{CalendarConfig, PipelineConfig};
use crate::records::Season;

/// Reference text for a single delay code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayCodeInfo {
    pub category: String,
    pub description: String,
    pub public_explanation: String,
}

/// Rush-hour boundaries. Every interval is `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RushHourWindows {
    pub morning_start: NaiveTime,
    pub morning_end: NaiveTime,
    pub evening_start: NaiveTime,
    pub evening_end: NaiveTime,
}

/// Month (1-12) to season, total over the year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonCalendar {
    by_month: [Season; 12],
}

impl SeasonCalendar {
    pub fn season_for_month(&self, month: u32) -> Option<Season> {
        let index = usize::try_from(month).ok()?.checked_sub(1)?;
        self.by_month.get(index).copied()
    }
}

/// Where the on-disk reference files live.
#[derive(Debug, Clone)]
pub struct RegistryPaths {
    pub station_list: PathBuf,
    pub station_lines: PathBuf,
    pub delay_codes: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReferenceRegistry {
    valid_stations: BTreeSet<String>,
    station_lines: BTreeMap<String, Vec<String>>,
    line_bounds: BTreeMap<String, Vec<String>>,
    valid_bounds: Vec<String>,
    delay_codes: HashMap<String, DelayCodeInfo>,
    station_aliases: HashMap<String, String>,
    line_code_aliases: Vec<String>,
    rush_hours: RushHourWindows,
    seasons: SeasonCalendar,
}

impl ReferenceRegistry {
    /// Creates a registry holding only the configured tables: no stations and
    /// no delay codes. Use the `with_*` methods or [`ReferenceRegistry::load`]
    /// to fill those in.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, RegistryError> {
        let rush_hours = rush_hour_windows(&config.calendar)?;
        let seasons = season_calendar(&config.calendar)?;

        let upper = |s: &String| s.trim().to_uppercase();

        Ok(ReferenceRegistry {
            valid_stations: BTreeSet::new(),
            station_lines: BTreeMap::new(),
            line_bounds: config
                .routes
                .line_bounds
                .iter()
                .map(|(line, bounds)| (upper(line), bounds.iter().map(upper).collect()))
                .collect(),
            valid_bounds: config.routes.valid_bounds.iter().map(upper).collect(),
            delay_codes: HashMap::new(),
            station_aliases: config
                .stations
                .aliases
                .iter()
                .map(|(k, v)| (upper(k), upper(v)))
                .collect(),
            line_code_aliases: config.routes.line_code_aliases.iter().map(upper).collect(),
            rush_hours,
            seasons,
        })
    }

    /// Reads the three reference files and combines them with `config`.
    ///
    /// # Errors
    ///
    /// Any unreadable or malformed reference file is fatal.
    #[tracing::instrument(skip_all, fields(stations = %paths.station_lines.display()))]
    pub fn load(paths: &RegistryPaths, config: &PipelineConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::from_config(config)?;

        registry.valid_stations = parse_station_list(&loader::read_text(&paths.station_list)?);
        registry.station_lines = parse_station_lines(&loader::read_text(&paths.station_lines)?)?;
        registry.delay_codes = parse_delay_codes(loader::open(&paths.delay_codes)?)?;

        for station in registry.valid_stations.difference(&registry.key_set()) {
            warn!(station = %station, "Station listed as valid but has no line codes");
        }

        info!(
            stations = registry.station_lines.len(),
            delay_codes = registry.delay_codes.len(),
            lines = registry.line_bounds.len(),
            "Reference registry loaded"
        );

        Ok(registry)
    }

    fn key_set(&self) -> BTreeSet<String> {
        self.station_lines.keys().cloned().collect()
    }

    /// Adds a passenger station and its valid line codes.
    pub fn with_station(mut self, name: &str, lines: &[&str]) -> Self {
        let name = name.trim().to_uppercase();
        self.valid_stations.insert(name.clone());
        self.station_lines
            .insert(name, lines.iter().map(|l| l.trim().to_uppercase()).collect());
        self
    }

    /// Adds a delay code with its category and description.
    pub fn with_delay_code(mut self, code: &str, category: &str, description: &str) -> Self {
        self.delay_codes.insert(
            code.trim().to_uppercase(),
            DelayCodeInfo {
                category: category.to_string(),
                description: description.to_string(),
                public_explanation: String::new(),
            },
        );
        self
    }

    /// Valid line codes for a passenger station, `None` for anything else.
    pub fn lines_for_station(&self, station: &str) -> Option<&[String]> {
        self.station_lines.get(station).map(Vec::as_slice)
    }

    pub fn is_passenger_station(&self, station: &str) -> bool {
        self.station_lines.contains_key(station)
    }

    pub fn passenger_stations(&self) -> impl Iterator<Item = &str> {
        self.station_lines.keys().map(String::as_str)
    }

    /// Names from the plain station list file.
    pub fn listed_stations(&self) -> impl Iterator<Item = &str> {
        self.valid_stations.iter().map(String::as_str)
    }

    pub fn bounds_for_line(&self, line: &str) -> Option<&[String]> {
        self.line_bounds.get(line).map(Vec::as_slice)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.line_bounds.keys().map(String::as_str)
    }

    /// Whether `bound` is one of the system-wide direction codes.
    pub fn is_valid_bound(&self, bound: &str) -> bool {
        self.valid_bounds.iter().any(|b| b == bound)
    }

    pub fn delay_code(&self, code: &str) -> Option<&DelayCodeInfo> {
        self.delay_codes.get(code)
    }

    pub fn station_alias(&self, name: &str) -> Option<&str> {
        self.station_aliases.get(name).map(String::as_str)
    }

    pub fn line_code_aliases(&self) -> &[String] {
        &self.line_code_aliases
    }

    pub fn rush_hours(&self) -> &RushHourWindows {
        &self.rush_hours
    }

    pub fn seasons(&self) -> &SeasonCalendar {
        &self.seasons
    }
}

fn rush_hour_windows(calendar: &CalendarConfig) -> Result<RushHourWindows, RegistryError> {
    let windows = RushHourWindows {
        morning_start: calendar.morning_start,
        morning_end: calendar.morning_end,
        evening_start: calendar.evening_start,
        evening_end: calendar.evening_end,
    };

    let ordered = windows.morning_start <= windows.morning_end
        && windows.morning_end <= windows.evening_start
        && windows.evening_start <= windows.evening_end;
    if !ordered {
        return Err(RegistryError::InvalidRushHours);
    }
    Ok(windows)
}

fn season_calendar(calendar: &CalendarConfig) -> Result<SeasonCalendar, RegistryError> {
    let mut by_month: [Option<Season>; 12] = [None; 12];

    for entry in &calendar.seasons {
        for &month in &entry.months {
            let slot = month
                .checked_sub(1)
                .and_then(|i| by_month.get_mut(i as usize))
                .ok_or(RegistryError::InvalidMonth(month))?;
            if slot.is_some() {
                return Err(RegistryError::DuplicateMonth(month));
            }
            *slot = Some(entry.season);
        }
    }

    let mut seasons = [Season::Winter; 12];
    for (i, season) in by_month.iter().enumerate() {
        seasons[i] = season.ok_or(RegistryError::UncoveredMonth(i as u32 + 1))?;
    }
    Ok(SeasonCalendar { by_month: seasons })
}
