//! Composable row selection over cleaned events.

use crate::records::{DelayEvent, RushHourBucket, Season};

/// Each `with_*` narrows the selection; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    years: Option<(i32, i32)>,
    stations: Option<Vec<String>>,
    line: Option<String>,
    bound: Option<String>,
    codes: Option<Vec<String>>,
    category: Option<String>,
    season: Option<Season>,
    rush_hour: Option<RushHourBucket>,
    weekday: Option<bool>,
    delay_range: Option<(i64, i64)>,
    vehicle: Option<i64>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive year range.
    pub fn with_years(mut self, start: i32, end: i32) -> Self {
        self.years = Some((start, end));
        self
    }

    pub fn with_year(self, year: i32) -> Self {
        self.with_years(year, year)
    }

    pub fn with_stations<S: AsRef<str>>(mut self, stations: &[S]) -> Self {
        self.stations = Some(stations.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.line = Some(line.to_string());
        self
    }

    pub fn with_bound(mut self, bound: &str) -> Self {
        self.bound = Some(bound.to_string());
        self
    }

    pub fn with_codes<S: AsRef<str>>(mut self, codes: &[S]) -> Self {
        self.codes = Some(codes.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_rush_hour(mut self, bucket: RushHourBucket) -> Self {
        self.rush_hour = Some(bucket);
        self
    }

    pub fn weekdays_only(mut self) -> Self {
        self.weekday = Some(true);
        self
    }

    pub fn weekends_only(mut self) -> Self {
        self.weekday = Some(false);
        self
    }

    /// Inclusive delay-minute range.
    pub fn with_delay_range(mut self, min: i64, max: i64) -> Self {
        self.delay_range = Some((min, max));
        self
    }

    pub fn with_vehicle(mut self, vehicle: i64) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    pub fn matches(&self, event: &DelayEvent) -> bool {
        if let Some((start, end)) = self.years {
            if !(start..=end).contains(&event.year()) {
                return false;
            }
        }
        if let Some(stations) = &self.stations {
            if !stations.iter().any(|s| *s == event.station) {
                return false;
            }
        }
        if self.line.is_some() && event.line != self.line {
            return false;
        }
        if self.bound.is_some() && event.bound != self.bound {
            return false;
        }
        if let Some(codes) = &self.codes {
            let hit = event
                .delay_code
                .as_ref()
                .is_some_and(|code| codes.contains(code));
            if !hit {
                return false;
            }
        }
        if self.category.is_some() && event.delay_category != self.category {
            return false;
        }
        if self.season.is_some_and(|s| s != event.season) {
            return false;
        }
        if self.rush_hour.is_some_and(|b| b != event.rush_hour_bucket) {
            return false;
        }
        if self.weekday.is_some_and(|w| w != event.is_weekday) {
            return false;
        }
        if let Some((min, max)) = self.delay_range {
            if !(min..=max).contains(&event.delay_minutes) {
                return false;
            }
        }
        if self.vehicle.is_some_and(|v| v != event.vehicle_id) {
            return false;
        }
        true
    }

    pub fn apply<'e>(&self, events: &'e [DelayEvent]) -> Vec<&'e DelayEvent> {
        events.iter().filter(|e| self.matches(e)).collect()
    }
}
