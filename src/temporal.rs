//! Date/time parsing and calendar bucketing.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::records::{RushHourBucket, Season};
use crate::registry::{ReferenceRegistry, RushHourWindows};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemporalError {
    #[error("unrecognized date: {0:?}")]
    InvalidDate(String),
    #[error("unrecognized time: {0:?}")]
    InvalidTime(String),
    #[error("month {0} has no season")]
    NoSeason(u32),
}

/// ISO forms first. Numeric dates are month-first, falling back to day-first
/// when the leading field cannot be a month.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
];

/// Spreadsheet exports sometimes write dates as midnight timestamps.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

pub fn parse_date(raw: &str) -> Result<NaiveDate, TemporalError> {
    let text = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
        .ok_or_else(|| TemporalError::InvalidDate(raw.to_string()))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, TemporalError> {
    let text = raw.trim();

    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
        .ok_or_else(|| TemporalError::InvalidTime(raw.to_string()))
}

pub fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, TemporalError> {
    Ok(parse_date(date)?.and_time(parse_time(time)?))
}

pub fn is_weekday(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() < 5
}

/// Full English weekday name, e.g. `"Monday"`.
pub fn day_name(date: NaiveDate) -> String {
    let name = match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    };
    name.to_string()
}

pub fn rush_hour_bucket(datetime: NaiveDateTime, windows: &RushHourWindows) -> RushHourBucket {
    if !is_weekday(datetime.date()) {
        return RushHourBucket::Weekend;
    }

    let t = datetime.time();
    if windows.morning_start <= t && t < windows.morning_end {
        RushHourBucket::Morning
    } else if windows.morning_end <= t && t < windows.evening_start {
        RushHourBucket::OffPeakAfternoon
    } else if windows.evening_start <= t && t < windows.evening_end {
        RushHourBucket::Evening
    } else {
        RushHourBucket::OffPeakNight
    }
}

/// Calendar fields derived from one parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeContext {
    pub datetime: NaiveDateTime,
    pub day: String,
    pub is_weekday: bool,
    pub rush_hour_bucket: RushHourBucket,
    pub season: Season,
}

/// Parses the raw date and time cells and derives every calendar field.
pub fn time_context(
    date: &str,
    time: &str,
    registry: &ReferenceRegistry,
) -> Result<TimeContext, TemporalError> {
    let datetime = parse_timestamp(date, time)?;
    let month = datetime.month();
    let season = registry
        .seasons()
        .season_for_month(month)
        .ok_or(TemporalError::NoSeason(month))?;

    Ok(TimeContext {
        datetime,
        day: day_name(datetime.date()),
        is_weekday: is_weekday(datetime.date()),
        rush_hour_bucket: rush_hour_bucket(datetime, registry.rush_hours()),
        season,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn registry() -> ReferenceRegistry {
        ReferenceRegistry::from_config(&PipelineConfig::default()).unwrap()
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        parse_timestamp(date, time).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        assert_eq!(parse_date("2024-03-05").unwrap(), expected);
        assert_eq!(parse_date("2024/03/05").unwrap(), expected);
        assert_eq!(parse_date("03/05/2024").unwrap(), expected);
        assert_eq!(parse_date("03-05-2024").unwrap(), expected);
        assert_eq!(parse_date("05-Mar-2024").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05 00:00:00").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05 08:30").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05T08:30").unwrap(), expected);
        assert_eq!(parse_date(" 2024-03-05 ").unwrap(), expected);
    }

    #[test]
    fn test_numeric_dates_month_first_then_day_first() {
        assert_eq!(
            parse_date("05/03/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
        );
        assert_eq!(
            parse_date("01/13/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 13).unwrap()
        );
        assert_eq!(
            parse_date("13/01/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 13).unwrap()
        );
        assert_eq!(
            parse_date("25-12-2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 25).unwrap()
        );
        assert!(parse_date("13/13/2024").is_err());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(
            parse_date("not a date"),
            Err(TemporalError::InvalidDate(_))
        ));
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveTime::from_hms_opt(8, 30, 0).unwrap();

        assert_eq!(parse_time("08:30").unwrap(), expected);
        assert_eq!(parse_time("08:30:00").unwrap(), expected);
        assert_eq!(parse_time("8:30").unwrap(), expected);
        assert!(matches!(parse_time("25:00"), Err(TemporalError::InvalidTime(_))));
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn test_weekday_and_day_name() {
        // 2024-03-04 is a Monday, 2024-03-09 a Saturday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert!(is_weekday(monday));
        assert!(!is_weekday(saturday));
        assert_eq!(day_name(monday), "Monday");
        assert_eq!(day_name(saturday), "Saturday");
    }

    #[test]
    fn test_rush_hour_buckets() {
        let registry = registry();
        let w = registry.rush_hours();

        assert_eq!(rush_hour_bucket(at("2024-03-04", "08:30"), w), RushHourBucket::Morning);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "19:30"), w), RushHourBucket::OffPeakNight);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "12:00"), w), RushHourBucket::OffPeakAfternoon);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "17:45"), w), RushHourBucket::Evening);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "02:10"), w), RushHourBucket::OffPeakNight);
        assert_eq!(rush_hour_bucket(at("2024-03-09", "08:30"), w), RushHourBucket::Weekend);
    }

    #[test]
    fn test_rush_hour_boundaries_half_open() {
        let registry = registry();
        let w = registry.rush_hours();

        assert_eq!(rush_hour_bucket(at("2024-03-04", "06:00"), w), RushHourBucket::Morning);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "05:59"), w), RushHourBucket::OffPeakNight);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "09:00"), w), RushHourBucket::OffPeakAfternoon);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "15:00"), w), RushHourBucket::Evening);
        assert_eq!(rush_hour_bucket(at("2024-03-04", "19:00"), w), RushHourBucket::OffPeakNight);
    }

    #[test]
    fn test_time_context() {
        let ctx = time_context("2023-12-29", "17:05", &registry()).unwrap();

        assert_eq!(ctx.day, "Friday");
        assert!(ctx.is_weekday);
        assert_eq!(ctx.rush_hour_bucket, RushHourBucket::Evening);
        assert_eq!(ctx.season, Season::Winter);

        assert!(time_context("2023-12-29", "??", &registry()).is_err());
    }
}
