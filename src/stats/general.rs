use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::records::DelayEvent;
use crate::stats::types::{GeneralDelayStats, TimeUnit};
use crate::stats::utility::{mean, median, quantile, sample_stddev};

/// Descriptive statistics of delay minutes over `events`, which should
/// already be filtered down to the slice of interest. `None` when empty.
pub fn general_delay_stats(
    events: &[&DelayEvent],
    delay_code: Option<&str>,
    unit: TimeUnit,
) -> Option<GeneralDelayStats> {
    if events.is_empty() {
        return None;
    }

    let minutes: Vec<f64> = events.iter().map(|e| e.delay_minutes as f64).collect();
    let n = minutes.len() as f64;

    let years: BTreeSet<i32> = events.iter().map(|e| e.year()).collect();
    let months: BTreeSet<(i32, u32)> = events.iter().map(|e| (e.year(), e.month())).collect();
    let days: BTreeSet<NaiveDate> = events.iter().map(|e| e.calendar_date()).collect();

    let convert = |m: f64| unit.from_minutes(m);

    Some(GeneralDelayStats {
        unit,
        average_delay_time: convert(mean(&minutes)),
        median_delay_time: median(&minutes).map(convert),
        delays_per_year: n / years.len() as f64,
        delays_per_month: n / months.len() as f64,
        delays_per_day: n / days.len() as f64,
        std_deviation_time: sample_stddev(&minutes).map(convert),
        percentile_90: quantile(&minutes, 0.90).map(convert),
        delay_code: delay_code.unwrap_or("General").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests_support::event;

    #[test]
    fn test_general_stats() {
        let events = vec![
            event("2023-01-02", "08:00", "UNION STATION", 2),
            event("2023-01-02", "09:00", "UNION STATION", 4),
            event("2023-02-01", "08:00", "UNION STATION", 6),
            event("2024-01-05", "08:00", "UNION STATION", 8),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = general_delay_stats(&refs, None, TimeUnit::Minutes).unwrap();

        assert_eq!(stats.average_delay_time, 5.0);
        assert_eq!(stats.median_delay_time, Some(5.0));
        assert_eq!(stats.delays_per_year, 2.0);
        assert!((stats.delays_per_month - 4.0 / 3.0).abs() < 1e-12);
        assert!((stats.delays_per_day - 4.0 / 3.0).abs() < 1e-12);
        assert!((stats.percentile_90.unwrap() - 7.4).abs() < 1e-9);
        assert_eq!(stats.delay_code, "General");
    }

    #[test]
    fn test_general_stats_in_hours_with_code() {
        let events = vec![event("2023-01-02", "08:00", "UNION STATION", 30)];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = general_delay_stats(&refs, Some("SUDP"), TimeUnit::Hours).unwrap();
        assert_eq!(stats.average_delay_time, 0.5);
        assert_eq!(stats.std_deviation_time, None);
        assert_eq!(stats.delay_code, "SUDP");

        assert!(general_delay_stats(&[], None, TimeUnit::Hours).is_none());
    }
}
