//! Per-line buffer recommendations.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::StatsConfig;
use crate::records::{DelayEvent, RushHourBucket};
use crate::registry::ReferenceRegistry;
use crate::stats::poisson::{expected_delays, k_at_percentile, p_any_delay};
use crate::stats::types::{LineStats, TimeUnit, WindowStats};
use crate::stats::utility::{median, round_to, round_to_nearest_5};

fn distinct_days(events: &[&DelayEvent], weekday: bool) -> usize {
    events
        .iter()
        .filter(|e| e.is_weekday == weekday)
        .map(|e| e.calendar_date())
        .collect::<BTreeSet<NaiveDate>>()
        .len()
}

/// Statistics for one bound of a line. `events` must already be restricted
/// to that line and bound.
pub fn bound_stats(
    events: &[&DelayEvent],
    bound: &str,
    config: &StatsConfig,
    unit: TimeUnit,
) -> Vec<WindowStats> {
    let weekdays = distinct_days(events, true);
    let weekends = distinct_days(events, false);

    let mut by_bucket: BTreeMap<RushHourBucket, Vec<f64>> = BTreeMap::new();
    for event in events {
        by_bucket
            .entry(event.rush_hour_bucket)
            .or_default()
            .push(event.delay_minutes as f64);
    }

    by_bucket
        .into_iter()
        .map(|(bucket, minutes)| {
            let n = minutes.len();
            let total: f64 = minutes.iter().sum();
            let typical = median(&minutes).unwrap_or(0.0);
            let days = if bucket.is_weekend() { weekends } else { weekdays };

            let lambda = expected_delays(n, days, bucket, config);
            let k = k_at_percentile(lambda, config.delay_count_percentile, config.max_delay_count);

            WindowStats {
                rush_hour: bucket,
                bound: bound.to_string(),
                number_of_delays: n,
                total_delay: round_to(unit.from_minutes(total), 2),
                avg_delay: round_to(unit.from_minutes(typical), 2),
                days_in_dataset: days,
                expected_delays: lambda,
                p_any_delay: round_to(p_any_delay(lambda), 3),
                k_at_90pct: k,
                recommended_buffer_min: round_to_nearest_5(typical * k as f64),
            }
        })
        .collect()
}

/// Window statistics for every direction of `line`. `None` when the line is
/// not in the registry.
#[tracing::instrument(skip(events, registry, config), fields(events = events.len()))]
pub fn line_stats(
    events: &[&DelayEvent],
    line: &str,
    registry: &ReferenceRegistry,
    config: &StatsConfig,
    unit: TimeUnit,
) -> Option<LineStats> {
    let Some(directions) = registry.bounds_for_line(line) else {
        warn!(line, "Line has no configured directions");
        return None;
    };

    let mut bounds = BTreeMap::new();
    for bound in directions {
        let slice: Vec<&DelayEvent> = events
            .iter()
            .copied()
            .filter(|e| e.line.as_deref() == Some(line) && e.bound.as_deref() == Some(bound.as_str()))
            .collect();

        debug!(bound = %bound, events = slice.len(), "Bound slice");
        bounds.insert(bound.clone(), bound_stats(&slice, bound, config, unit));
    }

    Some(LineStats {
        line: line.to_string(),
        unit,
        bounds,
    })
}

pub fn all_line_stats(
    events: &[&DelayEvent],
    registry: &ReferenceRegistry,
    config: &StatsConfig,
    unit: TimeUnit,
) -> Vec<LineStats> {
    registry
        .lines()
        .filter_map(|line| line_stats(events, line, registry, config, unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::stats::tests_support::event;

    fn on_line(date: &str, time: &str, delay: i64, bound: &str) -> DelayEvent {
        let mut e = event(date, time, "UNION STATION", delay);
        e.line = Some("YU".into());
        e.bound = Some(bound.into());
        e
    }

    #[test]
    fn test_morning_window() {
        // 2024-03-04..08 is Monday..Friday
        let events = vec![
            on_line("2024-03-04", "08:00", 4, "N"),
            on_line("2024-03-05", "08:10", 6, "N"),
            on_line("2024-03-06", "12:00", 3, "N"),
            on_line("2024-03-07", "12:30", 3, "N"),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = bound_stats(&refs, "N", &StatsConfig::default(), TimeUnit::Minutes);
        let morning = stats
            .iter()
            .find(|s| s.rush_hour == RushHourBucket::Morning)
            .unwrap();

        assert_eq!(morning.number_of_delays, 2);
        assert_eq!(morning.total_delay, 10.0);
        assert_eq!(morning.avg_delay, 5.0);
        assert_eq!(morning.days_in_dataset, 4);
        assert_eq!(morning.expected_delays, 0.5);
        assert_eq!(morning.p_any_delay, 0.393);
        assert_eq!(morning.k_at_90pct, 1);
        assert_eq!(morning.recommended_buffer_min, 5);
    }

    #[test]
    fn test_weekend_uses_weekend_days() {
        // 2024-03-09 and 2024-03-10 are a Saturday and Sunday
        let events = vec![
            on_line("2024-03-04", "08:00", 4, "S"),
            on_line("2024-03-09", "10:00", 8, "S"),
            on_line("2024-03-10", "11:00", 8, "S"),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = bound_stats(&refs, "S", &StatsConfig::default(), TimeUnit::Hours);
        let weekend = stats.iter().find(|s| s.rush_hour.is_weekend()).unwrap();

        assert_eq!(weekend.days_in_dataset, 2);
        assert!((weekend.expected_delays - 5.0 / 19.0).abs() < 1e-12);
        assert_eq!(weekend.total_delay, 0.27);
        assert_eq!(weekend.k_at_90pct, 1);
        // buffer is always in minutes
        assert_eq!(weekend.recommended_buffer_min, 10);
    }

    #[test]
    fn test_line_stats_splits_bounds() {
        let registry = ReferenceRegistry::from_config(&PipelineConfig::default()).unwrap();
        let mut other_line = on_line("2024-03-04", "08:00", 4, "N");
        other_line.line = Some("BD".into());
        let events = vec![
            on_line("2024-03-04", "08:00", 4, "N"),
            on_line("2024-03-04", "08:30", 4, "S"),
            other_line,
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = line_stats(&refs, "YU", &registry, &StatsConfig::default(), TimeUnit::Minutes)
            .unwrap();
        assert_eq!(stats.bounds.len(), 2);
        assert_eq!(stats.bounds["N"][0].number_of_delays, 1);
        assert_eq!(stats.bounds["S"][0].number_of_delays, 1);

        assert!(line_stats(&refs, "SRT", &registry, &StatsConfig::default(), TimeUnit::Minutes).is_none());
        assert_eq!(
            all_line_stats(&refs, &registry, &StatsConfig::default(), TimeUnit::Minutes).len(),
            3
        );
    }
}
