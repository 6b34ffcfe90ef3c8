//! Station and vehicle rankings.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use tracing::info;

use crate::records::DelayEvent;
use crate::stats::types::{
    CodeStationStats, CodeStats, ConsistentEntry, StationYearStats, TimeUnit,
};
use crate::stats::utility::{mean, pct, round_to};

/// Most frequent value; ties go to the smallest value.
fn mode<'e>(values: impl Iterator<Item = &'e str>) -> Option<&'e str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    // max_by_key keeps the last maximum, so walk in reverse key order
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(v, _)| v)
}

/// `"DISORDERLY PATRON"` -> `"Disorderly patron"`
fn sentence_case(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Summary for one station in one year. `events` must be that station's
/// events for that year; `system_total` is the number of delays across all
/// stations in the same year.
pub fn station_year_stats(
    events: &[&DelayEvent],
    system_total: usize,
    unit: TimeUnit,
    major_delay_minutes: i64,
) -> Option<StationYearStats> {
    let first = events.first()?;

    let minutes: i64 = events.iter().map(|e| e.delay_minutes).sum();
    let category = mode(events.iter().filter_map(|e| e.delay_category.as_deref()));
    let description = mode(events.iter().filter_map(|e| e.delay_description.as_deref()));

    Some(StationYearStats {
        station_name: first.station.clone(),
        year: first.year(),
        unit,
        total_delays: events.len(),
        time_lost: round_to(unit.from_minutes(minutes as f64), 2),
        major_delays: events
            .iter()
            .filter(|e| e.delay_minutes >= major_delay_minutes)
            .count(),
        pct_of_system_delays_originating: round_to(pct(events.len(), system_total), 2),
        top_reason_for_delays: category
            .zip(description)
            .map(|(c, d)| format!("{c}: {}", sentence_case(d))),
    })
}

/// Stats for every station with delays in `year`, busiest first.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn all_station_stats(
    events: &[&DelayEvent],
    year: i32,
    unit: TimeUnit,
    major_delay_minutes: i64,
) -> Vec<StationYearStats> {
    let mut by_station: BTreeMap<&str, Vec<&DelayEvent>> = BTreeMap::new();
    for event in events.iter().copied().filter(|e| e.year() == year) {
        by_station.entry(event.station.as_str()).or_default().push(event);
    }
    let system_total: usize = by_station.values().map(Vec::len).sum();

    let mut stats: Vec<StationYearStats> = by_station
        .values()
        .filter_map(|station_events| {
            station_year_stats(station_events, system_total, unit, major_delay_minutes)
        })
        .collect();
    stats.sort_by(|a, b| b.total_delays.cmp(&a.total_delays));

    info!(stations = stats.len(), system_total, "Station stats computed");
    stats
}

/// Latest year with December data; otherwise the year before the latest.
pub fn latest_complete_year(events: &[&DelayEvent]) -> Option<i32> {
    let latest = events.iter().map(|e| e.year()).max()?;
    let has_december = events.iter().any(|e| e.year() == latest && e.month() == 12);

    Some(if has_december { latest } else { latest - 1 })
}

/// Number of months covered, counting the latest year only up to its last
/// month with data.
pub fn num_of_months(events: &[&DelayEvent]) -> usize {
    let years: BTreeSet<i32> = events.iter().map(|e| e.year()).collect();
    let Some(&latest) = years.last() else {
        return 0;
    };
    let months = events
        .iter()
        .filter(|e| e.year() == latest)
        .map(|e| e.month() as usize)
        .max()
        .unwrap_or(12);

    (years.len() - 1) * 12 + months
}

/// Keys ranked in the top `top_n` of every year present. Ties in score
/// break on key order.
fn consistent_keys<K: Ord + Clone>(
    per_year: &BTreeMap<i32, HashMap<K, f64>>,
    top_n: usize,
) -> BTreeSet<K> {
    let mut consistent: Option<BTreeSet<K>> = None;

    for scores in per_year.values() {
        let mut ranked: Vec<(&K, f64)> = scores.iter().map(|(k, s)| (k, *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top: BTreeSet<K> = ranked.into_iter().take(top_n).map(|(k, _)| k.clone()).collect();

        consistent = Some(match consistent {
            None => top,
            Some(acc) => acc.intersection(&top).cloned().collect(),
        });
    }

    consistent.unwrap_or_default()
}

/// Stations with the most incidents of `codes`, consistently across years.
///
/// Per station: mean delay per incident (in `unit`), incidents per year
/// normalized by the months covered, and time lost per year in hours.
/// Empty when no station makes the top `top_n` in every year.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn code_specific_station_stats(
    events: &[&DelayEvent],
    codes: &[String],
    code_name: &str,
    top_n: usize,
    unit: TimeUnit,
) -> CodeStats {
    let matching: Vec<&DelayEvent> = events
        .iter()
        .copied()
        .filter(|e| e.delay_code.as_ref().is_some_and(|c| codes.contains(c)))
        .collect();

    let mut per_year: BTreeMap<i32, HashMap<String, f64>> = BTreeMap::new();
    let mut minutes_by_station: HashMap<&str, Vec<f64>> = HashMap::new();
    for event in &matching {
        *per_year
            .entry(event.year())
            .or_default()
            .entry(event.station.clone())
            .or_default() += 1.0;
        minutes_by_station
            .entry(event.station.as_str())
            .or_default()
            .push(event.delay_minutes as f64);
    }

    let months = num_of_months(&matching);
    let stations = consistent_keys(&per_year, top_n)
        .into_iter()
        .filter_map(|station| {
            let minutes = minutes_by_station.get(station.as_str())?;
            let per_incident = mean(minutes);
            let per_year_count = if months == 0 {
                0.0
            } else {
                round_to(minutes.len() as f64 / months as f64 * 12.0, 1)
            };

            Some(CodeStationStats {
                avg_delay_per_incident: round_to(unit.from_minutes(per_incident), 2),
                avg_count_per_year: per_year_count,
                avg_time_lost_per_year_hours: round_to(
                    TimeUnit::Hours.from_minutes(per_incident * per_year_count),
                    2,
                ),
                station,
            })
        })
        .collect::<Vec<_>>();

    info!(code_name, consistent = stations.len(), "Code-specific station stats computed");

    CodeStats {
        code_name: code_name.to_string(),
        codes: codes.to_vec(),
        unit,
        top_n,
        stations,
    }
}

/// Keys in the top `top_n` by total delay minutes in each of the last
/// `last_n_years` years of data, largest overall total first.
pub fn consistent_top_n<K, F>(
    events: &[&DelayEvent],
    last_n_years: usize,
    top_n: usize,
    unit: TimeUnit,
    key: F,
) -> Vec<ConsistentEntry<K>>
where
    K: Ord + Hash + Clone,
    F: Fn(&DelayEvent) -> K,
{
    let years: BTreeSet<i32> = events.iter().map(|e| e.year()).collect();
    let window: BTreeSet<i32> = years.into_iter().rev().take(last_n_years).collect();

    let mut per_year: BTreeMap<i32, HashMap<K, f64>> = BTreeMap::new();
    for event in events.iter().filter(|e| window.contains(&e.year())) {
        *per_year
            .entry(event.year())
            .or_default()
            .entry(key(event))
            .or_default() += event.delay_minutes as f64;
    }

    let mut entries: Vec<ConsistentEntry<K>> = consistent_keys(&per_year, top_n)
        .into_iter()
        .map(|k| {
            let by_year: BTreeMap<i32, f64> = per_year
                .iter()
                .filter_map(|(year, scores)| scores.get(&k).map(|m| (*year, *m)))
                .collect();
            let total: f64 = by_year.values().sum();

            ConsistentEntry {
                key: k,
                total_delay: round_to(unit.from_minutes(total), 2),
                per_year: by_year
                    .into_iter()
                    .map(|(y, m)| (y, round_to(unit.from_minutes(m), 2)))
                    .collect(),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total_delay.total_cmp(&a.total_delay));
    entries
}

pub fn consistently_top_stations(
    events: &[&DelayEvent],
    last_n_years: usize,
    top_n: usize,
    unit: TimeUnit,
) -> Vec<ConsistentEntry<String>> {
    consistent_top_n(events, last_n_years, top_n, unit, |e| e.station.clone())
}

pub fn consistently_top_vehicles(
    events: &[&DelayEvent],
    last_n_years: usize,
    top_n: usize,
    unit: TimeUnit,
) -> Vec<ConsistentEntry<i64>> {
    consistent_top_n(events, last_n_years, top_n, unit, |e| e.vehicle_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests_support::event;

    fn coded(date: &str, station: &str, delay: i64, code: &str) -> DelayEvent {
        let mut e = event(date, "10:00", station, delay);
        e.delay_code = Some(code.into());
        e.delay_category = Some("Patron".into());
        e.delay_description = Some("DISORDERLY PATRON".into());
        e
    }

    #[test]
    fn test_sentence_case() {
        assert_eq!(sentence_case("DISORDERLY PATRON"), "Disorderly patron");
        assert_eq!(sentence_case(""), "");
    }

    #[test]
    fn test_mode_ties_to_smallest() {
        assert_eq!(mode(["b", "a", "b", "a"].into_iter()), Some("a"));
        assert_eq!(mode(["b", "a", "b"].into_iter()), Some("b"));
        assert_eq!(mode(std::iter::empty()), None);
    }

    #[test]
    fn test_station_year_stats() {
        let events = vec![
            coded("2023-02-01", "UNION STATION", 25, "SUDP"),
            coded("2023-02-02", "UNION STATION", 5, "SUDP"),
            event("2023-02-03", "10:00", "UNION STATION", 30),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = station_year_stats(&refs, 12, TimeUnit::Hours, 20).unwrap();

        assert_eq!(stats.station_name, "UNION STATION");
        assert_eq!(stats.year, 2023);
        assert_eq!(stats.total_delays, 3);
        assert_eq!(stats.time_lost, 1.0);
        assert_eq!(stats.major_delays, 2);
        assert_eq!(stats.pct_of_system_delays_originating, 25.0);
        assert_eq!(
            stats.top_reason_for_delays.as_deref(),
            Some("Patron: Disorderly patron")
        );
        assert!(station_year_stats(&[], 12, TimeUnit::Hours, 20).is_none());
    }

    #[test]
    fn test_all_station_stats_uses_one_year() {
        let events = vec![
            event("2023-02-01", "10:00", "UNION STATION", 5),
            event("2023-02-01", "11:00", "KIPLING STATION", 5),
            event("2023-02-02", "11:00", "KIPLING STATION", 5),
            event("2024-02-01", "10:00", "UNION STATION", 5),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = all_station_stats(&refs, 2023, TimeUnit::Minutes, 20);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].station_name, "KIPLING STATION");
        assert_eq!(stats[1].pct_of_system_delays_originating, 33.33);
    }

    #[test]
    fn test_latest_complete_year() {
        let events = vec![
            event("2023-12-30", "10:00", "UNION STATION", 5),
            event("2024-06-01", "10:00", "UNION STATION", 5),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();
        assert_eq!(latest_complete_year(&refs), Some(2023));
        assert_eq!(latest_complete_year(&refs[..1]), Some(2023));
        assert_eq!(latest_complete_year(&[]), None);
    }

    #[test]
    fn test_num_of_months() {
        let events = vec![
            event("2022-03-01", "10:00", "UNION STATION", 5),
            event("2023-12-01", "10:00", "UNION STATION", 5),
            event("2024-06-01", "10:00", "UNION STATION", 5),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();
        assert_eq!(num_of_months(&refs), 30);
        assert_eq!(num_of_months(&refs[..2]), 24);
        assert_eq!(num_of_months(&[]), 0);
    }

    #[test]
    fn test_code_specific_consistent_stations() {
        let mut events = Vec::new();
        for year in ["2022", "2023"] {
            for day in 1..=3 {
                events.push(coded(&format!("{year}-12-0{day}"), "UNION STATION", 6, "SUDP"));
            }
            events.push(coded(&format!("{year}-12-10"), "KIPLING STATION", 4, "SUDP"));
        }
        events.push(coded("2022-12-11", "KIPLING STATION", 4, "SUDP"));
        events.push(coded("2023-12-11", "FINCH STATION", 4, "SUDP"));
        events.push(coded("2023-12-12", "FINCH STATION", 4, "SUDP"));
        events.push(coded("2023-12-13", "FINCH STATION", 4, "MUSAN"));
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats = code_specific_station_stats(
            &refs,
            &["SUDP".to_string()],
            "Disorderly patron",
            1,
            TimeUnit::Minutes,
        );

        assert_eq!(stats.stations.len(), 1);
        let union = &stats.stations[0];
        assert_eq!(union.station, "UNION STATION");
        assert_eq!(union.avg_delay_per_incident, 6.0);
        assert_eq!(union.avg_count_per_year, 3.0);
        assert_eq!(union.avg_time_lost_per_year_hours, 0.3);
    }

    #[test]
    fn test_empty_intersection_is_empty() {
        let events = vec![
            coded("2022-05-01", "UNION STATION", 6, "SUDP"),
            coded("2023-05-01", "KIPLING STATION", 6, "SUDP"),
        ];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stats =
            code_specific_station_stats(&refs, &["SUDP".to_string()], "x", 1, TimeUnit::Minutes);
        assert!(stats.stations.is_empty());
        assert!(consistently_top_stations(&refs, 2, 1, TimeUnit::Minutes).is_empty());
    }

    #[test]
    fn test_consistently_top_stations_and_vehicles() {
        let mut a = event("2022-05-01", "10:00", "UNION STATION", 30);
        a.vehicle_id = 5001;
        let mut b = event("2023-05-01", "10:00", "UNION STATION", 20);
        b.vehicle_id = 5001;
        let mut c = event("2023-05-02", "10:00", "KIPLING STATION", 10);
        c.vehicle_id = 5002;
        let d = event("2021-05-02", "10:00", "KIPLING STATION", 90);
        let events = vec![a, b, c, d];
        let refs: Vec<&DelayEvent> = events.iter().collect();

        let stations = consistently_top_stations(&refs, 2, 1, TimeUnit::Minutes);
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].key, "UNION STATION");
        assert_eq!(stations[0].total_delay, 50.0);
        assert_eq!(stations[0].per_year[&2022], 30.0);

        let vehicles = consistently_top_vehicles(&refs, 2, 2, TimeUnit::Minutes);
        assert_eq!(vehicles[0].key, 5001);
    }
}
