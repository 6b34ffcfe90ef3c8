//! Poisson model of how many delays a trip in one time window runs into.

use statrs::distribution::{Discrete, DiscreteCDF, Poisson};

use crate::config::StatsConfig;
use crate::records::RushHourBucket;

/// λ for a window: delays per day in the window.
///
/// Weekend counts cover a whole service day, so they are rescaled to an
/// hourly rate and then to a slice the length of a weekday window.
pub fn expected_delays(
    delays: usize,
    days: usize,
    bucket: RushHourBucket,
    config: &StatsConfig,
) -> f64 {
    if days == 0 {
        return 0.0;
    }
    let per_day = delays as f64 / days as f64;

    if bucket.is_weekend() {
        (per_day / config.weekend_service_hours) * config.weekend_exposure_hours
    } else {
        per_day
    }
}

fn distribution(lambda: f64) -> Option<Poisson> {
    if !lambda.is_finite() || lambda <= 0.0 {
        return None;
    }
    Poisson::new(lambda).ok()
}

/// P(X >= 1) for X ~ Poisson(λ).
pub fn p_any_delay(lambda: f64) -> f64 {
    match distribution(lambda) {
        Some(p) => 1.0 - p.pmf(0),
        None => 0.0,
    }
}

/// Smallest k with P(X <= k) >= `percentile`, scanning from 0 up to `max_k`.
/// A degenerate λ (zero, negative, NaN) gives 0.
pub fn k_at_percentile(lambda: f64, percentile: f64, max_k: u64) -> u64 {
    let Some(dist) = distribution(lambda) else {
        return 0;
    };

    (0..=max_k)
        .find(|&k| dist.cdf(k) >= percentile)
        .unwrap_or(max_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_for_half_a_delay_per_day() {
        assert_eq!(k_at_percentile(0.5, 0.90, 1000), 1);
    }

    #[test]
    fn test_k_matches_cdf_table() {
        // (λ, k) where CDF(k - 1) < 0.90 <= CDF(k)
        let table = [(1.0, 2), (2.0, 4), (3.0, 5), (5.0, 8), (10.0, 14)];
        for (lambda, k) in table {
            assert_eq!(k_at_percentile(lambda, 0.90, 1000), k, "lambda {lambda}");
        }
        assert_eq!(k_at_percentile(2.0, 0.50, 1000), 2);
        assert!((p_any_delay(1.0) - 0.632_120_558_8).abs() < 1e-9);
    }

    #[test]
    fn test_k_monotone_in_lambda() {
        let mut previous = 0;
        for step in 0..200 {
            let lambda = step as f64 * 0.1;
            let k = k_at_percentile(lambda, 0.90, 1000);
            assert!(k >= previous, "lambda {lambda}: {k} < {previous}");
            previous = k;
        }
    }

    #[test]
    fn test_degenerate_lambda() {
        assert_eq!(k_at_percentile(0.0, 0.90, 1000), 0);
        assert_eq!(k_at_percentile(f64::NAN, 0.90, 1000), 0);
        assert_eq!(p_any_delay(0.0), 0.0);
    }

    #[test]
    fn test_scan_is_bounded() {
        assert_eq!(k_at_percentile(500.0, 0.90, 10), 10);
    }

    #[test]
    fn test_p_any_delay() {
        assert!((p_any_delay(1.0) - 0.6321).abs() < 1e-4);
    }

    #[test]
    fn test_expected_delays_weekend_rescaled() {
        let config = StatsConfig::default();
        assert_eq!(expected_delays(30, 10, RushHourBucket::Morning, &config), 3.0);

        let weekend = expected_delays(38, 2, RushHourBucket::Weekend, &config);
        assert!((weekend - 5.0).abs() < 1e-9);

        assert_eq!(expected_delays(5, 0, RushHourBucket::Evening, &config), 0.0);
    }
}
