//! Converts raw cached series into canonical metric samples: latest value,
//! historical percentile rank, trend direction, and propagated health.

use refresh_cache::CacheEntry;
use signal_core::{MetricConfig, MetricSample, TrendDirection};
use statrs::statistics::Statistics;

/// Midpoint percentile rank of `value` against the prior observations in
/// `history`: `100 * (below + 0.5 * equal) / total`. Ties count half, so a
/// duplicate lands at the average of its below/above ranks and a fresh
/// maximum ranks exactly 100.
pub fn percentile_rank(history: &[f64], value: f64) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let below = history.iter().filter(|x| **x < value).count() as f64;
    let equal = history.iter().filter(|x| **x == value).count() as f64;
    Some(100.0 * (below + 0.5 * equal) / history.len() as f64)
}

/// Trend of the latest value against the moving average of the `window`
/// observations before it, with a relative dead-band of `epsilon`.
pub fn detect_trend(values: &[f64], window: usize, epsilon: f64) -> Option<TrendDirection> {
    if window == 0 || values.len() < window + 1 {
        return None;
    }
    let latest = values[values.len() - 1];
    let prior = &values[values.len() - 1 - window..values.len() - 1];
    let average = prior.mean();

    let deviation = if average.abs() > f64::EPSILON {
        (latest - average) / average.abs()
    } else {
        latest - average
    };

    Some(if deviation > epsilon {
        TrendDirection::Rising
    } else if deviation < -epsilon {
        TrendDirection::Falling
    } else {
        TrendDirection::Flat
    })
}

/// Normalize a cache entry into a `MetricSample`.
///
/// Fails closed: an unavailable entry yields an unavailable sample with no
/// percentile, which downstream stages must exclude rather than score as
/// zero. A stale entry still normalizes from its old payload; only the
/// health flag downgrades.
pub fn normalize(entry: &CacheEntry, config: &MetricConfig) -> MetricSample {
    let payload = match &entry.payload {
        Some(payload) => payload,
        None => return MetricSample::unavailable(&config.id, &config.name, &config.unit),
    };

    let values = payload.values();
    let latest = match values.last() {
        Some(latest) => *latest,
        None => return MetricSample::unavailable(&config.id, &config.name, &config.unit),
    };

    let history = &values[..values.len() - 1];
    let window = match config.lookback {
        Some(lookback) if history.len() > lookback => &history[history.len() - lookback..],
        _ => history,
    };

    MetricSample {
        metric_id: config.id.clone(),
        name: config.name.clone(),
        unit: config.unit.clone(),
        value: Some(latest),
        percentile_rank: percentile_rank(window, latest),
        trend: detect_trend(&values, config.trend_window, config.trend_epsilon),
        source_as_of: Some(payload.observed_at),
        // payload exists, so health is Fresh or Stale here
        data_health: entry.health(),
    }
}
