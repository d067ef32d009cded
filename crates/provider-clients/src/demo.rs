//! Deterministic synthetic series for keyless/offline operation. Shapes
//! follow the real indicators loosely (level + drift + cycle); the same
//! series id always produces the same data.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use signal_core::{ProviderError, RawSeries, SeriesPoint, SeriesProvider};

pub struct DemoProvider {
    points_per_series: usize,
}

impl DemoProvider {
    pub fn new() -> Self {
        Self {
            points_per_series: 365,
        }
    }

    pub fn with_length(mut self, points: usize) -> Self {
        self.points_per_series = points;
        self
    }
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_for(series_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    series_id.hash(&mut hasher);
    hasher.finish()
}

/// Bounded pseudo-noise in [-1, 1] derived from (seed, index)
fn noise(seed: u64, index: usize) -> f64 {
    let mut hasher = DefaultHasher::new();
    (seed, index).hash(&mut hasher);
    let bits = hasher.finish();
    (bits % 10_000) as f64 / 5_000.0 - 1.0
}

pub fn synthetic_series(series_id: &str, len: usize) -> Vec<SeriesPoint> {
    let seed = seed_for(series_id);
    let base = 50.0 + (seed % 200) as f64;
    let drift = ((seed >> 8) % 100) as f64 / 2_000.0; // up to 5% per 1000 steps
    let cycle_len = 60.0 + ((seed >> 16) % 120) as f64;

    let now = Utc::now();
    (0..len)
        .map(|i| {
            let t = i as f64;
            let cycle = (t / cycle_len * std::f64::consts::TAU).sin() * base * 0.08;
            let value = base * (1.0 + drift * t / 100.0) + cycle + noise(seed, i) * base * 0.02;
            SeriesPoint {
                timestamp: now - Duration::days((len - i) as i64),
                value,
            }
        })
        .collect()
}

#[async_trait]
impl SeriesProvider for DemoProvider {
    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        let points = synthetic_series(series_id, self.points_per_series);
        let observed_at = points.last().map(|p| p.timestamp).unwrap_or_else(Utc::now);
        Ok(RawSeries::new(points, observed_at))
    }

    fn name(&self) -> &str {
        "demo"
    }
}
