use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ThresholdRule;

/// Single observation in a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Raw series returned by a provider, tagged with the provider's own
/// observation time (not the time we fetched it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeries {
    pub points: Vec<SeriesPoint>,
    pub observed_at: DateTime<Utc>,
}

impl RawSeries {
    pub fn new(points: Vec<SeriesPoint>, observed_at: DateTime<Utc>) -> Self {
        Self { points, observed_at }
    }

    /// Closing values in chronological order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Semantic refresh cadence of a series. The category, not the source,
/// determines how long a cached value stays fresh: two providers feeding
/// the same category share the same cadence policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataCategory {
    /// Live prices (minutes-fresh)
    Intraday,
    /// Price-adjacent daily series
    Daily,
    /// Lower-frequency daily indicators (VIX, options activity)
    DailySlow,
    /// Monthly published figures (CAPE, margin debt)
    Monthly,
    /// Quarterly macro figures (GDP)
    Quarterly,
}

impl DataCategory {
    pub fn name(&self) -> &'static str {
        match self {
            DataCategory::Intraday => "intraday",
            DataCategory::Daily => "daily",
            DataCategory::DailySlow => "daily-slow",
            DataCategory::Monthly => "monthly",
            DataCategory::Quarterly => "quarterly",
        }
    }
}

/// Freshness of the data a value was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataHealth {
    /// Within the TTL window for its category
    Fresh,
    /// Past TTL but a prior payload exists; still scored, flagged for display
    Stale,
    /// No value was ever obtained; excluded from scoring
    Unavailable,
}

impl DataHealth {
    pub fn name(&self) -> &'static str {
        match self {
            DataHealth::Fresh => "fresh",
            DataHealth::Stale => "stale",
            DataHealth::Unavailable => "unavailable",
        }
    }
}

/// Direction of a series relative to its trailing moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

impl TrendDirection {
    pub fn name(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Falling => "falling",
            TrendDirection::Flat => "flat",
        }
    }
}

/// Traffic-light classification of a metric or composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficLight {
    Green,
    Yellow,
    Red,
}

impl TrafficLight {
    pub fn name(&self) -> &'static str {
        match self {
            TrafficLight::Green => "green",
            TrafficLight::Yellow => "yellow",
            TrafficLight::Red => "red",
        }
    }

    /// Matrix row/column index (Green=0, Yellow=1, Red=2)
    pub fn index(&self) -> usize {
        match self {
            TrafficLight::Green => 0,
            TrafficLight::Yellow => 1,
            TrafficLight::Red => 2,
        }
    }
}

/// Conceptual axis a metric contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lens {
    /// Slow fundamental (CAPE, P/E, Buffett indicator, ...)
    Valuation,
    /// Fast technical (price vs. moving averages)
    Trend,
}

impl Lens {
    pub fn name(&self) -> &'static str {
        match self {
            Lens::Valuation => "valuation",
            Lens::Trend => "trend",
        }
    }
}

/// Action recommendation from the (valuation, trend) matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Hold,
    Trim,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Buy => "Buy",
            Action::Hold => "Hold",
            Action::Trim => "Trim",
        }
    }
}

/// Normalized view of one metric, recomputed on every orchestration pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_id: String,
    pub name: String,
    pub unit: String,
    /// Latest observed value; None when the series was never obtained
    pub value: Option<f64>,
    /// 0-100 position within the metric's own historical distribution
    pub percentile_rank: Option<f64>,
    pub trend: Option<TrendDirection>,
    /// Observation time propagated from the cache entry this was derived from
    pub source_as_of: Option<DateTime<Utc>>,
    pub data_health: DataHealth,
}

impl MetricSample {
    /// Sample for a metric whose series was never obtained. Downstream
    /// stages must exclude it, never default it to a color or a zero.
    pub fn unavailable(metric_id: &str, name: &str, unit: &str) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            value: None,
            percentile_rank: None,
            trend: None,
            source_as_of: None,
            data_health: DataHealth::Unavailable,
        }
    }
}

/// A sample plus the traffic-light status and the rule that produced it.
/// Immutable once created for a given orchestration pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedMetric {
    pub sample: MetricSample,
    /// None means "excluded" (no data), never a defaulted color
    pub status: Option<TrafficLight>,
    pub rule: ThresholdRule,
}

/// Equal-weighted aggregate of one lens's classified metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub lens: Lens,
    /// Contributing metrics in configured order (display + tie-break order)
    pub metrics: Vec<ClassifiedMetric>,
    /// Mean of included percentiles; None when every metric was excluded
    pub percentile: Option<f64>,
    pub status: Option<TrafficLight>,
    /// How many metrics actually contributed to the aggregate
    pub included: usize,
}

impl CompositeScore {
    pub fn is_unavailable(&self) -> bool {
        self.percentile.is_none()
    }
}

/// Final output of one orchestration pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBundle {
    pub generated_at: DateTime<Utc>,
    /// All classified metrics in configured order
    pub metrics: Vec<ClassifiedMetric>,
    pub valuation: CompositeScore,
    pub trend: CompositeScore,
    pub action: Action,
}
