use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Action, DataCategory, Lens, SignalError, TrafficLight};

/// Which number a threshold rule is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdBasis {
    /// The sample's percentile rank (0-100)
    Percentile,
    /// The sample's raw value (e.g. CAPE of 30, margin debt YoY of 10%)
    Absolute,
}

/// Polarity of a metric. Tagged variants rather than a boolean so the
/// classifier's zone logic is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// High readings are dangerous (CAPE, Buffett indicator, greed)
    HighIsBad,
    /// Low readings are dangerous (breadth, fear-side sentiment)
    HighIsGood,
}

/// Two cut points defining three zones on a metric's scale.
///
/// For `HighIsBad` the zones read upward: below `caution_cut` is Green,
/// `caution_cut..danger_cut` is Yellow, at or above `danger_cut` is Red.
/// For `HighIsGood` the scale is mirrored (`danger_cut < caution_cut`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub basis: ThresholdBasis,
    pub direction: Direction,
    pub caution_cut: f64,
    pub danger_cut: f64,
}

impl ThresholdRule {
    pub fn validate(&self) -> Result<(), SignalError> {
        match self.direction {
            Direction::HighIsBad if self.caution_cut >= self.danger_cut => {
                Err(SignalError::InvalidConfig(format!(
                    "HighIsBad rule needs caution_cut < danger_cut, got {} >= {}",
                    self.caution_cut, self.danger_cut
                )))
            }
            Direction::HighIsGood if self.danger_cut >= self.caution_cut => {
                Err(SignalError::InvalidConfig(format!(
                    "HighIsGood rule needs danger_cut < caution_cut, got {} >= {}",
                    self.danger_cut, self.caution_cut
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for ThresholdRule {
    /// Lens-independent default applied to composite percentiles:
    /// >= 75th percentile Red, >= 50th Yellow, else Green.
    fn default() -> Self {
        Self {
            basis: ThresholdBasis::Percentile,
            direction: Direction::HighIsBad,
            caution_cut: 50.0,
            danger_cut: 75.0,
        }
    }
}

/// Per-metric configuration supplied by the embedding application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Stable identifier, unique within the metric set
    pub id: String,
    /// Display name ("Shiller CAPE")
    pub name: String,
    pub unit: String,
    /// Provider adapter name this metric is fetched through
    pub provider: String,
    /// Series identifier passed to the provider
    pub series_id: String,
    pub lens: Lens,
    pub category: DataCategory,
    pub rule: ThresholdRule,
    /// Trailing window for percentile ranking; None = full available history
    pub lookback: Option<usize>,
    /// Moving-average window for trend detection
    pub trend_window: usize,
    /// Relative dead-band around the moving average before a trend registers
    pub trend_epsilon: f64,
}

impl MetricConfig {
    /// Cache key: provider + series. Metrics sharing a series share one
    /// fetch and one cache entry.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.provider, self.series_id)
    }
}

/// Fully enumerated 3x3 action matrix keyed by (valuation status, trend
/// status), plus the action taken when either lens is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMatrix {
    /// cells[valuation.index()][trend.index()]
    pub cells: [[Action; 3]; 3],
    /// Used when either composite has no status at all
    pub unavailable_action: Action,
}

impl ActionMatrix {
    /// Total lookup: every (valuation, trend) combination, including the
    /// unavailable cases, yields a defined action.
    pub fn action_for(
        &self,
        valuation: Option<TrafficLight>,
        trend: Option<TrafficLight>,
    ) -> Action {
        match (valuation, trend) {
            (Some(v), Some(t)) => self.cells[v.index()][t.index()],
            _ => self.unavailable_action,
        }
    }
}

impl Default for ActionMatrix {
    /// Valuation takes precedence when the lenses disagree by more than one
    /// level; the neutral-valuation row follows the trend tilt.
    fn default() -> Self {
        use Action::*;
        Self {
            // rows: valuation Green/Yellow/Red; cols: trend Green/Yellow/Red
            cells: [
                [Buy, Buy, Buy],
                [Buy, Hold, Trim],
                [Trim, Trim, Trim],
            ],
            unavailable_action: Hold,
        }
    }
}

/// Engine-level configuration for one orchestrator instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub metrics: Vec<MetricConfig>,
    pub action_matrix: ActionMatrix,
    /// Rule applied to each lens's aggregate percentile
    pub composite_rule: ThresholdRule,
    /// Upper bound on concurrent fetches per pass (provider rate limits)
    pub max_concurrent_fetches: usize,
    /// Per-fetch timeout; an overrun is a fetch failure, never left pending
    pub fetch_timeout_secs: u64,
}

impl EngineConfig {
    pub fn new(metrics: Vec<MetricConfig>) -> Self {
        Self {
            metrics,
            action_matrix: ActionMatrix::default(),
            composite_rule: ThresholdRule::default(),
            max_concurrent_fetches: 5,
            fetch_timeout_secs: 10,
        }
    }

    /// Malformed configuration is a programmer error: fatal, not degraded.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.metrics.is_empty() {
            return Err(SignalError::InvalidConfig(
                "metric set is empty".to_string(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(SignalError::InvalidConfig(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }

        let mut seen_ids: HashMap<&str, ()> = HashMap::new();
        let mut key_categories: HashMap<String, DataCategory> = HashMap::new();

        for metric in &self.metrics {
            if seen_ids.insert(&metric.id, ()).is_some() {
                return Err(SignalError::InvalidConfig(format!(
                    "duplicate metric id: {}",
                    metric.id
                )));
            }
            if metric.trend_window == 0 {
                return Err(SignalError::InvalidConfig(format!(
                    "metric {} has zero trend_window",
                    metric.id
                )));
            }
            metric.rule.validate()?;

            // Metrics sharing a cache key share a TTL; a category mismatch
            // would make the refresh cadence ambiguous.
            let key = metric.cache_key();
            if let Some(existing) = key_categories.get(&key) {
                if *existing != metric.category {
                    return Err(SignalError::InvalidConfig(format!(
                        "cache key {} declared with categories {} and {}",
                        key,
                        existing.name(),
                        metric.category.name()
                    )));
                }
            } else {
                key_categories.insert(key, metric.category);
            }
        }

        self.composite_rule.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(id: &str) -> MetricConfig {
        MetricConfig {
            id: id.to_string(),
            name: id.to_string(),
            unit: "x".to_string(),
            provider: "demo".to_string(),
            series_id: id.to_string(),
            lens: Lens::Valuation,
            category: DataCategory::Daily,
            rule: ThresholdRule::default(),
            lookback: None,
            trend_window: 10,
            trend_epsilon: 0.001,
        }
    }

    #[test]
    fn test_action_matrix_is_total() {
        let matrix = ActionMatrix::default();
        let statuses = [
            None,
            Some(TrafficLight::Green),
            Some(TrafficLight::Yellow),
            Some(TrafficLight::Red),
        ];

        for v in statuses {
            for t in statuses {
                // Every combination resolves without panicking
                let _ = matrix.action_for(v, t);
            }
        }
    }

    #[test]
    fn test_valuation_precedence_in_default_matrix() {
        let matrix = ActionMatrix::default();

        // Valuation Red + trend Green -> Trim, not Hold
        assert_eq!(
            matrix.action_for(Some(TrafficLight::Red), Some(TrafficLight::Green)),
            Action::Trim
        );
        assert_eq!(
            matrix.action_for(Some(TrafficLight::Green), Some(TrafficLight::Red)),
            Action::Buy
        );
    }

    #[test]
    fn test_unavailable_lens_uses_fallback_action() {
        let matrix = ActionMatrix::default();
        assert_eq!(matrix.action_for(None, Some(TrafficLight::Green)), Action::Hold);
        assert_eq!(matrix.action_for(Some(TrafficLight::Red), None), Action::Hold);
        assert_eq!(matrix.action_for(None, None), Action::Hold);
    }

    #[test]
    fn test_duplicate_metric_id_rejected() {
        let config = EngineConfig::new(vec![metric("cape"), metric("cape")]);
        assert!(matches!(
            config.validate(),
            Err(SignalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_category_conflict_on_shared_key_rejected() {
        let mut a = metric("pe");
        let mut b = metric("pe_slow");
        a.series_id = "^GSPC".to_string();
        b.series_id = "^GSPC".to_string();
        b.category = DataCategory::Monthly;

        let config = EngineConfig::new(vec![a, b]);
        assert!(matches!(
            config.validate(),
            Err(SignalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_inverted_cuts_rejected() {
        let mut m = metric("cape");
        m.rule.caution_cut = 90.0;
        m.rule.danger_cut = 75.0;

        let config = EngineConfig::new(vec![m]);
        assert!(matches!(
            config.validate(),
            Err(SignalError::InvalidConfig(_))
        ));
    }
}
