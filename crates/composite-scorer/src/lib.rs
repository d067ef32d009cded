//! Aggregates one lens's classified metrics into an equal-weighted
//! composite percentile, an aggregate traffic light, and (together with the
//! other lens) an action recommendation.

use signal_core::{Action, ActionMatrix, ClassifiedMetric, CompositeScore, Lens, ThresholdRule};
use threshold_classifier::apply_rule;

/// Score one lens. Metrics with `status = None` or no percentile are
/// excluded from the aggregate; when every metric is excluded the composite
/// is itself unavailable, never a synthetic 0 or 100.
pub fn score(lens: Lens, metrics: Vec<ClassifiedMetric>, rule: &ThresholdRule) -> CompositeScore {
    let included: Vec<f64> = metrics
        .iter()
        .filter(|m| m.status.is_some())
        .filter_map(|m| m.sample.percentile_rank)
        .collect();

    let percentile = if included.is_empty() {
        None
    } else {
        // Equal weighting: no metric is privileged regardless of category
        Some(included.iter().sum::<f64>() / included.len() as f64)
    };

    CompositeScore {
        lens,
        percentile,
        status: percentile.map(|p| apply_rule(p, rule)),
        included: included.len(),
        metrics,
    }
}

/// Resolve the action recommendation for a (valuation, trend) composite
/// pair through the configured matrix. Total: unavailable composites route
/// to the matrix's fallback action.
pub fn recommend_action(
    valuation: &CompositeScore,
    trend: &CompositeScore,
    matrix: &ActionMatrix,
) -> Action {
    matrix.action_for(valuation.status, trend.status)
}
