//! Maps metric samples to traffic-light statuses using per-metric
//! three-zone threshold rules with explicit polarity.

use signal_core::{
    ClassifiedMetric, DataHealth, Direction, MetricSample, ThresholdBasis, ThresholdRule,
    TrafficLight,
};

/// Classify a sample against its rule. An unavailable sample (or one with
/// no value on the rule's basis) gets `status = None`: excluded, never
/// defaulted to a color.
pub fn classify(sample: MetricSample, rule: ThresholdRule) -> ClassifiedMetric {
    let status = status_for(&sample, &rule);
    ClassifiedMetric {
        sample,
        status,
        rule,
    }
}

fn status_for(sample: &MetricSample, rule: &ThresholdRule) -> Option<TrafficLight> {
    if sample.data_health == DataHealth::Unavailable {
        return None;
    }

    let reading = match rule.basis {
        ThresholdBasis::Percentile => sample.percentile_rank?,
        ThresholdBasis::Absolute => sample.value?,
    };

    Some(apply_rule(reading, rule))
}

/// Place a reading into its three-zone color. Also applied to aggregate
/// percentiles by the composite scorer.
pub fn apply_rule(reading: f64, rule: &ThresholdRule) -> TrafficLight {
    match rule.direction {
        Direction::HighIsBad => {
            if reading >= rule.danger_cut {
                TrafficLight::Red
            } else if reading >= rule.caution_cut {
                TrafficLight::Yellow
            } else {
                TrafficLight::Green
            }
        }
        Direction::HighIsGood => {
            if reading <= rule.danger_cut {
                TrafficLight::Red
            } else if reading <= rule.caution_cut {
                TrafficLight::Yellow
            } else {
                TrafficLight::Green
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::TrendDirection;

    fn sample(value: f64, percentile: f64, health: DataHealth) -> MetricSample {
        MetricSample {
            metric_id: "cape".to_string(),
            name: "Shiller CAPE".to_string(),
            unit: "ratio".to_string(),
            value: Some(value),
            percentile_rank: Some(percentile),
            trend: Some(TrendDirection::Flat),
            source_as_of: None,
            data_health: health,
        }
    }

    fn percentile_rule(caution: f64, danger: f64, direction: Direction) -> ThresholdRule {
        ThresholdRule {
            basis: ThresholdBasis::Percentile,
            direction,
            caution_cut: caution,
            danger_cut: danger,
        }
    }

    #[test]
    fn test_high_is_bad_zones() {
        let rule = percentile_rule(50.0, 90.0, Direction::HighIsBad);

        let green = classify(sample(20.0, 30.0, DataHealth::Fresh), rule);
        let yellow = classify(sample(25.0, 60.0, DataHealth::Fresh), rule);
        let red = classify(sample(38.0, 95.0, DataHealth::Fresh), rule);

        assert_eq!(green.status, Some(TrafficLight::Green));
        assert_eq!(yellow.status, Some(TrafficLight::Yellow));
        assert_eq!(red.status, Some(TrafficLight::Red));
    }

    #[test]
    fn test_high_is_good_mirrors_the_zones() {
        // Cuts oriented downward: at or below 10 is danger, at or below 40
        // is caution
        let rule = percentile_rule(40.0, 10.0, Direction::HighIsGood);

        assert_eq!(
            classify(sample(0.0, 5.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Red)
        );
        assert_eq!(
            classify(sample(0.0, 30.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Yellow)
        );
        assert_eq!(
            classify(sample(0.0, 80.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Green)
        );
    }

    #[test]
    fn test_absolute_basis_reads_the_raw_value() {
        let rule = ThresholdRule {
            basis: ThresholdBasis::Absolute,
            direction: Direction::HighIsBad,
            caution_cut: 20.0,
            danger_cut: 30.0,
        };

        assert_eq!(
            classify(sample(18.0, 99.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Green)
        );
        assert_eq!(
            classify(sample(31.0, 1.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Red)
        );
    }

    #[test]
    fn test_cut_boundaries_belong_to_the_worse_zone() {
        let rule = percentile_rule(50.0, 90.0, Direction::HighIsBad);

        assert_eq!(
            classify(sample(0.0, 50.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Yellow)
        );
        assert_eq!(
            classify(sample(0.0, 90.0, DataHealth::Fresh), rule).status,
            Some(TrafficLight::Red)
        );
    }

    #[test]
    fn test_unavailable_never_renders_as_a_color() {
        let rule = percentile_rule(50.0, 90.0, Direction::HighIsBad);

        let mut missing = sample(0.0, 0.0, DataHealth::Unavailable);
        missing.value = None;
        missing.percentile_rank = None;

        assert_eq!(classify(missing, rule).status, None);

        // Even a sample that somehow carries numbers is excluded once its
        // health says unavailable
        let poisoned = sample(20.0, 30.0, DataHealth::Unavailable);
        assert_eq!(classify(poisoned, rule).status, None);
    }

    #[test]
    fn test_missing_percentile_is_excluded_not_zeroed() {
        let rule = percentile_rule(50.0, 90.0, Direction::HighIsBad);
        let mut no_rank = sample(22.0, 0.0, DataHealth::Fresh);
        no_rank.percentile_rank = None;

        assert_eq!(classify(no_rank, rule).status, None);
    }

    #[test]
    fn test_stale_sample_still_classifies() {
        let rule = percentile_rule(50.0, 90.0, Direction::HighIsBad);
        let classified = classify(sample(38.0, 95.0, DataHealth::Stale), rule);

        assert_eq!(classified.status, Some(TrafficLight::Red));
        assert_eq!(classified.sample.data_health, DataHealth::Stale);
    }
}
