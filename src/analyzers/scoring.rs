use crate::analyzers::benchmark::{Benchmark, weight};
use crate::analyzers::types::PerformanceInsight;
use crate::analyzers::utility::{mean, ratio_score, to_score};
use crate::telemetry::BusRecord;
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

/// Scores one normalized bus against a benchmark.
///
/// Each sub-score is `min(100, round(100 * actual / target))`:
///
/// | Sub-score             | Actual                         | Target                   |
/// |-----------------------|--------------------------------|--------------------------|
/// | efficiency            | fuel efficiency (km/l)         | `target_fuel_efficiency` |
/// | reliability           | on-time performance (%)        | `target_on_time_pct`     |
/// | safety                | `100 - 10 * safety incidents`  | `target_safety_index`    |
/// | customer_satisfaction | passenger rating (0-5)         | `target_satisfaction`    |
///
/// `overall` is the [`WEIGHTS`](crate::analyzers::benchmark::WEIGHTS)-weighted
/// sum, rounded and clamped. Apart from `last_calculated` the result depends
/// only on the inputs.
pub fn score(record: &BusRecord, benchmark: &Benchmark) -> PerformanceInsight {
    let efficiency = ratio_score(record.fuel.efficiency_kmpl, benchmark.target_fuel_efficiency);
    let reliability = ratio_score(record.operations.on_time_pct, benchmark.target_on_time_pct);
    let safety = ratio_score(record.safety_index(), benchmark.target_safety_index);
    let customer_satisfaction = ratio_score(
        record.operations.passenger_rating,
        benchmark.target_satisfaction,
    );

    let weighted = efficiency as f64 * weight("efficiency")
        + reliability as f64 * weight("reliability")
        + safety as f64 * weight("safety")
        + customer_satisfaction as f64 * weight("customer_satisfaction");

    let insight = PerformanceInsight {
        overall: to_score(weighted),
        efficiency,
        reliability,
        safety,
        customer_satisfaction,
        last_calculated: Utc::now(),
    };

    debug!(
        bus_id = %record.id,
        overall = insight.overall,
        efficiency,
        reliability,
        safety,
        customer_satisfaction,
        "Bus scored"
    );

    insight
}

/// Scores every bus in the fleet, keyed by bus id.
pub fn score_fleet(fleet: &[BusRecord], benchmark: &Benchmark) -> HashMap<String, PerformanceInsight> {
    fleet
        .iter()
        .map(|bus| (bus.id.clone(), score(bus, benchmark)))
        .collect()
}

/// Mean `overall` score across the given insights, or `None` when empty.
pub fn fleet_average<'a>(insights: impl IntoIterator<Item = &'a PerformanceInsight>) -> Option<f64> {
    let overall: Vec<f64> = insights.into_iter().map(|i| i.overall as f64).collect();
    if overall.is_empty() {
        None
    } else {
        Some(mean(&overall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::telemetry::fixtures::bus;
    use serde_json::json;

    #[test]
    fn test_on_target_bus_scores_100() {
        let insight = score(&bus("b1"), &Benchmark::default());

        assert_eq!(insight.efficiency, 100);
        assert_eq!(insight.reliability, 100);
        assert_eq!(insight.safety, 100);
        assert_eq!(insight.customer_satisfaction, 100);
        assert_eq!(insight.overall, 100);
    }

    #[test]
    fn test_sub_scores_scale_against_targets() {
        let mut b = bus("b1");
        b.fuel.efficiency_kmpl = 12.8;
        b.operations.on_time_pct = 92.0;
        b.operations.passenger_rating = 4.2;
        b.operations.safety_incidents = 2;

        let insight = score(&b, &Benchmark::default());

        assert_eq!(insight.efficiency, 85);
        assert_eq!(insight.reliability, 97);
        assert_eq!(insight.safety, 80);
        assert_eq!(insight.customer_satisfaction, 93);
        // 0.25 * (85 + 97 + 80 + 93) = 88.75
        assert_eq!(insight.overall, 89);
    }

    #[test]
    fn test_score_is_deterministic() {
        let mut b = bus("b1");
        b.fuel.efficiency_kmpl = 9.3;
        b.operations.on_time_pct = 61.0;
        let benchmark = Benchmark::default();

        let first = score(&b, &benchmark);
        for _ in 0..10 {
            assert!(score(&b, &benchmark).scores_eq(&first));
        }
    }

    #[test]
    fn test_out_of_range_inputs_still_bounded() {
        let raw = json!({
            "id": "hot",
            "fuel": { "currentLevel": 120, "averageConsumption": 120 },
            "operations": { "onTimePerformance": 120, "passengerRating": 120, "safetyIncidents": -120 },
            "insights": { "performanceScore": 120 }
        });
        let insight = score(&normalize(&raw).unwrap(), &Benchmark::default());

        assert!(insight.overall <= 100);
        assert!(insight.efficiency <= 100);
        assert!(insight.customer_satisfaction <= 100);
    }

    #[test]
    fn test_zero_targets_do_not_divide() {
        let benchmark = Benchmark {
            target_fuel_efficiency: 0.0,
            target_on_time_pct: 0.0,
            target_satisfaction: 0.0,
            target_safety_index: 0.0,
            ..Benchmark::default()
        };
        let mut b = bus("b1");
        b.fuel.efficiency_kmpl = 0.0;

        let insight = score(&b, &benchmark);
        assert_eq!(insight.efficiency, 100);
        assert_eq!(insight.overall, 100);
    }

    #[test]
    fn test_empty_record_scores_low_but_valid() {
        let insight = score(&normalize(&json!({ "id": "x" })).unwrap(), &Benchmark::default());

        assert_eq!(insight.efficiency, 0);
        assert_eq!(insight.reliability, 0);
        assert_eq!(insight.safety, 100);
        assert_eq!(insight.customer_satisfaction, 0);
        assert_eq!(insight.overall, 25);
    }

    #[test]
    fn test_fleet_average() {
        let benchmark = Benchmark::default();
        let mut slow = bus("slow");
        slow.operations.on_time_pct = 0.0;
        let insights = score_fleet(&[bus("a"), slow], &benchmark);

        assert_eq!(insights.len(), 2);
        assert_eq!(fleet_average(insights.values()), Some(87.5));
        assert_eq!(fleet_average(Vec::<&PerformanceInsight>::new()), None);
    }
}
