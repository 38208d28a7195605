use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};

use fleet_insights::analyzers::benchmark::Benchmark;
use fleet_insights::analyzers::cache::CachePolicy;
use fleet_insights::analyzers::optimize::AlgorithmId;
use fleet_insights::analyzers::recommend::recommend;
use fleet_insights::analyzers::scoring::score_fleet;
use fleet_insights::analyzers::trend::{TrendSeries, synthesize};
use fleet_insights::analyzers::types::{RecommendationKind, Severity};
use fleet_insights::fetch::decode_envelope;
use fleet_insights::history::load_history;
use fleet_insights::normalize::normalize_fleet;
use fleet_insights::output::append_insights;
use fleet_insights::session::InsightSession;
use fleet_insights::telemetry::{BusRecord, BusStatus};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn fixture_fleet() -> Vec<BusRecord> {
    let bytes = include_bytes!("fixtures/fleet.json");
    let raw: Vec<Value> = decode_envelope("fixtures/fleet.json", bytes).expect("Failed to decode fixture");
    normalize_fleet(&raw)
}

fn session() -> InsightSession {
    InsightSession::open(Benchmark::default(), CachePolicy::default()).unwrap()
}

#[test]
fn test_full_pipeline() {
    let fleet = fixture_fleet();
    let ids: Vec<&str> = fleet.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["bus-1", "bus-2", "bus-3", "bus-4"]);
    assert_eq!(fleet[0].bus_number, "KL-07-A-1001");
    assert_eq!(fleet[3].status, BusStatus::Suspended);

    let session = session();
    let insights = session.get_fleet_insights(&fleet);

    let overall: Vec<u8> = ids.iter().map(|id| insights[*id].overall).collect();
    assert_eq!(overall, vec![89, 100, 100, 50]);

    let recs = session.get_recommendations(&fleet, now());
    let kinds: Vec<RecommendationKind> = recs.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecommendationKind::LowFuel,
            RecommendationKind::MaintenanceOverdue,
            RecommendationKind::MaintenanceUpcoming,
            RecommendationKind::EmergencyActive,
        ]
    );
    assert_eq!(recs[0].sample_ids, vec!["bus-1"]);
    assert_eq!(recs[0].severity, Severity::High);
    assert_eq!(recs[1].sample_ids, vec!["bus-1"]);
    assert_eq!(recs[2].sample_ids, vec!["bus-2"]);
    assert_eq!(recs[3].affected_count, 2);
    assert_eq!(recs[3].sample_ids, vec!["bus-3", "bus-4"]);

    let stats = session.fleet_stats(&fleet, now());
    assert_eq!(stats.total_buses, 4);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.in_maintenance, 1);
    assert_eq!(stats.suspended, 1);
    assert_eq!(stats.low_fuel, 1);
    assert_eq!(stats.maintenance_due, 1);
    assert_eq!(stats.emergencies, 2);
    assert_eq!(stats.avg_performance, 84.75);
    assert_eq!(stats.scorecard.utilization_pct, 50.0);
    assert_eq!(stats.efficiency_table.len(), 4);
    assert_eq!(stats.efficiency_table[0].performance, Some(89));
    assert_eq!(stats.efficiency_table[1].maintenance_score, 50.0);

    session.close();
}

#[test]
fn test_low_fuel_counts_only_buses_below_threshold() {
    let raw: Vec<Value> = [10, 50, 90]
        .iter()
        .enumerate()
        .map(|(i, fuel)| json!({ "_id": format!("b{i}"), "status": "active", "fuel": { "currentLevel": fuel } }))
        .collect();
    let fleet = normalize_fleet(&raw);
    let insights = score_fleet(&fleet, &Benchmark::default());

    let recs = recommend(&fleet, &insights, &Benchmark::default(), now());
    let low_fuel = recs
        .iter()
        .find(|r| r.kind == RecommendationKind::LowFuel)
        .unwrap();
    assert_eq!(low_fuel.affected_count, 1);
    assert_eq!(low_fuel.sample_ids, vec!["b0"]);
}

#[test]
fn test_out_of_range_inputs_stay_within_bounds() {
    let raw = vec![json!({
        "_id": "hot",
        "status": "active",
        "fuel": { "currentLevel": 120, "averageConsumption": 120 },
        "operations": { "onTimePerformance": 120, "passengerRating": 120, "safetyIncidents": -3 }
    })];
    let fleet = normalize_fleet(&raw);
    let insights = score_fleet(&fleet, &Benchmark::default());

    let insight = &insights["hot"];
    assert_eq!(insight.overall, 100);
    for sub in [insight.efficiency, insight.reliability, insight.safety, insight.customer_satisfaction] {
        assert!(sub <= 100);
    }
}

#[test]
fn test_empty_fleet() {
    let fleet = normalize_fleet(&[]);
    let session = session();

    assert!(session.get_fleet_insights(&fleet).is_empty());
    assert!(session.get_recommendations(&fleet, now()).is_empty());

    let stats = session.fleet_stats(&fleet, now());
    assert_eq!(stats.total_buses, 0);
    assert_eq!(stats.avg_performance, 0.0);

    let result = session.run_optimization(&fleet, AlgorithmId::Balanced, now());
    assert_eq!(result.before_score, 0.0);
    assert!(result.actions.is_empty());
}

#[test]
fn test_maintenance_catch_up_on_fixture() {
    let fleet = fixture_fleet();
    let session = session();

    let result = session.run_optimization(&fleet, AlgorithmId::MaintenanceCatchUp, now());

    assert_eq!(result.before_score, 84.75);
    assert_eq!(result.after_score, result.before_score);
    assert_eq!(result.deltas.maintenance_overdue, -1);
    assert_eq!(result.deltas.utilization_pct, 25.0);
    assert_eq!(result.actions, vec!["Schedule preventive maintenance for 2 buses"]);

    // The input fleet is left untouched.
    assert_eq!(fleet[2].status, BusStatus::Maintenance);
}

#[test]
fn test_trend_from_local_history() {
    let path = format!("{}/fleet_insights_it_history.csv", std::env::temp_dir().display());
    let _ = std::fs::remove_file(&path);

    let fleet = fixture_fleet();
    let insights = score_fleet(&fleet, &Benchmark::default());
    let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let two_days_ago = today.checked_sub_days(Days::new(2)).unwrap();

    append_insights(&path, &fleet, &insights, two_days_ago).unwrap();
    append_insights(&path, &fleet, &insights, today).unwrap();

    let history = load_history(&path, "bus-1").unwrap();
    assert_eq!(history.len(), 2);

    let series = synthesize(&history, 7, today);
    let points = series.points();
    assert_eq!(points.len(), 7);
    assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
    assert_eq!(points[4].performance, Some(89.0));
    assert_eq!(points[5].performance, None);
    assert_eq!(points[6].performance, Some(89.0));

    let unknown = synthesize(&load_history(&path, "bus-404").unwrap(), 7, today);
    assert_eq!(unknown, TrendSeries::Unavailable { window_days: 7 });

    std::fs::remove_file(&path).unwrap();
}
