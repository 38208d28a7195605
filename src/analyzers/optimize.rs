//! What-if optimization over a fleet snapshot.
//!
//! Each registered algorithm applies a deterministic transformation to a copy
//! of the fleet, which is then re-scored with the same benchmark. Results of
//! one algorithm are therefore comparable across runs.

use crate::analyzers::benchmark::Benchmark;
use crate::analyzers::scoring::{fleet_average, score_fleet};
use crate::analyzers::types::PerformanceInsight;
use crate::analyzers::utility::mean;
use crate::stats::Scorecard;
use crate::telemetry::{BusRecord, BusStatus, MaintenanceWindow, ServiceDate};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Days until the next service after a simulated catch-up service.
const SERVICE_INTERVAL_DAYS: i64 = 90;

/// Share of the gap to target closed by the coaching and schedule algorithms.
const GAP_CLOSURE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmId {
    /// Moves below-target fuel efficiency halfway to target.
    FuelEfficiency,
    /// Moves below-target on-time performance halfway to target.
    OnTimeRecovery,
    /// Services every overdue bus and returns buses in maintenance to service.
    MaintenanceCatchUp,
    /// All of the above.
    Balanced,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 4] = [
        AlgorithmId::FuelEfficiency,
        AlgorithmId::OnTimeRecovery,
        AlgorithmId::MaintenanceCatchUp,
        AlgorithmId::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmId::FuelEfficiency => "fuel-efficiency",
            AlgorithmId::OnTimeRecovery => "on-time-recovery",
            AlgorithmId::MaintenanceCatchUp => "maintenance-catch-up",
            AlgorithmId::Balanced => "balanced",
        }
    }

    fn steps(&self) -> &'static [AlgorithmId] {
        match self {
            AlgorithmId::Balanced => &[
                AlgorithmId::FuelEfficiency,
                AlgorithmId::OnTimeRecovery,
                AlgorithmId::MaintenanceCatchUp,
            ],
            AlgorithmId::FuelEfficiency => &[AlgorithmId::FuelEfficiency],
            AlgorithmId::OnTimeRecovery => &[AlgorithmId::OnTimeRecovery],
            AlgorithmId::MaintenanceCatchUp => &[AlgorithmId::MaintenanceCatchUp],
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown optimization algorithm `{0}` (expected one of: fuel-efficiency, on-time-recovery, maintenance-catch-up, balanced)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for AlgorithmId {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmId::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Fleet-average change per metric (after minus before).
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ScoreDeltas {
    pub overall: f64,
    pub efficiency: f64,
    pub reliability: f64,
    pub safety: f64,
    pub customer_satisfaction: f64,
    pub utilization_pct: f64,
    pub maintenance_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub algorithm: AlgorithmId,
    /// Fleet-average `overall` at call time.
    pub before_score: f64,
    pub after_score: f64,
    pub deltas: ScoreDeltas,
    pub actions: Vec<String>,
}

/// Simulates `algorithm` on a copy of the fleet. An empty fleet yields zero
/// scores and no actions.
pub fn simulate(
    fleet: &[BusRecord],
    benchmark: &Benchmark,
    algorithm: AlgorithmId,
    now: DateTime<Utc>,
) -> OptimizationResult {
    let before = score_fleet(fleet, benchmark);

    let mut optimized = fleet.to_vec();
    let mut actions = Vec::new();
    for step in algorithm.steps() {
        if let Some(action) = apply(*step, &mut optimized, benchmark, now) {
            actions.push(action);
        }
    }

    let after = score_fleet(&optimized, benchmark);

    let before_score = fleet_average(before.values()).unwrap_or(0.0);
    let after_score = fleet_average(after.values()).unwrap_or(0.0);

    let deltas = ScoreDeltas {
        overall: after_score - before_score,
        efficiency: avg_of(&after, |i| i.efficiency) - avg_of(&before, |i| i.efficiency),
        reliability: avg_of(&after, |i| i.reliability) - avg_of(&before, |i| i.reliability),
        safety: avg_of(&after, |i| i.safety) - avg_of(&before, |i| i.safety),
        customer_satisfaction: avg_of(&after, |i| i.customer_satisfaction)
            - avg_of(&before, |i| i.customer_satisfaction),
        utilization_pct: Scorecard::from_fleet(&optimized, benchmark).utilization_pct
            - Scorecard::from_fleet(fleet, benchmark).utilization_pct,
        maintenance_overdue: overdue(&optimized, now) as i64 - overdue(fleet, now) as i64,
    };

    info!(
        algorithm = %algorithm,
        buses = fleet.len(),
        before_score,
        after_score,
        actions = actions.len(),
        "Optimization simulated"
    );

    OptimizationResult {
        algorithm,
        before_score,
        after_score,
        deltas,
        actions,
    }
}

fn apply(
    step: AlgorithmId,
    fleet: &mut [BusRecord],
    benchmark: &Benchmark,
    now: DateTime<Utc>,
) -> Option<String> {
    match step {
        AlgorithmId::FuelEfficiency => {
            let target = benchmark.target_fuel_efficiency;
            let n = close_gap(fleet, target, |b| &mut b.fuel.efficiency_kmpl);
            (n > 0).then(|| format!("Coach drivers and inspect {n} buses below {target} km/l"))
        }
        AlgorithmId::OnTimeRecovery => {
            let target = benchmark.target_on_time_pct;
            let n = close_gap(fleet, target, |b| &mut b.operations.on_time_pct);
            (n > 0).then(|| format!("Rebalance schedules for {n} buses below {target}% on-time"))
        }
        AlgorithmId::MaintenanceCatchUp => {
            let mut serviced = 0;
            for bus in fleet.iter_mut() {
                let overdue = bus.maintenance_window(now) == MaintenanceWindow::Overdue;
                if overdue || bus.status == BusStatus::Maintenance {
                    bus.maintenance.next_service =
                        ServiceDate::Valid(now + Duration::days(SERVICE_INTERVAL_DAYS));
                    if bus.status == BusStatus::Maintenance {
                        bus.status = BusStatus::Active;
                    }
                    serviced += 1;
                }
            }
            (serviced > 0).then(|| format!("Schedule preventive maintenance for {serviced} buses"))
        }
        AlgorithmId::Balanced => None,
    }
}

fn close_gap(fleet: &mut [BusRecord], target: f64, field: impl Fn(&mut BusRecord) -> &mut f64) -> usize {
    let mut changed = 0;
    for bus in fleet.iter_mut() {
        let value = field(bus);
        if *value < target {
            *value += (target - *value) * GAP_CLOSURE;
            changed += 1;
        }
    }
    changed
}

fn avg_of(insights: &HashMap<String, PerformanceInsight>, metric: impl Fn(&PerformanceInsight) -> u8) -> f64 {
    let values: Vec<f64> = insights.values().map(|i| metric(i) as f64).collect();
    mean(&values)
}

fn overdue(fleet: &[BusRecord], now: DateTime<Utc>) -> usize {
    fleet
        .iter()
        .filter(|b| b.maintenance_window(now) == MaintenanceWindow::Overdue)
        .count()
}
