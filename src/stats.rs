use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::analyzers::benchmark::Benchmark;
use crate::analyzers::grade::{Band, grade};
use crate::analyzers::types::PerformanceInsight;
use crate::analyzers::utility::{mean, ratio_score, stddev};
use crate::telemetry::{BusRecord, BusStatus, MaintenanceWindow};

const TOP_PERFORMERS: usize = 5;

/// Fleet-level utilization and maintenance downtime against the benchmark.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub utilization_pct: f64,
    pub downtime_pct: f64,
    pub utilization_score: u8,
    pub downtime_score: u8,
}

impl Scorecard {
    pub fn from_fleet(fleet: &[BusRecord], benchmark: &Benchmark) -> Self {
        let total = fleet.len();
        let active = count(fleet, |b| b.status == BusStatus::Active);
        let in_maintenance = count(fleet, |b| b.status == BusStatus::Maintenance);

        let utilization_pct = FleetStats::pct(active, total);
        let downtime_pct = FleetStats::pct(in_maintenance, total);

        Scorecard {
            utilization_pct,
            downtime_pct,
            utilization_score: ratio_score(utilization_pct, benchmark.target_utilization_pct),
            downtime_score: ratio_score(
                100.0 - downtime_pct,
                100.0 - benchmark.max_maintenance_downtime_pct,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPerformer {
    pub bus_id: String,
    pub bus_number: String,
    pub overall: u8,
    pub band: Band,
}

/// Per-bus row of the efficiency table, in fleet order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyRow {
    pub bus_id: String,
    pub bus_number: String,
    /// Computed `overall`; `None` when the bus has no insight yet.
    pub performance: Option<u8>,
    pub fuel_efficiency: f64,
    pub maintenance_score: f64,
}

impl EfficiencyRow {
    fn new(bus: &BusRecord, insight: Option<&PerformanceInsight>) -> Self {
        EfficiencyRow {
            bus_id: bus.id.clone(),
            bus_number: bus.bus_number.clone(),
            performance: insight.map(|i| i.overall),
            fuel_efficiency: bus.fuel.efficiency_kmpl,
            maintenance_score: bus.maintenance_score(),
        }
    }
}

/// Dashboard overview of one fleet snapshot.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FleetStats {
    pub generated_at: DateTime<Utc>,
    pub total_buses: usize,

    // status
    pub active: usize,
    pub in_maintenance: usize,
    pub suspended: usize,
    pub retired: usize,

    // performance
    pub avg_performance: f64,
    pub performance_stddev: f64,
    pub avg_reported_score: f64,
    pub top_performers: Vec<TopPerformer>,

    // fuel
    pub avg_fuel_level: f64,
    pub low_fuel: usize,

    // maintenance
    pub maintenance_due: usize,
    pub maintenance_upcoming: usize,
    pub emergencies: usize,
    pub avg_maintenance_score: f64,

    pub efficiency_table: Vec<EfficiencyRow>,
    pub scorecard: Scorecard,
}

impl FleetStats {
    pub fn from_fleet(
        fleet: &[BusRecord],
        insights: &HashMap<String, PerformanceInsight>,
        benchmark: &Benchmark,
        now: DateTime<Utc>,
    ) -> Self {
        let overall: Vec<f64> = fleet
            .iter()
            .filter_map(|b| insights.get(&b.id))
            .map(|i| i.overall as f64)
            .collect();
        let avg_performance = mean(&overall);

        let fuel: Vec<f64> = fleet.iter().map(|b| b.fuel.current_level).collect();
        let reported: Vec<f64> = fleet.iter().map(|b| b.reported_score).collect();
        let wear: Vec<f64> = fleet.iter().map(|b| b.maintenance_score()).collect();

        let mut ranked: Vec<(&BusRecord, &PerformanceInsight)> = fleet
            .iter()
            .filter_map(|b| insights.get(&b.id).map(|i| (b, i)))
            .collect();
        // Stable sort keeps fleet order among equal scores.
        ranked.sort_by(|a, b| b.1.overall.cmp(&a.1.overall));

        FleetStats {
            generated_at: now,
            total_buses: fleet.len(),
            active: count(fleet, |b| b.status == BusStatus::Active),
            in_maintenance: count(fleet, |b| b.status == BusStatus::Maintenance),
            suspended: count(fleet, |b| b.status == BusStatus::Suspended),
            retired: count(fleet, |b| b.status == BusStatus::Retired),
            avg_performance,
            performance_stddev: stddev(&overall, avg_performance),
            avg_reported_score: mean(&reported),
            top_performers: ranked
                .into_iter()
                .take(TOP_PERFORMERS)
                .map(|(b, i)| TopPerformer {
                    bus_id: b.id.clone(),
                    bus_number: b.bus_number.clone(),
                    overall: i.overall,
                    band: grade(i.overall),
                })
                .collect(),
            avg_fuel_level: mean(&fuel),
            low_fuel: count(fleet, |b| b.is_low_fuel()),
            maintenance_due: count(fleet, |b| b.maintenance_window(now) == MaintenanceWindow::Overdue),
            maintenance_upcoming: count(fleet, |b| {
                b.maintenance_window(now) == MaintenanceWindow::Upcoming
            }),
            emergencies: count(fleet, |b| b.is_emergency()),
            avg_maintenance_score: mean(&wear),
            efficiency_table: fleet
                .iter()
                .map(|b| EfficiencyRow::new(b, insights.get(&b.id)))
                .collect(),
            scorecard: Scorecard::from_fleet(fleet, benchmark),
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }
}

fn count(fleet: &[BusRecord], pred: impl Fn(&BusRecord) -> bool) -> usize {
    fleet.iter().filter(|b| pred(b)).count()
}
