//! Threshold rules that turn a fleet snapshot into recommendations.
//!
//! Every rule is evaluated independently against the same snapshot; a rule
//! with no matching buses produces nothing. Output order is the rule order
//! below, never severity order.

use crate::analyzers::benchmark::Benchmark;
use crate::analyzers::scoring::fleet_average;
use crate::analyzers::types::{PerformanceInsight, Recommendation, RecommendationKind, Severity};
use crate::telemetry::{BusRecord, MaintenanceWindow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Fleet-average and per-bus `overall` floor for the performance rule.
pub const PERFORMANCE_FLOOR: f64 = 70.0;

const MAX_SAMPLE_IDS: usize = 3;

/// Evaluates all rules over one fleet snapshot.
///
/// `insights` must be a snapshot taken before this call; buses without an
/// entry are left out of the performance rule. The benchmark is accepted for
/// interface stability: the current rules use fixed thresholds.
pub fn recommend(
    fleet: &[BusRecord],
    insights: &HashMap<String, PerformanceInsight>,
    _benchmark: &Benchmark,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let low_fuel = matching(fleet, |b| b.is_low_fuel());
    push(
        &mut out,
        RecommendationKind::LowFuel,
        Severity::High,
        low_fuel,
        |n| format!("{n} buses have low fuel levels (<20%)"),
        "Schedule refueling for affected buses",
    );

    let overdue = matching(fleet, |b| b.maintenance_window(now) == MaintenanceWindow::Overdue);
    push(
        &mut out,
        RecommendationKind::MaintenanceOverdue,
        Severity::Critical,
        overdue,
        |n| format!("{n} buses have overdue maintenance"),
        "Immediately schedule maintenance for overdue buses",
    );

    let upcoming = matching(fleet, |b| b.maintenance_window(now) == MaintenanceWindow::Upcoming);
    push(
        &mut out,
        RecommendationKind::MaintenanceUpcoming,
        Severity::Medium,
        upcoming,
        |n| format!("{n} buses need maintenance within 7 days"),
        "Plan maintenance schedule for upcoming services",
    );

    let scored: Vec<&PerformanceInsight> = fleet.iter().filter_map(|b| insights.get(&b.id)).collect();
    if let Some(avg) = fleet_average(scored.iter().copied()) {
        if avg < PERFORMANCE_FLOOR {
            let below = matching(fleet, |b| {
                insights
                    .get(&b.id)
                    .is_some_and(|i| (i.overall as f64) < PERFORMANCE_FLOOR)
            });
            push(
                &mut out,
                RecommendationKind::PerformanceBelowTarget,
                Severity::Medium,
                below,
                |n| format!("Average fleet performance is {}%; {n} buses below 70%", avg.round()),
                "Review and optimize underperforming buses",
            );
        }
    }

    let emergencies = matching(fleet, |b| b.is_emergency());
    push(
        &mut out,
        RecommendationKind::EmergencyActive,
        Severity::Critical,
        emergencies,
        |n| format!("{n} buses report an active emergency or exceed 100 km/h"),
        "Contact drivers and dispatch assistance",
    );

    debug!(
        fleet = fleet.len(),
        recommendations = out.len(),
        "Recommendations evaluated"
    );

    out
}

fn matching(fleet: &[BusRecord], pred: impl Fn(&BusRecord) -> bool) -> Vec<&str> {
    fleet.iter().filter(|b| pred(b)).map(|b| b.id.as_str()).collect()
}

fn push(
    out: &mut Vec<Recommendation>,
    kind: RecommendationKind,
    severity: Severity,
    affected: Vec<&str>,
    title: impl Fn(usize) -> String,
    action: &str,
) {
    if affected.is_empty() {
        return;
    }

    out.push(Recommendation {
        id: kind.id(),
        kind,
        severity,
        affected_count: affected.len(),
        sample_ids: affected
            .iter()
            .take(MAX_SAMPLE_IDS)
            .map(|id| id.to_string())
            .collect(),
        title: title(affected.len()),
        action: action.to_string(),
    });
}
