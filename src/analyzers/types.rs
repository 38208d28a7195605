//! Data types shared by the analytics pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Derived scores for one bus. All scores are integers in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceInsight {
    pub overall: u8,
    pub efficiency: u8,
    pub reliability: u8,
    pub safety: u8,
    pub customer_satisfaction: u8,
    pub last_calculated: DateTime<Utc>,
}

impl PerformanceInsight {
    /// Compares the scores only, ignoring `last_calculated`.
    pub fn scores_eq(&self, other: &Self) -> bool {
        self.overall == other.overall
            && self.efficiency == other.efficiency
            && self.reliability == other.reliability
            && self.safety == other.safety
            && self.customer_satisfaction == other.customer_satisfaction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    LowFuel,
    MaintenanceOverdue,
    MaintenanceUpcoming,
    PerformanceBelowTarget,
    EmergencyActive,
}

impl RecommendationKind {
    /// Stable identifier; depends on the kind only.
    pub fn id(&self) -> &'static str {
        match self {
            RecommendationKind::LowFuel => "low-fuel",
            RecommendationKind::MaintenanceOverdue => "maintenance-overdue",
            RecommendationKind::MaintenanceUpcoming => "maintenance-upcoming",
            RecommendationKind::PerformanceBelowTarget => "performance-below-target",
            RecommendationKind::EmergencyActive => "emergency-active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A fleet-wide, rule-triggered alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub affected_count: usize,
    /// Up to three affected bus ids, in fleet order.
    pub sample_ids: Vec<String>,
    pub title: String,
    pub action: String,
}

/// One day of historical metrics for a bus, as served by the backend or
/// loaded from the local insight history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    #[serde(deserialize_with = "day_or_timestamp")]
    pub date: NaiveDate,
    #[serde(default)]
    pub performance: f64,
    #[serde(default)]
    pub efficiency: f64,
    #[serde(default)]
    pub reliability: f64,
    #[serde(default)]
    pub safety: f64,
    #[serde(default)]
    pub utilization: Option<f64>,
}

/// Where a bus stands against the rest of the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetComparison {
    pub fleet_average: f64,
    #[serde(default)]
    pub top_performer: Option<String>,
    #[serde(default)]
    pub rank: Option<u32>,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (reduced to its UTC date).
fn day_or_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(day) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(serde::de::Error::custom)
}
