//! Canonical per-bus records.
//!
//! Values of these types are only ever built by [`crate::normalize`], so every
//! percentage lies in `[0, 100]` and every counter or distance is finite and
//! non-negative. Downstream code reads fields directly without re-checking.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Fuel level (percent) strictly below which a bus counts as low on fuel.
pub const LOW_FUEL_THRESHOLD: f64 = 20.0;

/// Speed (km/h) above which a bus is treated as an emergency.
pub const OVERSPEED_KMH: f64 = 100.0;

/// How far ahead a service date counts as "upcoming".
pub const UPCOMING_SERVICE_DAYS: i64 = 7;

/// Distance (km) that costs 10 points of maintenance score.
pub const KM_PER_WEAR_STEP: f64 = 100_000.0;

/// Maintenance score for a bus with no distance on file.
pub const UNKNOWN_MAINTENANCE_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    Active,
    Maintenance,
    Suspended,
    Retired,
}

impl BusStatus {
    /// Parses a status string case-insensitively. Unknown values map to
    /// [`BusStatus::Suspended`] so they are never counted as in service.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("active") => BusStatus::Active,
            Some("maintenance") => BusStatus::Maintenance,
            Some("retired") => BusStatus::Retired,
            _ => BusStatus::Suspended,
        }
    }
}

/// A date field that feeds threshold logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ServiceDate {
    Valid(DateTime<Utc>),
    /// Present in the source record but unparseable.
    Invalid,
    Absent,
}

impl ServiceDate {
    pub fn has_valid_date(&self) -> bool {
        matches!(self, ServiceDate::Valid(_))
    }

    pub fn value(&self) -> Option<DateTime<Utc>> {
        match self {
            ServiceDate::Valid(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// Where a bus's next service falls relative to a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceWindow {
    /// `next_service <= now`
    Overdue,
    /// `now < next_service <= now + 7 days`
    Upcoming,
    Scheduled,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fuel {
    pub current_level: f64,
    pub efficiency_kmpl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Maintenance {
    pub next_service: ServiceDate,
    /// Odometer reading in km.
    pub total_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operations {
    pub on_time_pct: f64,
    /// Average passenger rating on a 0-5 scale.
    pub passenger_rating: f64,
    pub safety_incidents: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub speed: f64,
    pub emergency_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusRecord {
    pub id: String,
    pub bus_number: String,
    pub status: BusStatus,
    pub fuel: Fuel,
    pub maintenance: Maintenance,
    pub operations: Operations,
    pub location: Location,
    /// Score reported by the backend, clamped. Never used as a scoring input.
    pub reported_score: f64,
}

impl BusRecord {
    pub fn is_low_fuel(&self) -> bool {
        self.fuel.current_level < LOW_FUEL_THRESHOLD
    }

    pub fn is_emergency(&self) -> bool {
        self.location.emergency_active || self.location.speed > OVERSPEED_KMH
    }

    pub fn maintenance_window(&self, now: DateTime<Utc>) -> MaintenanceWindow {
        let Some(next) = self.maintenance.next_service.value() else {
            return MaintenanceWindow::Unknown;
        };

        if next <= now {
            MaintenanceWindow::Overdue
        } else if next <= now + Duration::days(UPCOMING_SERVICE_DAYS) {
            MaintenanceWindow::Upcoming
        } else {
            MaintenanceWindow::Scheduled
        }
    }

    /// Wear estimate from distance: 10 points per 100,000 km, floored at 0.
    /// Buses with no distance on file score [`UNKNOWN_MAINTENANCE_SCORE`].
    pub fn maintenance_score(&self) -> f64 {
        if self.maintenance.total_distance > 0.0 {
            (100.0 - self.maintenance.total_distance / KM_PER_WEAR_STEP * 10.0).max(0.0)
        } else {
            UNKNOWN_MAINTENANCE_SCORE
        }
    }

    /// `max(0, 100 - 10 * incidents)`
    pub fn safety_index(&self) -> f64 {
        (100.0 - 10.0 * self.operations.safety_incidents as f64).max(0.0)
    }
}
