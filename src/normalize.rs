//! Telemetry normalizer: the only place where defaults for raw bus fields are
//! decided.
//!
//! Raw fleet listings come from the backend as loosely-typed JSON. Fields may
//! be missing, `null`, numeric strings, or plainly the wrong type. None of that
//! is an error here: percentages are clamped, counters floored at zero, and
//! unparseable dates become [`ServiceDate::Invalid`].

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::telemetry::{
    BusRecord, BusStatus, Fuel, Location, Maintenance, Operations, ServiceDate,
};

/// Normalizes one raw bus object.
///
/// Returns `None` only when the object carries no usable identifier
/// (`_id` or `id`); every other defect is absorbed.
pub fn normalize(raw: &Value) -> Option<BusRecord> {
    let id = id_of(raw)?;

    Some(BusRecord {
        bus_number: raw
            .get("busNumber")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        status: BusStatus::parse(raw.get("status").and_then(Value::as_str)),
        fuel: Fuel {
            current_level: percent(at(raw, &["fuel", "currentLevel"])),
            efficiency_kmpl: non_negative(
                at(raw, &["fuel", "averageConsumption"]).or_else(|| at(raw, &["fuel", "efficiency"])),
            ),
        },
        maintenance: Maintenance {
            next_service: date(at(raw, &["maintenance", "nextService"])),
            total_distance: non_negative(at(raw, &["maintenance", "totalDistance"])),
        },
        operations: Operations {
            on_time_pct: percent(at(raw, &["operations", "onTimePerformance"])),
            passenger_rating: clamp(number(at(raw, &["operations", "passengerRating"])), 5.0),
            safety_incidents: non_negative(at(raw, &["operations", "safetyIncidents"])).floor()
                as u32,
        },
        location: Location {
            speed: non_negative(at(raw, &["currentLocation", "speed"])),
            emergency_active: flag(at(raw, &["currentLocation", "emergencySystem"])),
        },
        reported_score: percent(at(raw, &["insights", "performanceScore"])),
        id,
    })
}

/// Normalizes a fleet listing, keeping input order.
///
/// Records without an identifier and later duplicates of an identifier are
/// skipped with a warning.
pub fn normalize_fleet(raw: &[Value]) -> Vec<BusRecord> {
    let mut seen = HashSet::new();
    let mut fleet = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        let Some(record) = normalize(item) else {
            warn!(index, "Skipping bus record without an identifier");
            continue;
        };

        if !seen.insert(record.id.clone()) {
            warn!(bus_id = %record.id, index, "Skipping duplicate bus record");
            continue;
        }

        fleet.push(record);
    }

    debug!(raw = raw.len(), kept = fleet.len(), "Fleet normalized");
    fleet
}

/// First usable identifier among `_id` and `id`.
fn id_of(raw: &Value) -> Option<String> {
    ["_id", "id"].iter().find_map(|key| raw.get(*key).and_then(usable_id))
}

/// Strings, numbers and `{"$oid": "..."}` objects; blank ids are unusable.
fn usable_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(obj) => return obj.get("$oid").and_then(usable_id),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |v, key| v.get(key))
}

/// Reads a finite number from a JSON number or numeric string.
fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn clamp(v: f64, max: f64) -> f64 {
    v.clamp(0.0, max)
}

fn percent(value: Option<&Value>) -> f64 {
    clamp(number(value), 100.0)
}

fn non_negative(value: Option<&Value>) -> f64 {
    number(value).max(0.0)
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("active") || s.eq_ignore_ascii_case("true"),
        Some(obj @ Value::Object(_)) => flag(obj.get("active")),
        _ => false,
    }
}

/// Parses RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn date(value: Option<&Value>) -> ServiceDate {
    match value {
        None | Some(Value::Null) => ServiceDate::Absent,
        Some(Value::String(s)) => parse_date(s.trim()).map_or(ServiceDate::Invalid, ServiceDate::Valid),
        Some(_) => ServiceDate::Invalid,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
