//! Local insight history.
//!
//! Every scoring pass can append one [`InsightRow`] per bus to a CSV file (see
//! [`crate::output::append_record`]). Reading those rows back yields the daily
//! aggregates the trend synthesizer needs when the backend has no history.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::analyzers::types::{DailyAggregate, PerformanceInsight};
use crate::telemetry::{BusRecord, BusStatus};

/// One scored bus on one day, as persisted to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRow {
    pub date: NaiveDate,
    pub bus_id: String,
    pub bus_number: String,
    pub in_service: bool,
    pub overall: u8,
    pub efficiency: u8,
    pub reliability: u8,
    pub safety: u8,
    pub customer_satisfaction: u8,
}

impl InsightRow {
    pub fn new(bus: &BusRecord, insight: &PerformanceInsight, date: NaiveDate) -> Self {
        InsightRow {
            date,
            bus_id: bus.id.clone(),
            bus_number: bus.bus_number.clone(),
            in_service: bus.status == BusStatus::Active,
            overall: insight.overall,
            efficiency: insight.efficiency,
            reliability: insight.reliability,
            safety: insight.safety,
            customer_satisfaction: insight.customer_satisfaction,
        }
    }
}

impl From<InsightRow> for DailyAggregate {
    fn from(row: InsightRow) -> Self {
        DailyAggregate {
            date: row.date,
            performance: row.overall as f64,
            efficiency: row.efficiency as f64,
            reliability: row.reliability as f64,
            safety: row.safety as f64,
            utilization: Some(if row.in_service { 100.0 } else { 0.0 }),
        }
    }
}

/// Loads every row for `bus_id` from a history CSV. A missing file is an
/// empty history, not an error.
pub fn load_history(path: &str, bus_id: &str) -> Result<Vec<DailyAggregate>> {
    if !Path::new(path).exists() {
        debug!(path, "No history file");
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let row: InsightRow = result?;
        if row.bus_id == bus_id {
            rows.push(row.into());
        }
    }

    debug!(path, bus_id, rows = rows.len(), "History loaded");
    Ok(rows)
}
