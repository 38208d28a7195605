//! Output formatting and persistence for analytics results.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::analyzers::types::PerformanceInsight;
use crate::history::InsightRow;
use crate::telemetry::BusRecord;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty(value: &impl std::fmt::Debug) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &impl Serialize) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Appends one history row per scored bus, in fleet order. Buses without an
/// insight are skipped. Returns the number of rows written.
pub fn append_insights(
    path: &str,
    fleet: &[BusRecord],
    insights: &HashMap<String, PerformanceInsight>,
    date: NaiveDate,
) -> Result<usize> {
    let mut written = 0;
    for bus in fleet {
        if let Some(insight) = insights.get(&bus.id) {
            append_record(path, &InsightRow::new(bus, insight, date))?;
            written += 1;
        }
    }
    info!(path, written, "Insight history appended");
    Ok(written)
}
