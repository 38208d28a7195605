//! Trait for the fleet backend the analytics core reads from.

use async_trait::async_trait;
use serde_json::Value;

use crate::analyzers::types::{DailyAggregate, FleetComparison};
use crate::fetch::FetchError;

/// Abstraction over the fleet REST backend.
///
/// Fleet listings are returned as raw JSON objects; turning them into
/// [`BusRecord`](crate::telemetry::BusRecord)s is the normalizer's job.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Returns every bus the caller may see.
    async fn list_buses(&self) -> Result<Vec<Value>, FetchError>;

    /// Returns up to `days` days of per-bus historical metrics.
    async fn historical_metrics(&self, bus_id: &str, days: u32) -> Result<Vec<DailyAggregate>, FetchError>;

    /// Returns how the fleet compares: average, top performer and rank.
    async fn fleet_comparison(&self) -> Result<FleetComparison, FetchError>;
}
