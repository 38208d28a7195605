//! Daily trend series built from historical aggregates.
//!
//! Days without recorded history carry `None` metrics. When no day inside the
//! window has data the series is [`TrendSeries::Unavailable`]; values are
//! never invented to fill the chart.

use crate::analyzers::types::DailyAggregate;
use crate::analyzers::utility::mean;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub performance: Option<f64>,
    pub fuel_efficiency: Option<f64>,
    /// Reliability aggregate, which tracks maintenance health.
    pub maintenance: Option<f64>,
    pub utilization: Option<f64>,
}

impl TrendPoint {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            performance: None,
            fuel_efficiency: None,
            maintenance: None,
            utilization: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.performance.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrendSeries {
    /// Exactly `window_days` points, oldest first, ending today.
    Available { points: Vec<TrendPoint> },
    Unavailable { window_days: u32 },
}

impl TrendSeries {
    pub fn points(&self) -> &[TrendPoint] {
        match self {
            TrendSeries::Available { points } => points,
            TrendSeries::Unavailable { .. } => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TrendSeries::Available { .. })
    }
}

#[derive(Default)]
struct DayBucket {
    performance: Vec<f64>,
    efficiency: Vec<f64>,
    reliability: Vec<f64>,
    utilization: Vec<f64>,
}

/// Builds a `window_days`-long daily series ending at `today`.
///
/// Several records for the same date are averaged.
pub fn synthesize(history: &[DailyAggregate], window_days: u32, today: NaiveDate) -> TrendSeries {
    let Some(start) = window_days
        .checked_sub(1)
        .and_then(|back| today.checked_sub_days(Days::new(back as u64)))
    else {
        return TrendSeries::Unavailable { window_days };
    };

    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for row in history.iter().filter(|r| r.date >= start && r.date <= today) {
        let bucket = buckets.entry(row.date).or_default();
        bucket.performance.push(row.performance);
        bucket.efficiency.push(row.efficiency);
        bucket.reliability.push(row.reliability);
        if let Some(u) = row.utilization {
            bucket.utilization.push(u);
        }
    }

    if buckets.is_empty() {
        return TrendSeries::Unavailable { window_days };
    }

    let points = start
        .iter_days()
        .take(window_days as usize)
        .map(|date| match buckets.get(&date) {
            Some(b) => TrendPoint {
                date,
                performance: Some(mean(&b.performance)),
                fuel_efficiency: Some(mean(&b.efficiency)),
                maintenance: Some(mean(&b.reliability)),
                utilization: (!b.utilization.is_empty()).then(|| mean(&b.utilization)),
            },
            None => TrendPoint::empty(date),
        })
        .collect();

    TrendSeries::Available { points }
}
