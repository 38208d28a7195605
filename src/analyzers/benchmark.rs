//! Benchmark targets and the authoritative sub-score weights.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weights applied to each sub-score when computing `overall`. They sum to 1.0.
pub static WEIGHTS: &[(&str, f64)] = &[
    ("efficiency", 0.25),
    ("reliability", 0.25),
    ("safety", 0.25),
    ("customer_satisfaction", 0.25),
];

pub(crate) fn weight(name: &str) -> f64 {
    WEIGHTS
        .iter()
        .find(|(n, _)| *n == name)
        .map_or(0.0, |(_, w)| *w)
}

/// Named numeric targets used to scale raw metrics onto `[0, 100]`.
///
/// Supplied once per analytics session and never mutated during a scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Benchmark {
    pub target_utilization_pct: f64,
    /// Distance per fuel unit (km/l).
    pub target_fuel_efficiency: f64,
    pub target_on_time_pct: f64,
    /// Passenger rating on a 0-5 scale.
    pub target_satisfaction: f64,
    pub max_maintenance_downtime_pct: f64,
    pub target_safety_index: f64,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self {
            target_utilization_pct: 85.0,
            target_fuel_efficiency: 15.0,
            target_on_time_pct: 95.0,
            target_satisfaction: 4.5,
            max_maintenance_downtime_pct: 5.0,
            target_safety_index: 100.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BenchmarkError {
    #[error("benchmark target `{name}` must be a finite, non-negative number (got {value})")]
    InvalidTarget { name: &'static str, value: f64 },
    #[error("target_satisfaction must be on the 0-5 scale (got {0})")]
    SatisfactionOutOfScale(f64),
    #[error("max_maintenance_downtime_pct must be below 100 (got {0})")]
    DowntimeOutOfRange(f64),
}

impl Benchmark {
    /// Checks the targets once at startup so scoring never has to.
    pub fn validate(&self) -> Result<(), BenchmarkError> {
        let targets = [
            ("target_utilization_pct", self.target_utilization_pct),
            ("target_fuel_efficiency", self.target_fuel_efficiency),
            ("target_on_time_pct", self.target_on_time_pct),
            ("target_satisfaction", self.target_satisfaction),
            ("max_maintenance_downtime_pct", self.max_maintenance_downtime_pct),
            ("target_safety_index", self.target_safety_index),
        ];

        for (name, value) in targets {
            if !value.is_finite() || value < 0.0 {
                return Err(BenchmarkError::InvalidTarget { name, value });
            }
        }

        if self.target_satisfaction > 5.0 {
            return Err(BenchmarkError::SatisfactionOutOfScale(self.target_satisfaction));
        }

        if self.max_maintenance_downtime_pct >= 100.0 {
            return Err(BenchmarkError::DowntimeOutOfRange(self.max_maintenance_downtime_pct));
        }

        Ok(())
    }
}
