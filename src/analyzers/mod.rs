//! Fleet performance scoring and what-if analysis.
//!
//! This module scores each bus against a benchmark, grades the results,
//! derives recommendations and trend series, caches insights per bus,
//! and simulates optimization algorithms over a fleet snapshot.

pub mod benchmark;
pub mod cache;
pub mod grade;
pub mod optimize;
pub mod recommend;
pub mod scoring;
pub mod trend;
pub mod types;
pub mod utility;
