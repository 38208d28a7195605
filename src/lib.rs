pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod history;
pub mod normalize;
pub mod output;
pub mod poll;
pub mod services;
pub mod session;
pub mod stats;
pub mod telemetry;
