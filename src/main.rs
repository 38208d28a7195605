//! CLI entry point for the fleet insights tool.
//!
//! Provides subcommands for scoring a fleet, listing recommendations, building
//! per-bus trends, simulating optimizations, and watching the live backend.

mod infra;

use crate::infra::fleet_backend::FleetBackendClient;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fleet_insights::analyzers::grade::grade;
use fleet_insights::analyzers::optimize::AlgorithmId;
use fleet_insights::analyzers::trend::synthesize;
use fleet_insights::config::{AnalyticsConfig, api_token};
use fleet_insights::fetch::BasicClient;
use fleet_insights::fetch::auth::ApiKey;
use fleet_insights::history::load_history;
use fleet_insights::normalize::normalize_fleet;
use fleet_insights::output::{append_insights, print_json, print_pretty};
use fleet_insights::services::fleet_api::FleetApi;
use fleet_insights::session::{InsightSession, RefreshOutcome};
use fleet_insights::telemetry::BusRecord;
use serde_json::Value;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::Instrument;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type Backend = FleetBackendClient<ApiKey<BasicClient>>;

#[derive(Parser)]
#[command(name = "fleet_insights")]
#[command(about = "Performance analytics for a bus fleet", long_about = None)]
struct Cli {
    /// JSON config file (benchmark, cache, polling, API base URL)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every bus and print the fleet overview
    Score {
        /// Fleet JSON file; fetched from the backend when omitted
        #[arg(value_name = "FILE")]
        source: Option<String>,

        /// CSV file to append per-bus insight history to
        #[arg(short = 'H', long, default_value = "history/insights.csv")]
        history: String,
    },
    /// Evaluate recommendation rules against the fleet
    Recommend {
        /// Fleet JSON file; fetched from the backend when omitted
        #[arg(value_name = "FILE")]
        source: Option<String>,
    },
    /// Build a daily performance trend for one bus
    Trend {
        bus_id: String,

        /// Number of days in the window, ending today
        #[arg(short, long, default_value_t = 30)]
        days: u32,

        /// Read history from this CSV instead of the backend
        #[arg(short = 'H', long)]
        history: Option<String>,
    },
    /// Simulate an optimization algorithm (all algorithms when omitted)
    Optimize {
        /// Fleet JSON file; fetched from the backend when omitted
        #[arg(value_name = "FILE")]
        source: Option<String>,

        /// fuel-efficiency, on-time-recovery, maintenance-catch-up or balanced
        #[arg(short, long)]
        algorithm: Option<AlgorithmId>,
    },
    /// Poll the backend and re-evaluate the fleet on every refresh
    Watch {
        /// Number of refresh cycles (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_cycles: usize,

        /// Optional: CSV file to append insight history to after each refresh
        #[arg(short = 'H', long)]
        history: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_insights.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_insights.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AnalyticsConfig::resolve(cli.config.as_deref())?;
    debug!(base_url = %config.api.base_url, "Config resolved");

    match cli.command {
        Commands::Score { source, history } => {
            let session = InsightSession::from_config(&config)?;
            let fleet = load_fleet(source.as_deref(), &config).await?;

            let insights = session.get_fleet_insights(&fleet);
            for bus in &fleet {
                if let Some(insight) = insights.get(&bus.id) {
                    info!(
                        bus_id = %bus.id,
                        bus_number = %bus.bus_number,
                        overall = insight.overall,
                        band = ?grade(insight.overall),
                        "Bus scored"
                    );
                }
            }

            let stats = session.fleet_stats(&fleet, Utc::now());
            print_json(&stats)?;
            append_insights(&history, &fleet, &insights, Utc::now().date_naive())?;
            session.close();
        }
        Commands::Recommend { source } => {
            let session = InsightSession::from_config(&config)?;
            let fleet = load_fleet(source.as_deref(), &config).await?;

            let recommendations = session.get_recommendations(&fleet, Utc::now());
            if recommendations.is_empty() {
                info!(buses = fleet.len(), "No recommendations");
            }
            for rec in &recommendations {
                info!(
                    id = rec.id,
                    severity = ?rec.severity,
                    affected = rec.affected_count,
                    samples = ?rec.sample_ids,
                    "{}",
                    rec.title
                );
            }
            print_json(&recommendations)?;
            session.close();
        }
        Commands::Trend {
            bus_id,
            days,
            history,
        } => {
            let today = Utc::now().date_naive();
            let series = match history {
                Some(path) => synthesize(&load_history(&path, &bus_id)?, days, today),
                None => {
                    let session = InsightSession::from_config(&config)?;
                    let api = backend(&config)?;
                    let series = session.get_trend(&api, &bus_id, days, today).await?;
                    session.close();
                    series
                }
            };

            if !series.is_available() {
                warn!(bus_id = %bus_id, days, "No historical data in window");
            }
            print_json(&series)?;
        }
        Commands::Optimize { source, algorithm } => {
            let session = InsightSession::from_config(&config)?;
            let fleet = load_fleet(source.as_deref(), &config).await?;
            let now = Utc::now();

            let algorithms = match algorithm {
                Some(a) => vec![a],
                None => AlgorithmId::ALL.to_vec(),
            };

            let results: Vec<_> = algorithms
                .into_iter()
                .map(|a| session.run_optimization(&fleet, a, now))
                .collect();
            for result in &results {
                info!(
                    algorithm = %result.algorithm,
                    before = result.before_score,
                    after = result.after_score,
                    "Optimization simulated"
                );
                print_pretty(&result.actions);
            }
            print_json(&results)?;
            session.close();
        }
        Commands::Watch {
            num_cycles,
            history,
        } => {
            watch(&config, num_cycles, history).await?;
        }
    }

    Ok(())
}

fn backend(config: &AnalyticsConfig) -> Result<Backend> {
    let token = api_token()?;
    FleetBackendClient::new(&config.api.base_url, &token)
}

/// Loads a fleet from a JSON file, or from the backend when no file is given.
#[tracing::instrument(skip(config))]
async fn load_fleet(source: Option<&str>, config: &AnalyticsConfig) -> Result<Vec<BusRecord>> {
    let raw = match source {
        Some(path) => read_fleet_file(path)?,
        None => {
            let api = backend(config)?;
            match api.fleet_comparison().await {
                Ok(cmp) => info!(
                    fleet_average = cmp.fleet_average,
                    top_performer = ?cmp.top_performer,
                    rank = ?cmp.rank,
                    "Fleet comparison"
                ),
                Err(e) => warn!(error = %e, "Fleet comparison unavailable"),
            }
            api.list_buses().await?
        }
    };

    let fleet = normalize_fleet(&raw);
    info!(raw = raw.len(), buses = fleet.len(), "Fleet loaded");
    Ok(fleet)
}

/// Accepts either a bare array of buses or a `{success, data}` envelope.
fn read_fleet_file(path: &str) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let value: Value = serde_json::from_str(&content).with_context(|| format!("parsing {path}"))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("{path}: expected an array of buses or an object with a `data` array"),
        },
        _ => bail!("{path}: expected an array of buses or an object with a `data` array"),
    }
}

/// Refreshes the fleet on the configured interval until `num_cycles` refreshes
/// have been started or Ctrl+C is pressed. A refresh still running when the
/// next one is due is aborted.
#[tracing::instrument(skip(config, history))]
async fn watch(config: &AnalyticsConfig, num_cycles: usize, history: Option<String>) -> Result<()> {
    let session = Arc::new(InsightSession::from_config(config)?);
    let api = Arc::new(backend(config)?);

    let fleet_every = config.polling.fleet_interval_secs;
    let metrics_every = config.polling.metrics_interval_secs;
    if num_cycles == 0 {
        info!(fleet_every, metrics_every, "Watching infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_cycles, fleet_every, metrics_every, "Starting watch");
    }

    let mut fleet_ticker = poll_ticker(fleet_every);
    let mut metrics_ticker = poll_ticker(metrics_every);
    let mut in_flight: Option<JoinHandle<()>> = None;
    let mut comparison: Option<JoinHandle<()>> = None;
    let mut cycle = 0;

    loop {
        tokio::select! {
            _ = fleet_ticker.tick() => {}
            _ = metrics_ticker.tick() => {
                if comparison.as_ref().is_some_and(|h| !h.is_finished()) {
                    debug!("Fleet comparison still running, skipping tick");
                } else {
                    let api = api.clone();
                    comparison = Some(tokio::spawn(async move {
                        match api.fleet_comparison().await {
                            Ok(cmp) => info!(
                                fleet_average = cmp.fleet_average,
                                top_performer = ?cmp.top_performer,
                                "Fleet comparison"
                            ),
                            Err(e) => warn!(error = %e, "Fleet comparison unavailable"),
                        }
                    }));
                }
                continue;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }

        if let Some(handle) = in_flight.take() {
            if !handle.is_finished() {
                warn!("Previous refresh still running, superseding it");
                handle.abort();
            }
        }

        cycle += 1;
        let span = tracing::info_span!("refresh", cycle);
        let session = session.clone();
        let api = api.clone();
        let history = history.clone();

        in_flight = Some(tokio::spawn(
            async move {
                match session.refresh(api.as_ref()).await {
                    Ok(RefreshOutcome::Applied(snapshot)) => {
                        let now = Utc::now();
                        let stats = session.fleet_stats(&snapshot.fleet, now);
                        let recommendations = session.get_recommendations(&snapshot.fleet, now);
                        info!(
                            buses = stats.total_buses,
                            avg_performance = stats.avg_performance,
                            low_fuel = stats.low_fuel,
                            maintenance_due = stats.maintenance_due,
                            emergencies = stats.emergencies,
                            recommendations = recommendations.len(),
                            "Fleet evaluated"
                        );
                        for rec in &recommendations {
                            info!(id = rec.id, severity = ?rec.severity, "{}", rec.title);
                        }
                        if let Some(path) = history {
                            if let Err(e) = append_insights(
                                &path,
                                &snapshot.fleet,
                                &snapshot.insights,
                                now.date_naive(),
                            ) {
                                error!(error = %e, "Failed to append insight history");
                            }
                        }
                    }
                    Ok(RefreshOutcome::Superseded) => debug!("Refresh result discarded"),
                    Err(e) => error!(error = %e, "Fleet refresh failed"),
                }
            }
            .instrument(span),
        ));

        if num_cycles > 0 && cycle >= num_cycles {
            break;
        }
    }

    if let Some(handle) = comparison {
        handle.abort();
    }
    if let Some(handle) = in_flight {
        let _ = handle.await;
    }

    match Arc::try_unwrap(session) {
        Ok(session) => {
            session.close();
        }
        Err(_) => debug!("Session still shared at shutdown, skipping close"),
    }

    info!(cycles = cycle, "Watch finished");
    Ok(())
}

/// Interval for a polling loop. Ticks missed while the loop was busy are
/// skipped rather than fired in a burst.
fn poll_ticker(every_secs: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(every_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
