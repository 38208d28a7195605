//! The analytics session: one per open dashboard.
//!
//! An [`InsightSession`] owns the benchmark, the insight cache and the poll
//! gate. It is created when a dashboard opens and consumed by
//! [`InsightSession::close`] when it closes; nothing lives outside it.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::analyzers::benchmark::{Benchmark, BenchmarkError};
use crate::analyzers::cache::{CachePolicy, CachedInsight, InsightCache};
use crate::analyzers::optimize::{AlgorithmId, OptimizationResult, simulate};
use crate::analyzers::recommend::recommend;
use crate::analyzers::scoring::{score, score_fleet};
use crate::analyzers::trend::{TrendSeries, synthesize};
use crate::analyzers::types::{PerformanceInsight, Recommendation};
use crate::config::{AnalyticsConfig, ConfigError};
use crate::fetch::FetchError;
use crate::normalize::normalize_fleet;
use crate::poll::PollGate;
use crate::services::fleet_api::FleetApi;
use crate::stats::FleetStats;
use crate::telemetry::BusRecord;

/// A normalized, scored fleet from one successful refresh.
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub fleet: Vec<BusRecord>,
    pub insights: HashMap<String, PerformanceInsight>,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Applied(FleetSnapshot),
    /// A newer refresh started before this one finished; its result was dropped.
    Superseded,
}

#[derive(Debug)]
pub struct InsightSession {
    benchmark: Benchmark,
    cache: InsightCache,
    gate: PollGate,
    publish: Mutex<()>,
    opened_at: DateTime<Utc>,
}

impl InsightSession {
    /// Opens a session, validating the benchmark up front.
    pub fn open(benchmark: Benchmark, policy: CachePolicy) -> Result<Self, BenchmarkError> {
        benchmark.validate()?;
        let opened_at = Utc::now();
        info!(
            ttl_secs = ?policy.ttl_secs,
            capacity = policy.capacity,
            "Insight session opened"
        );
        Ok(Self {
            benchmark,
            cache: InsightCache::new(policy),
            gate: PollGate::new(),
            publish: Mutex::new(()),
            opened_at,
        })
    }

    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::open(config.benchmark.clone(), config.cache)?)
    }

    pub fn benchmark(&self) -> &Benchmark {
        &self.benchmark
    }

    /// Last computed insight for a bus, with its freshness.
    pub fn get_insight(&self, bus_id: &str) -> Option<CachedInsight> {
        self.cache.get(bus_id)
    }

    /// Scores every bus, caches the results and returns them keyed by id.
    pub fn get_fleet_insights(&self, fleet: &[BusRecord]) -> HashMap<String, PerformanceInsight> {
        let insights = score_fleet(fleet, &self.benchmark);
        for (id, insight) in &insights {
            self.cache.put(id, insight.clone());
        }
        insights
    }

    /// Recommendations for `fleet` against a single snapshot of the cache.
    /// Buses missing from the cache are scored and cached first.
    pub fn get_recommendations(&self, fleet: &[BusRecord], now: DateTime<Utc>) -> Vec<Recommendation> {
        let mut snapshot = self.cache.snapshot_at(now);

        for bus in fleet {
            if !snapshot.contains_key(&bus.id) {
                let insight = score(bus, &self.benchmark);
                self.cache.put_at(&bus.id, insight.clone(), now);
                snapshot.insert(bus.id.clone(), insight);
            }
        }

        recommend(fleet, &snapshot, &self.benchmark, now)
    }

    pub fn fleet_stats(&self, fleet: &[BusRecord], now: DateTime<Utc>) -> FleetStats {
        let snapshot = self.cache.snapshot_at(now);
        FleetStats::from_fleet(fleet, &snapshot, &self.benchmark, now)
    }

    /// Daily trend for one bus from the backend's historical metrics.
    pub async fn get_trend<A: FleetApi + ?Sized>(
        &self,
        api: &A,
        bus_id: &str,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<TrendSeries, FetchError> {
        let history = api.historical_metrics(bus_id, window_days).await?;
        let series = synthesize(&history, window_days, today);
        if !series.is_available() {
            debug!(bus_id, window_days, "No history inside trend window");
        }
        Ok(series)
    }

    pub fn run_optimization(
        &self,
        fleet: &[BusRecord],
        algorithm: AlgorithmId,
        now: DateTime<Utc>,
    ) -> OptimizationResult {
        simulate(fleet, &self.benchmark, algorithm, now)
    }

    /// Fetches, normalizes and scores the fleet, then publishes the insights
    /// to the cache unless a newer refresh has started meanwhile.
    ///
    /// On a fetch failure cached insights are kept but marked stale.
    pub async fn refresh<A: FleetApi + ?Sized>(&self, api: &A) -> Result<RefreshOutcome, FetchError> {
        let ticket = self.gate.begin();
        let result = api.list_buses().await;

        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.gate.is_current(ticket) {
            warn!(generation = ticket.generation(), "Refresh superseded, discarding result");
            return Ok(RefreshOutcome::Superseded);
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.cache.mark_stale();
                warn!(error = %e, cached = self.cache.len(), "Refresh failed, cached insights marked stale");
                return Err(e);
            }
        };

        let fetched_at = Utc::now();
        let fleet = normalize_fleet(&raw);
        let insights = score_fleet(&fleet, &self.benchmark);

        self.cache.retain(fleet.iter().map(|b| b.id.as_str()));
        for (id, insight) in &insights {
            self.cache.put_at(id, insight.clone(), fetched_at);
        }

        info!(
            generation = ticket.generation(),
            buses = fleet.len(),
            "Fleet refreshed"
        );

        Ok(RefreshOutcome::Applied(FleetSnapshot {
            fetched_at,
            fleet,
            insights,
        }))
    }

    /// Tears the session down, dropping every cached insight. Returns how
    /// many insights were dropped.
    pub fn close(self) -> usize {
        let cached = self.cache.len();
        self.cache.clear();
        info!(
            cached,
            open_secs = (Utc::now() - self.opened_at).num_seconds(),
            "Insight session closed"
        );
        cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::cache::Freshness;
    use crate::analyzers::types::{DailyAggregate, FleetComparison, RecommendationKind};
    use crate::fetch::FetchCause;
    use crate::telemetry::fixtures::{bus, bus_with_fuel};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    struct FakeApi {
        buses: Vec<Value>,
        history: Vec<DailyAggregate>,
        fail: AtomicBool,
    }

    impl FakeApi {
        fn with_buses(buses: Vec<Value>) -> Self {
            Self {
                buses,
                history: Vec::new(),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl FleetApi for FakeApi {
        async fn list_buses(&self) -> Result<Vec<Value>, FetchError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::new(
                    "http://fleet.test/api/buses",
                    FetchCause::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE),
                ));
            }
            Ok(self.buses.clone())
        }

        async fn historical_metrics(&self, _bus_id: &str, _days: u32) -> Result<Vec<DailyAggregate>, FetchError> {
            Ok(self.history.clone())
        }

        async fn fleet_comparison(&self) -> Result<FleetComparison, FetchError> {
            Ok(FleetComparison {
                fleet_average: 0.0,
                top_performer: None,
                rank: None,
            })
        }
    }

    /// Holds `list_buses` until released, to interleave two refreshes.
    struct GatedApi {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        buses: Vec<Value>,
    }

    #[async_trait]
    impl FleetApi for GatedApi {
        async fn list_buses(&self) -> Result<Vec<Value>, FetchError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.buses.clone())
        }

        async fn historical_metrics(&self, _bus_id: &str, _days: u32) -> Result<Vec<DailyAggregate>, FetchError> {
            Ok(Vec::new())
        }

        async fn fleet_comparison(&self) -> Result<FleetComparison, FetchError> {
            unreachable!()
        }
    }

    fn session() -> InsightSession {
        InsightSession::open(Benchmark::default(), CachePolicy::default()).unwrap()
    }

    fn raw_bus(id: &str, fuel: f64) -> Value {
        json!({
            "_id": id,
            "status": "active",
            "fuel": { "currentLevel": fuel, "averageConsumption": 15 },
            "operations": { "onTimePerformance": 95, "passengerRating": 4.5 }
        })
    }

    #[test]
    fn test_open_rejects_invalid_benchmark() {
        let benchmark = Benchmark {
            target_fuel_efficiency: -1.0,
            ..Benchmark::default()
        };
        assert!(InsightSession::open(benchmark, CachePolicy::default()).is_err());
    }

    #[test]
    fn test_fleet_insights_are_cached() {
        let session = session();
        let insights = session.get_fleet_insights(&[bus("a"), bus("b")]);

        assert_eq!(insights.len(), 2);
        let cached = session.get_insight("a").unwrap();
        assert!(cached.insight.scores_eq(&insights["a"]));
        assert_eq!(cached.freshness, Freshness::Fresh);
    }

    #[test]
    fn test_empty_fleet() {
        let session = session();
        assert!(session.get_fleet_insights(&[]).is_empty());
        assert!(session.get_recommendations(&[], Utc::now()).is_empty());
    }

    #[test]
    fn test_recommendations_fill_missing_insights() {
        let session = session();
        let recs = session.get_recommendations(&[bus_with_fuel("a", 10.0), bus("b")], Utc::now());

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::LowFuel);
        assert!(session.get_insight("b").is_some());
    }

    #[tokio::test]
    async fn test_refresh_scores_and_caches() {
        let session = session();
        let api = FakeApi::with_buses(vec![raw_bus("a", 50.0), raw_bus("b", 5.0), json!({})]);

        let outcome = session.refresh(&api).await.unwrap();
        let RefreshOutcome::Applied(snapshot) = outcome else {
            panic!("expected applied refresh");
        };

        assert_eq!(snapshot.fleet.len(), 2);
        assert_eq!(snapshot.insights["a"].overall, 100);
        assert!(session.get_insight("b").is_some());

        let recs = session.get_recommendations(&snapshot.fleet, Utc::now());
        assert_eq!(recs[0].sample_ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_failed_refresh_marks_cache_stale() {
        let session = session();
        let api = FakeApi::with_buses(vec![raw_bus("a", 50.0)]);
        session.refresh(&api).await.unwrap();

        api.fail.store(true, Ordering::SeqCst);
        let err = session.refresh(&api).await.unwrap_err();

        assert_eq!(err.endpoint(), "http://fleet.test/api/buses");
        let cached = session.get_insight("a").unwrap();
        assert_eq!(cached.freshness, Freshness::Stale);
        assert_eq!(cached.insight.overall, 100);

        api.fail.store(false, Ordering::SeqCst);
        session.refresh(&api).await.unwrap();
        assert_eq!(session.get_insight("a").unwrap().freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_refresh_drops_departed_buses() {
        let session = session();
        session
            .refresh(&FakeApi::with_buses(vec![raw_bus("a", 50.0), raw_bus("b", 50.0)]))
            .await
            .unwrap();
        session
            .refresh(&FakeApi::with_buses(vec![raw_bus("b", 50.0)]))
            .await
            .unwrap();

        assert!(session.get_insight("a").is_none());
        assert!(session.get_insight("b").is_some());
    }

    #[tokio::test]
    async fn test_older_refresh_is_superseded() {
        let session = Arc::new(session());
        let slow_entered = Arc::new(Notify::new());
        let slow_release = Arc::new(Notify::new());
        let slow = Arc::new(GatedApi {
            entered: slow_entered.clone(),
            release: slow_release.clone(),
            buses: vec![raw_bus("old", 5.0)],
        });

        let stale_task = {
            let session = session.clone();
            let slow = slow.clone();
            tokio::spawn(async move { session.refresh(slow.as_ref()).await })
        };
        // The slow refresh holds its ticket once it is inside list_buses.
        slow_entered.notified().await;

        let fresh = FakeApi::with_buses(vec![raw_bus("new", 50.0)]);
        let outcome = session.refresh(&fresh).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Applied(_)));

        slow_release.notify_one();
        let stale_outcome = stale_task.await.unwrap().unwrap();
        assert!(matches!(stale_outcome, RefreshOutcome::Superseded));

        assert!(session.get_insight("new").is_some());
        assert!(session.get_insight("old").is_none());
    }

    #[tokio::test]
    async fn test_get_trend_uses_history() {
        let session = session();
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut api = FakeApi::with_buses(Vec::new());

        let empty = session.get_trend(&api, "a", 7, today).await.unwrap();
        assert_eq!(empty, TrendSeries::Unavailable { window_days: 7 });

        api.history = vec![DailyAggregate {
            date: today,
            performance: 82.0,
            efficiency: 75.0,
            reliability: 88.0,
            safety: 100.0,
            utilization: None,
        }];
        let series = session.get_trend(&api, "a", 7, today).await.unwrap();
        assert_eq!(series.points().len(), 7);
        assert_eq!(series.points()[6].performance, Some(82.0));
    }

    #[test]
    fn test_run_optimization_reports_current_average() {
        let session = session();
        let mut slow = bus("slow");
        slow.operations.on_time_pct = 0.0;
        let fleet = [bus("a"), slow];

        let result = session.run_optimization(&fleet, AlgorithmId::OnTimeRecovery, Utc::now());
        assert_eq!(result.before_score, 87.5);
        assert!(result.after_score > result.before_score);
    }

    #[test]
    fn test_close_drops_cached_insights() {
        let session = session();
        session.get_fleet_insights(&[bus("a"), bus("b")]);
        assert!(session.get_insight("a").is_some());

        assert_eq!(session.close(), 2);
        assert_eq!(self::session().close(), 0);
    }
}
