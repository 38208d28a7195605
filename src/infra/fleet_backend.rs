use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use fleet_insights::analyzers::types::{DailyAggregate, FleetComparison};
use fleet_insights::fetch::auth::ApiKey;
use fleet_insights::fetch::{BasicClient, FetchCause, FetchError, HttpClient, fetch_json};
use fleet_insights::services::fleet_api::FleetApi;

/// REST client for the fleet backend. Every call carries the bearer token.
pub struct FleetBackendClient<C> {
    base_url: String,
    http: C,
}

impl FleetBackendClient<ApiKey<BasicClient>> {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = ApiKey::bearer(BasicClient::new()?, token)
            .context("FLEET_API_TOKEN is not a valid header value")?;
        Ok(Self::with_client(base_url, http))
    }
}

impl<C> FleetBackendClient<C> {
    pub fn with_client(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn buses_url(&self) -> String {
        format!("{}/api/buses", self.base_url)
    }

    /// `bus_id` is pushed as a single escaped path segment.
    fn historical_url(&self, bus_id: &str, days: u32) -> Result<String, FetchError> {
        let buses = self.buses_url();
        let invalid = |reason: String| FetchError::new(&buses, FetchCause::InvalidUrl(reason));

        let mut url = reqwest::Url::parse(&buses).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot carry a path".to_string()))?
            .push(bus_id)
            .extend(["metrics", "historical"]);
        url.query_pairs_mut().append_pair("days", &days.to_string());

        Ok(url.into())
    }

    fn comparison_url(&self) -> String {
        format!("{}/api/buses/metrics/benchmarks", self.base_url)
    }
}

#[async_trait]
impl<C: HttpClient> FleetApi for FleetBackendClient<C> {
    async fn list_buses(&self) -> Result<Vec<Value>, FetchError> {
        let buses: Vec<Value> = fetch_json(&self.http, &self.buses_url()).await?;
        debug!(count = buses.len(), "Fleet listing received");
        Ok(buses)
    }

    async fn historical_metrics(&self, bus_id: &str, days: u32) -> Result<Vec<DailyAggregate>, FetchError> {
        let url = self.historical_url(bus_id, days)?;
        fetch_json(&self.http, &url).await
    }

    async fn fleet_comparison(&self) -> Result<FleetComparison, FetchError> {
        fetch_json(&self.http, &self.comparison_url()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let client = FleetBackendClient::with_client("https://fleet.example.org/", ());

        assert_eq!(client.buses_url(), "https://fleet.example.org/api/buses");
        assert_eq!(
            client.historical_url("bus-7", 30).unwrap(),
            "https://fleet.example.org/api/buses/bus-7/metrics/historical?days=30"
        );
        assert_eq!(
            client.comparison_url(),
            "https://fleet.example.org/api/buses/metrics/benchmarks"
        );
    }

    #[test]
    fn test_bus_id_is_escaped_in_path() {
        let client = FleetBackendClient::with_client("https://fleet.example.org", ());

        assert_eq!(
            client.historical_url("a/b?c#d", 7).unwrap(),
            "https://fleet.example.org/api/buses/a%2Fb%3Fc%23d/metrics/historical?days=7"
        );
    }

    #[test]
    fn test_invalid_base_url_is_a_fetch_error() {
        let client = FleetBackendClient::with_client("not a url", ());

        let err = client.historical_url("bus-7", 7).unwrap_err();
        assert!(matches!(err, FetchError::FetchFailed { cause: FetchCause::InvalidUrl(_), .. }));
    }
}
