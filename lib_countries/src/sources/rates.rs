//! # Exchange Rate Source
//!
//! HTTP-backed [`RateSource`]. Walks the configured endpoints in order and
//! returns the first non-empty rate map; when every endpoint fails it serves
//! the static fallback table instead of failing, so callers always get a
//! best-effort answer.

use super::chain::EndpointChain;
use super::{extract_rates, RateOrigin, RateSource, RateTable};
use crate::errors::SourceError;
use crate::retrieve::ClientOptions;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Default rate endpoints, tried in this order.
pub const DEFAULT_RATE_ENDPOINTS: [&str; 2] = [
    "https://open.er-api.com/v6/latest/USD",
    "https://api.exchangerate-api.com/v4/latest/USD",
];

/// Exchange rates fetched over HTTP with a static fallback.
pub struct HttpRateSource {
    chain: EndpointChain,
}

impl HttpRateSource {
    /// # Arguments
    /// * `endpoints` - Absolute URLs, highest priority first.
    /// * `timeout` - Bound for each endpoint request.
    pub fn new(endpoints: &[String], timeout: Duration) -> Result<Self, SourceError> {
        Self::with_options(endpoints, ClientOptions { timeout, max_retries: 0 })
    }

    /// Like [`HttpRateSource::new`], with per-endpoint retries.
    pub fn with_options(endpoints: &[String], options: ClientOptions) -> Result<Self, SourceError> {
        Ok(Self {
            chain: EndpointChain::new("exchange_rates", endpoints, options)?,
        })
    }

    /// A source over [`DEFAULT_RATE_ENDPOINTS`].
    pub fn with_defaults(timeout: Duration) -> Result<Self, SourceError> {
        let endpoints: Vec<String> = DEFAULT_RATE_ENDPOINTS.iter().map(|s| s.to_string()).collect();
        Self::new(&endpoints, timeout)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self) -> RateTable {
        match self.chain.first_accepted(|body| extract_rates(&body)).await {
            Ok((endpoint, rates)) => {
                info!(%endpoint, currencies = rates.len(), "exchange rates fetched");
                RateTable::new(rates, RateOrigin::Live { endpoint })
            }
            Err(e) => {
                warn!(error = %e, "all exchange rate endpoints failed; serving fallback table");
                RateTable::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[tokio::test]
    async fn first_successful_endpoint_wins_and_later_ones_are_not_called() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("GET", "/primary")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"success","rates":{"USD":1,"NGN":1600.23}}"#)
            .create_async()
            .await;
        let secondary = server
            .mock("GET", "/secondary")
            .expect(0)
            .create_async()
            .await;

        let source = HttpRateSource::new(
            &[format!("{}/primary", server.url()), format!("{}/secondary", server.url())],
            timeout(),
        )
        .unwrap();
        let table = source.fetch_rates().await;

        primary.assert_async().await;
        secondary.assert_async().await;
        assert_eq!(table.get("NGN"), Some(1600.23));
        assert!(!table.is_fallback());
    }

    #[tokio::test]
    async fn falls_through_bad_payloads_to_next_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/errored")
            .with_status(200)
            .with_body(r#"{"result":"error","error-type":"quota-reached"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/flat")
            .with_status(200)
            .with_body(r#"{"base":"USD","rates":{"GHS":15.34}}"#)
            .create_async()
            .await;

        let source = HttpRateSource::new(
            &[format!("{}/errored", server.url()), format!("{}/flat", server.url())],
            timeout(),
        )
        .unwrap();
        let table = source.fetch_rates().await;

        assert_eq!(table.get("GHS"), Some(15.34));
        assert_eq!(
            table.origin(),
            &RateOrigin::Live { endpoint: format!("{}/flat", server.url()) }
        );
    }

    #[tokio::test]
    async fn all_endpoints_down_still_yields_usd() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/a").with_status(500).create_async().await;
        server.mock("GET", "/b").with_status(200).with_body("not json").create_async().await;

        let source = HttpRateSource::new(
            &[format!("{}/a", server.url()), format!("{}/b", server.url())],
            timeout(),
        )
        .unwrap();
        let table = source.fetch_rates().await;

        assert!(table.is_fallback());
        assert_eq!(table.get("USD"), Some(1.0));
    }

    #[tokio::test]
    async fn retries_each_endpoint_before_falling_through() {
        let mut server = mockito::Server::new_async().await;
        let busy = server.mock("GET", "/busy").with_status(503).expect(2).create_async().await;
        server
            .mock("GET", "/spare")
            .with_status(200)
            .with_body(r#"{"rates":{"USD":1,"GHS":15.34}}"#)
            .create_async()
            .await;

        let source = HttpRateSource::with_options(
            &[format!("{}/busy", server.url()), format!("{}/spare", server.url())],
            ClientOptions { timeout: timeout(), max_retries: 1 },
        )
        .unwrap();
        let table = source.fetch_rates().await;

        busy.assert_async().await;
        assert_eq!(table.get("GHS"), Some(15.34));
    }

    #[test]
    fn empty_endpoint_list_is_a_setup_error() {
        assert!(HttpRateSource::new(&[], timeout()).is_err());
    }
}
