//! # Country Data Source
//!
//! HTTP-backed [`CountrySource`]. Same ordered fallback chain as the rate
//! source, but there is no safe fallback data set for countries: when every
//! endpoint fails the call fails with the per-endpoint reasons.

use super::chain::EndpointChain;
use super::{extract_countries, CountrySource};
use crate::errors::SourceError;
use crate::retrieve::ClientOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Default country endpoints: restcountries v2, then v3.1.
pub const DEFAULT_COUNTRY_ENDPOINTS: [&str; 2] = [
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies",
    "https://restcountries.com/v3.1/all?fields=name,capital,region,population,flags,currencies",
];

/// Raw country entries fetched over HTTP.
pub struct HttpCountrySource {
    chain: EndpointChain,
}

impl HttpCountrySource {
    /// Endpoints are tried once each, in order.
    pub fn new(endpoints: &[String], timeout: Duration) -> Result<Self, SourceError> {
        Self::with_options(endpoints, ClientOptions { timeout, max_retries: 0 })
    }

    pub fn with_options(endpoints: &[String], options: ClientOptions) -> Result<Self, SourceError> {
        Ok(Self {
            chain: EndpointChain::new("countries", endpoints, options)?,
        })
    }

    /// A source over [`DEFAULT_COUNTRY_ENDPOINTS`].
    pub fn with_defaults(timeout: Duration) -> Result<Self, SourceError> {
        let endpoints: Vec<String> = DEFAULT_COUNTRY_ENDPOINTS.iter().map(|s| s.to_string()).collect();
        Self::new(&endpoints, timeout)
    }
}

#[async_trait]
impl CountrySource for HttpCountrySource {
    async fn fetch_countries(&self) -> Result<Vec<Value>, SourceError> {
        let (endpoint, entries) = self.chain.first_accepted(extract_countries).await?;
        info!(%endpoint, countries = entries.len(), "country list fetched");
        Ok(entries)
    }
}
