//! # Endpoint Fallback Chain
//!
//! An ordered list of alternative endpoints for one data set. `first_accepted`
//! asks each endpoint in turn and returns the first payload that passes the
//! caller's check; the remaining endpoints are not contacted.

use crate::errors::SourceError;
use crate::retrieve::{ApiClient, ClientOptions};
use serde_json::Value;
use tracing::{debug, warn};

/// One endpoint of a chain: its display URL and a client bound to it.
struct Endpoint {
    url: String,
    client: ApiClient,
}

/// Ordered endpoints for a single upstream data set.
pub struct EndpointChain {
    label: &'static str,
    endpoints: Vec<Endpoint>,
}

impl EndpointChain {
    /// Builds a client per endpoint, in the given order.
    ///
    /// Each endpoint retries transient failures `options.max_retries` times
    /// before the chain moves on to the next one.
    pub fn new(label: &'static str, urls: &[String], options: ClientOptions) -> Result<Self, SourceError> {
        if urls.is_empty() {
            return Err(SourceError::Client(format!("no {label} endpoints configured")));
        }
        let endpoints = urls
            .iter()
            .map(|url| {
                ApiClient::new(url, options)
                    .map(|client| Endpoint { url: url.clone(), client })
                    .map_err(|e| SourceError::Client(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { label, endpoints })
    }

    /// # First Accepted
    ///
    /// Tries each endpoint in order. A network error, timeout, non-2xx status,
    /// undecodable body or a payload rejected by `accept` moves on to the next
    /// endpoint. Returns the answering endpoint's URL with the accepted value,
    /// or every failure as `"<endpoint>: <reason>"`.
    pub async fn first_accepted<T, F>(&self, accept: F) -> Result<(String, T), SourceError>
    where
        F: Fn(Value) -> Result<T, String>,
    {
        let mut failures = Vec::with_capacity(self.endpoints.len());

        for (attempt, endpoint) in self.endpoints.iter().enumerate() {
            let reason = match endpoint.client.get_json::<Value>().await {
                Ok(response) if response.success => match response.data {
                    Some(body) => match accept(body) {
                        Ok(value) => {
                            debug!(source = self.label, endpoint = %endpoint.url, attempt = attempt + 1, "endpoint accepted");
                            return Ok((endpoint.url.clone(), value));
                        }
                        Err(reason) => reason,
                    },
                    None => "empty body".to_string(),
                },
                Ok(response) => {
                    debug!(source = self.label, endpoint = %endpoint.url, body = ?response.error_body, "error response body");
                    format!("HTTP status {}", response.status)
                }
                Err(e) => e.to_string(),
            };

            warn!(
                source = self.label,
                endpoint = %endpoint.url,
                attempt = attempt + 1,
                of = self.endpoints.len(),
                %reason,
                "endpoint failed"
            );
            failures.push(format!("{}: {}", endpoint.url, reason));
        }

        Err(SourceError::Unavailable { failures })
    }
}
