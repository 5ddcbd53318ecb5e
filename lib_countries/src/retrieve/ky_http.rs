//! # HTTP Retrieval Utilities
//!
//! An asynchronous JSON client bound to one endpoint URL, built on
//! `reqwest_middleware` with an optional exponential-backoff retry middleware
//! and a per-request timeout.

use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Duration;

const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with the status of the
/// HTTP transaction.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
}

/// Transport settings for an [`ApiClient`].
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Upper bound for a single request, connect to last body byte.
    pub timeout: Duration,
    /// Transient-failure retries. `0` installs no retry middleware at all.
    pub max_retries: u32,
}

/// An asynchronous HTTP client for a single JSON endpoint.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The full endpoint URL, query string included.
    url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient` instance.
    ///
    /// # Arguments
    /// * `url` - The absolute endpoint URL (e.g., "https://restcountries.com/v2/all?fields=name").
    /// * `options` - Timeout and retry settings.
    ///
    /// # Errors
    /// Fails if `url` is not an absolute URL or the TLS backend cannot be initialised.
    pub fn new(url: &str, options: ClientOptions) -> anyhow::Result<Self> {
        let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("invalid endpoint URL '{}': {}", url, e))?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("lib_countries/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut builder = ClientBuilder::new(client);
        if options.max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder()
                .retry_bounds(MIN_RETRY_INTERVAL, options.timeout.max(MIN_RETRY_INTERVAL))
                .build_with_max_retries(options.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            url: parsed,
        })
    }

    /// `GET` the endpoint and decode a 2xx body as `T`.
    ///
    /// # Errors
    /// Returns an `anyhow::Error` if the request fails on the network or a 2xx
    /// body does not decode. Non-2xx statuses are not errors; they come back
    /// with `success == false`.
    pub async fn get_json<T: DeserializeOwned>(&self) -> anyhow::Result<ApiResponse<T>> {
        // 1. Execute the request and capture the status
        let response: reqwest::Response = self.inner.get(self.url.clone()).send().await?;
        let status = response.status();

        // 2. Decode the body on success, keep the text otherwise
        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn no_retry() -> ClientOptions {
        ClientOptions { timeout: Duration::from_secs(5), max_retries: 0 }
    }

    #[test]
    fn rejects_relative_url() {
        assert!(ApiClient::new("not a url", no_retry()).is_err());
    }

    #[tokio::test]
    async fn get_json_keeps_query_string_of_full_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/all")
            .match_query(mockito::Matcher::UrlEncoded("fields".into(), "name".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"name":"Ghana"}]"#)
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/v2/all?fields=name", server.url()), no_retry()).unwrap();
        let res = client.get_json::<Value>().await.unwrap();

        mock.assert_async().await;
        assert!(res.success);
        assert_eq!(res.data.unwrap()[0]["name"], "Ghana");
    }

    #[tokio::test]
    async fn non_success_status_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/missing", server.url()), no_retry()).unwrap();
        let res = client.get_json::<Value>().await.unwrap();

        assert!(!res.success);
        assert_eq!(res.status, 404);
        assert_eq!(res.error_body.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn retries_transient_failures_when_enabled() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let options = ClientOptions { timeout: Duration::from_secs(5), max_retries: 2 };
        let client = ApiClient::new(&format!("{}/flaky", server.url()), options).unwrap();
        let res = client.get_json::<Value>().await.unwrap();

        failing.assert_async().await;
        assert_eq!(res.status, 503);
    }
}
