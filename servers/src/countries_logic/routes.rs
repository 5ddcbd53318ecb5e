//! # Router
//!
//! Route table and the layers shared by every endpoint. Every path also
//! answers with a trailing slash.

use super::handlers;
use super::state::AppState;
use axum::{
    Json, Router,
    extract::Request,
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Builds the application router around shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/status/", get(handlers::status))
        .route("/countries", get(handlers::list_countries))
        .route("/countries/", get(handlers::list_countries))
        .route("/countries/refresh", post(handlers::refresh_countries))
        .route("/countries/refresh/", post(handlers::refresh_countries))
        .route("/countries/image", get(handlers::summary_image))
        .route("/countries/image/", get(handlers::summary_image))
        .route("/countries/status", get(handlers::status))
        .route("/countries/status/", get(handlers::status))
        .route(
            "/countries/{name}",
            get(handlers::get_country).delete(handlers::delete_country),
        )
        .route(
            "/countries/{name}/",
            get(handlers::get_country).delete(handlers::delete_country),
        )
        .fallback(handlers::endpoint_not_found)
        .layer(middleware::from_fn(json_errors))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Rewrites error responses that are not JSON (axum's own 405s, extractor
/// rejections) into the `{ "error": ... }` shape used everywhere else.
async fn json_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let message = match status {
        StatusCode::NOT_FOUND => "Endpoint not found",
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        s if s.is_server_error() => "Internal server error",
        s => s.canonical_reason().unwrap_or("Bad request"),
    };
    let allow = response.headers().get(header::ALLOW).cloned();

    let mut rewritten = (status, Json(json!({ "error": message }))).into_response();
    if let Some(allow) = allow {
        rewritten.headers_mut().insert(header::ALLOW, allow);
    }
    rewritten
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("handler panicked: {}", details);

    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use chrono::{TimeZone, Utc};
    use lib_countries::{
        CountryRecord, CountrySource, CountryStore, ImageCache, MemoryCountryStore, RateSource, RateTable,
        RefreshCoordinator, SourceError,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct DownCountries;

    #[async_trait]
    impl CountrySource for DownCountries {
        async fn fetch_countries(&self) -> Result<Vec<Value>, SourceError> {
            Err(SourceError::Unavailable {
                failures: vec!["https://countries.invalid/v2: HTTP status 500".to_string()],
            })
        }
    }

    struct FallbackRates;

    #[async_trait]
    impl RateSource for FallbackRates {
        async fn fetch_rates(&self) -> RateTable {
            RateTable::fallback()
        }
    }

    fn record(id: i64, name: &str, region: &str, currency: &str, gdp: Option<f64>) -> CountryRecord {
        CountryRecord {
            id,
            name: name.to_string(),
            capital: None,
            region: Some(region.to_string()),
            population: 1_000_000 * id,
            currency_code: Some(currency.to_string()),
            exchange_rate: gdp.map(|_| 1.0),
            estimated_gdp: gdp,
            flag_url: None,
            last_refreshed_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn test_app() -> (Router, Arc<ImageCache>) {
        let store = Arc::new(MemoryCountryStore::new());
        store
            .seed([
                record(1, "Nigeria", "Africa", "NGN", Some(250.0)),
                record(2, "Ghana", "Africa", "GHS", Some(900.0)),
                record(3, "France", "Europe", "EUR", None),
            ])
            .await;
        let store: Arc<dyn CountryStore> = store;
        let cache = Arc::new(ImageCache::in_memory());
        let coordinator = RefreshCoordinator::new(Arc::new(DownCountries), Arc::new(FallbackRates), store.clone());
        let state = AppState::new(store, Arc::new(coordinator), cache.clone());
        (router(state), cache)
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Response) {
        let request = axum::http::Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_is_case_insensitive_and_accepts_trailing_slash() {
        let (app, _) = test_app().await;

        let (status, response) = send(app.clone(), "GET", "/countries/nIGERIA").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(response).await["name"], "Nigeria");

        let (status, _) = send(app, "GET", "/countries/ghana/").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_then_lookup_is_not_found() {
        let (app, _) = test_app().await;

        let (status, _) = send(app.clone(), "DELETE", "/countries/GHANA").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, response) = send(app.clone(), "GET", "/countries/ghana").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Country not found");

        let (status, _) = send(app, "DELETE", "/countries/ghana").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let (app, _) = test_app().await;

        let (status, response) = send(app.clone(), "GET", "/countries?region=africa&sort=gdp_desc").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(response).await;
        let names: Vec<&str> = body.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Ghana", "Nigeria"]);

        let (_, response) = send(app, "GET", "/countries/?currency=eur").await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_parameters_are_rejected() {
        let (app, _) = test_app().await;

        let (status, response) = send(app.clone(), "GET", "/countries?page=2&sort=capital").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid parameters: page, sort");

        let (_, response) = send(app, "GET", "/countries?page=1&limit=2&page=3").await;
        assert_eq!(json_body(response).await["error"], "Invalid parameters: page, limit");
    }

    #[tokio::test]
    async fn status_reports_count_and_last_refresh() {
        let (app, _) = test_app().await;

        for uri in ["/status", "/countries/status"] {
            let (status, response) = send(app.clone(), "GET", uri).await;
            assert_eq!(status, StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["total_countries"], 3);
            assert!(body["last_refreshed_at"].is_string());
        }
    }

    #[tokio::test]
    async fn unknown_route_and_wrong_method_answer_in_json() {
        let (app, _) = test_app().await;

        let (status, response) = send(app.clone(), "GET", "/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Endpoint not found");

        let (status, response) = send(app, "PUT", "/countries").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(header::ALLOW));
        assert_eq!(json_body(response).await["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn image_is_served_only_once_generated() {
        let (app, cache) = test_app().await;

        let (status, response) = send(app.clone(), "GET", "/countries/image").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Summary image not found");

        cache.store(b"\x89PNG fake".to_vec()).await.unwrap();
        let (status, response) = send(app, "GET", "/countries/image").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn refresh_with_unreachable_source_is_503_and_keeps_data() {
        let (app, _) = test_app().await;

        let (status, response) = send(app.clone(), "POST", "/countries/refresh").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "External data source unavailable");
        assert!(body["details"].as_str().unwrap().contains("HTTP status 500"));

        let (_, response) = send(app, "GET", "/status").await;
        assert_eq!(json_body(response).await["total_countries"], 3);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (app, _) = test_app().await;

        let (status, response) = send(app, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json_body(response).await["endpoints"].is_object());
    }
}
