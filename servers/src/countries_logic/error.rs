use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lib_countries::{RefreshError, StoreError};
use serde_json::json;
use tracing::error;

/// # Application Error
///
/// Every failure a handler can return. Each variant maps to one status code
/// and a JSON body with at least an `error` key.
#[derive(Debug)]
pub enum AppError {
    /// No country with the requested name.
    CountryNotFound,
    /// The summary image has not been generated yet.
    ImageNotFound,
    /// Unknown query parameters or invalid values, by parameter name.
    InvalidParameters(Vec<String>),
    /// No country endpoint answered during a refresh.
    SourceUnavailable(String),
    /// A refresh ran past its budget.
    RefreshTimeout(String),
    /// Anything else. Details are logged, never returned.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::CountryNotFound => (StatusCode::NOT_FOUND, json!({ "error": "Country not found" })),
            AppError::ImageNotFound => (StatusCode::NOT_FOUND, json!({ "error": "Summary image not found" })),
            AppError::InvalidParameters(names) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Invalid parameters: {}", names.join(", ")) }),
            ),
            AppError::SourceUnavailable(details) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "External data source unavailable", "details": details }),
            ),
            AppError::RefreshTimeout(details) => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": "Refresh timed out", "details": details }),
            ),
            AppError::Internal(details) => {
                error!("Internal error: {}", details);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error" }))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::CountryNotFound => write!(f, "Country not found"),
            AppError::ImageNotFound => write!(f, "Summary image not found"),
            AppError::InvalidParameters(names) => write!(f, "Invalid parameters: {}", names.join(", ")),
            AppError::SourceUnavailable(d) => write!(f, "External data source unavailable: {}", d),
            AppError::RefreshTimeout(d) => write!(f, "Refresh timed out: {}", d),
            AppError::Internal(d) => write!(f, "Internal error: {}", d),
        }
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<RefreshError> for AppError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::SourceUnavailable { .. } => AppError::SourceUnavailable(e.to_string()),
            RefreshError::Timeout { .. } => AppError::RefreshTimeout(e.to_string()),
            RefreshError::Store(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn refresh_errors_map_to_distinct_statuses() {
        let unavailable: AppError = RefreshError::SourceUnavailable { failures: vec!["x: down".into()] }.into();
        let timeout: AppError = RefreshError::Timeout { budget: Duration::from_secs(45) }.into();

        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn internal_details_are_not_exposed_in_status() {
        let response = AppError::from(StoreError::QueryError("relation missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
