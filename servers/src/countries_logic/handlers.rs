//! # Country Handlers
//!
//! One `axum` handler per endpoint. Handlers only translate between HTTP and
//! the library: parameter validation, status codes and JSON shapes.

use super::error::AppError;
use super::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use lib_countries::{CountryQuery, CountryRecord, SortOrder, StoreStatus};
use serde_json::{Value, json};
use tracing::info;

/// `GET /`: service name, version and the endpoint list.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "Country Currency & Exchange API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "refresh": "POST /countries/refresh",
            "list": "GET /countries?region=&currency=&sort=",
            "country": "GET /countries/{name}",
            "delete": "DELETE /countries/{name}",
            "status": "GET /status",
            "image": "GET /countries/image",
        }
    }))
}

/// `POST /countries/refresh`: runs a full refresh inside the request.
pub async fn refresh_countries(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    info!("refresh requested");
    let report = state.coordinator.refresh().await?;

    Ok(Json(json!({
        "message": "Countries refreshed successfully",
        "created": report.created,
        "updated": report.updated,
        "failed": report.failed,
        "total_processed": report.total_processed,
        "total_countries": report.total_countries,
        "errors": report.errors,
        "rates_source": report.rates_origin.to_string(),
        "image_generated": report.image_generated,
    })))
}

/// `GET /countries`: filtered and sorted listing.
///
/// Only `region`, `currency` and `sort` are accepted; anything else, or a
/// `sort` value that is not a known ordering, is a 400 naming the offenders.
pub async fn list_countries(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<CountryRecord>>, AppError> {
    let query = parse_list_query(&params)?;
    let records = state.store.list(&query).await?;
    Ok(Json(records))
}

/// `GET /countries/{name}`: case-insensitive lookup.
pub async fn get_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CountryRecord>, AppError> {
    state
        .store
        .find_by_name(&name)
        .await?
        .map(Json)
        .ok_or(AppError::CountryNotFound)
}

/// `DELETE /countries/{name}`: case-insensitive hard delete.
pub async fn delete_country(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, AppError> {
    if state.store.delete_by_name(&name).await? {
        info!(country = %name, "country deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::CountryNotFound)
    }
}

/// `GET /status` and `GET /countries/status`.
pub async fn status(State(state): State<AppState>) -> Result<Json<StoreStatus>, AppError> {
    Ok(Json(state.store.status().await?))
}

/// `GET /countries/image`: the last generated summary image.
pub async fn summary_image(State(state): State<AppState>) -> Result<Response, AppError> {
    let bytes = state.image_cache.get().await.ok_or(AppError::ImageNotFound)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes.as_ref().clone()).into_response())
}

/// Fallback for unknown routes.
pub async fn endpoint_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

/// Validates raw listing parameters. Blank filter values mean "no filter".
fn parse_list_query(params: &[(String, String)]) -> Result<CountryQuery, AppError> {
    let mut invalid: Vec<String> = Vec::new();
    let mut query = CountryQuery::default();

    for (key, value) in params {
        let value = value.trim();
        let accepted = match key.as_str() {
            "region" => {
                query.region = Some(value.to_string()).filter(|v| !v.is_empty());
                true
            }
            "currency" => {
                query.currency = Some(value.to_string()).filter(|v| !v.is_empty());
                true
            }
            "sort" if value.is_empty() => {
                query.sort = SortOrder::default();
                true
            }
            "sort" => value.parse::<SortOrder>().map(|sort| query.sort = sort).is_ok(),
            _ => false,
        };
        // Each offender is named once, in order of first appearance.
        if !accepted && !invalid.contains(key) {
            invalid.push(key.clone());
        }
    }

    if invalid.is_empty() {
        Ok(query)
    } else {
        Err(AppError::InvalidParameters(invalid))
    }
}
