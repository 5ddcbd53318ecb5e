//! # External Data Sources
//!
//! Seams for the two upstream data sets the refresh pipeline consumes.
//!
//! - **`RateSource`** yields a currency → USD rate table and never fails: when
//!   every endpoint is down it answers with [`RateTable::fallback`].
//! - **`CountrySource`** yields the raw country list and fails with
//!   [`SourceError::Unavailable`] when every endpoint is down.
//!
//! The HTTP-backed implementations (`rates`, `countries`) walk an ordered list
//! of endpoints and stop at the first usable answer. They live behind the
//! `retrieve` feature; the payload checks below are always compiled so the
//! pipeline can be exercised with in-process sources.

use crate::errors::SourceError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "retrieve")]
pub mod chain;
#[cfg(feature = "retrieve")]
pub mod countries;
#[cfg(feature = "retrieve")]
pub mod rates;

#[cfg(feature = "retrieve")]
pub use countries::HttpCountrySource;
#[cfg(feature = "retrieve")]
pub use rates::HttpRateSource;

/// Rates served when no endpoint answers. Approximate units per USD.
const FALLBACK_RATES: [(&str, f64); 8] = [
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("JPY", 150.0),
    ("CNY", 7.2),
    ("INR", 83.0),
    ("NGN", 1600.0),
    ("GHS", 15.0),
];

/// Where a rate table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateOrigin {
    /// Fetched from the named endpoint.
    Live { endpoint: String },
    /// Static table; every endpoint failed.
    Fallback,
}

impl fmt::Display for RateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateOrigin::Live { endpoint } => write!(f, "live ({endpoint})"),
            RateOrigin::Fallback => f.write_str("fallback"),
        }
    }
}

/// # Rate Table
///
/// Currency code → units of that currency per USD. Only positive, finite
/// rates are ever stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<String, f64>,
    origin: RateOrigin,
}

impl RateTable {
    /// Builds a table, dropping entries that are not positive and finite.
    pub fn new(rates: impl IntoIterator<Item = (String, f64)>, origin: RateOrigin) -> Self {
        let rates = rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .collect();
        Self { rates, origin }
    }

    /// The static best-effort table. Always contains `USD → 1.0`.
    pub fn fallback() -> Self {
        Self::new(
            FALLBACK_RATES.iter().map(|(code, rate)| (code.to_string(), *rate)),
            RateOrigin::Fallback,
        )
    }

    /// Looks up a rate, trying the code as given and then upper-cased.
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates
            .get(code)
            .or_else(|| self.rates.get(&code.to_ascii_uppercase()))
            .copied()
    }

    pub fn origin(&self) -> &RateOrigin {
        &self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == RateOrigin::Fallback
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Source of currency → USD exchange rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Best-effort rates. Implementations must not fail; they fall back to
    /// [`RateTable::fallback`] instead.
    async fn fetch_rates(&self) -> RateTable;
}

/// Source of raw country entries.
#[async_trait]
pub trait CountrySource: Send + Sync {
    /// A fresh, non-empty list of raw entries in whatever shape the answering
    /// endpoint emits.
    async fn fetch_countries(&self) -> Result<Vec<Value>, SourceError>;
}

/// # Extract Rates
///
/// Pulls the rate map out of an exchange-rate payload. Accepted shapes:
///
/// - `{"result": "success", "rates": {...}}`
/// - `{"rates": {...}}` (no `result` key)
/// - a flat `{"EUR": 0.92, ...}` map
///
/// A payload whose `result` is present but not `"success"`, or whose map has no
/// positive numeric entry, yields an error string describing why.
pub fn extract_rates(payload: &Value) -> Result<HashMap<String, f64>, String> {
    let object = payload
        .as_object()
        .ok_or_else(|| "payload is not a JSON object".to_string())?;

    if let Some(result) = object.get("result") {
        if result.as_str() != Some("success") {
            return Err(format!("upstream reported result {result}"));
        }
    }

    let rate_map = match object.get("rates") {
        Some(Value::Object(rates)) => rates,
        Some(_) => return Err("'rates' is not an object".to_string()),
        None => object,
    };

    let rates: HashMap<String, f64> = rate_map
        .iter()
        .filter_map(|(code, value)| value.as_f64().map(|rate| (code.clone(), rate)))
        .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
        .collect();

    if rates.is_empty() {
        return Err("rate map is empty".to_string());
    }
    Ok(rates)
}

/// # Extract Countries
///
/// Accepts a country payload only if it is a non-empty JSON array.
pub fn extract_countries(payload: Value) -> Result<Vec<Value>, String> {
    match payload {
        Value::Array(entries) if !entries.is_empty() => Ok(entries),
        Value::Array(_) => Err("country list is empty".to_string()),
        other => Err(format!("expected a JSON array, got {}", json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_table_always_has_usd() {
        let table = RateTable::fallback();
        assert_eq!(table.get("USD"), Some(1.0));
        assert!(table.is_fallback());
    }

    #[test]
    fn table_drops_non_positive_rates_and_matches_case_insensitively() {
        let table = RateTable::new(
            vec![("NGN".to_string(), 1600.23), ("XXX".to_string(), 0.0), ("BAD".to_string(), f64::NAN)],
            RateOrigin::Live { endpoint: "test".into() },
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("ngn"), Some(1600.23));
        assert_eq!(table.get("XXX"), None);
    }

    #[test]
    fn extracts_success_envelope() {
        let rates = extract_rates(&json!({"result": "success", "rates": {"USD": 1, "EUR": 0.92}})).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates["USD"], 1.0);
    }

    #[test]
    fn extracts_bare_rates_and_flat_maps() {
        let bare = extract_rates(&json!({"base": "USD", "rates": {"GHS": 15.34}})).unwrap();
        assert_eq!(bare["GHS"], 15.34);

        let flat = extract_rates(&json!({"NGN": 1600.23, "note": "ignored"})).unwrap();
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn rejects_error_results_and_empty_maps() {
        assert!(extract_rates(&json!({"result": "error", "rates": {"USD": 1}})).is_err());
        assert!(extract_rates(&json!({"rates": {}})).is_err());
        assert!(extract_rates(&json!({"rates": [1, 2]})).is_err());
        assert!(extract_rates(&json!([1, 2])).is_err());
    }

    #[test]
    fn countries_payload_must_be_non_empty_array() {
        assert_eq!(extract_countries(json!([{"name": "Ghana"}])).unwrap().len(), 1);
        assert!(extract_countries(json!([])).is_err());
        assert!(extract_countries(json!({"status": 404})).unwrap_err().contains("an object"));
    }
}
