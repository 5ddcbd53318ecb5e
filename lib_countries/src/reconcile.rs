//! # Record Reconciler
//!
//! Turns one raw country entry plus the current rate table into a
//! [`CountryDraft`]. Pure: no I/O, no shared state; randomness comes from the
//! caller's generator.
//!
//! Upstream schemas differ between API versions, so every field is read
//! through a small set of accepted shapes:
//!
//! | field | accepted shapes |
//! |---|---|
//! | name | `"Ghana"`, `{"common": "Ghana", "official": "Republic of Ghana"}` |
//! | capital | `"Accra"`, `["Accra"]` |
//! | flag | `"flag": url`, `"flags": {"png"/"svg": url}`, `"flags": [url]` |
//! | currencies | `[{"code"/"currency_code"/"id": "GHS"}]`, `{"GHS": {...}}` |

use crate::domain::CountryDraft;
use crate::errors::ReconcileError;
use crate::sources::RateTable;
use rand::Rng;
use serde_json::{Map, Value};
use std::ops::Range;

/// Range the GDP multiplier is drawn from, uniformly.
pub const GDP_MULTIPLIER: Range<f64> = 1000.0..2000.0;

const CURRENCY_CODE_KEYS: [&str; 3] = ["code", "currency_code", "id"];
const CURRENCY_CODE_LEN: std::ops::RangeInclusive<usize> = 3..=10;

/// # Reconcile
///
/// Normalizes `raw` and derives `exchange_rate` and `estimated_gdp`.
///
/// - `exchange_rate` is the table entry for the extracted currency code, if any.
/// - `estimated_gdp` is `population × m / exchange_rate` with `m` drawn from
///   [`GDP_MULTIPLIER`], rounded to cents; absent whenever the rate or the
///   population is.
///
/// The estimate is deliberately noisy: the same input yields a different value
/// on every call, bounded by `population × 1000 / rate` and
/// `population × 2000 / rate`.
///
/// # Errors
/// Entries that are not objects, have no usable name, or carry a negative or
/// non-numeric population are rejected. A missing population is stored as 0
/// and leaves the estimate absent.
pub fn reconcile<R: Rng + ?Sized>(
    raw: &Value,
    rates: &RateTable,
    rng: &mut R,
) -> Result<CountryDraft, ReconcileError> {
    let entry = raw.as_object().ok_or(ReconcileError::NotAnObject)?;

    let name = extract_name(entry).ok_or(ReconcileError::MissingName)?;
    let population = extract_population(entry)?;
    let currency_code = extract_currency_code(entry);
    let exchange_rate = currency_code.as_deref().and_then(|code| rates.get(code));
    let estimated_gdp = match (population, exchange_rate) {
        (Some(population), Some(rate)) => estimate_gdp(population, rate, rng),
        _ => None,
    };

    Ok(CountryDraft {
        name,
        capital: extract_capital(entry),
        region: non_empty_str(entry.get("region")),
        population: population.unwrap_or(0),
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: extract_flag(entry),
    })
}

/// `population × multiplier / rate`, rounded to 2 decimals. `None` unless the
/// rate is positive and finite.
pub fn estimate_gdp<R: Rng + ?Sized>(population: i64, rate: f64, rng: &mut R) -> Option<f64> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    let multiplier = rng.random_range(GDP_MULTIPLIER);
    Some(round_cents(population as f64 * multiplier / rate))
}

/// Best-effort display name of a raw entry, for error messages.
pub fn entry_label(raw: &Value) -> Option<String> {
    raw.as_object().and_then(extract_name)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_name(entry: &Map<String, Value>) -> Option<String> {
    match entry.get("name")? {
        Value::Object(variants) => ["common", "official"]
            .iter()
            .find_map(|key| non_empty_str(variants.get(*key))),
        other => non_empty_str(Some(other)),
    }
}

fn extract_capital(entry: &Map<String, Value>) -> Option<String> {
    match entry.get("capital")? {
        Value::Array(items) => non_empty_str(items.first()),
        other => non_empty_str(Some(other)),
    }
}

/// `Ok(None)` when the entry carries no population at all.
fn extract_population(entry: &Map<String, Value>) -> Result<Option<i64>, ReconcileError> {
    let value = match entry.get("population") {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    if let Some(n) = value.as_i64() {
        return if n >= 0 {
            Ok(Some(n))
        } else {
            Err(ReconcileError::InvalidPopulation(n.to_string()))
        };
    }

    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64 => Ok(Some(f as i64)),
        _ => Err(ReconcileError::InvalidPopulation(value.to_string())),
    }
}

fn extract_flag(entry: &Map<String, Value>) -> Option<String> {
    if let Some(flag) = non_empty_str(entry.get("flag")) {
        // v3.1 also has an emoji "flag"; keep only URLs.
        if flag.contains("://") {
            return Some(flag);
        }
    }
    match entry.get("flags")? {
        Value::Object(variants) => ["png", "svg"]
            .iter()
            .find_map(|key| non_empty_str(variants.get(*key))),
        Value::Array(items) => items.iter().find_map(|item| non_empty_str(Some(item))),
        other => non_empty_str(Some(other)),
    }
}

fn extract_currency_code(entry: &Map<String, Value>) -> Option<String> {
    let code = match entry.get("currencies")? {
        Value::Array(items) => {
            let first = items.first()?.as_object()?;
            CURRENCY_CODE_KEYS
                .iter()
                .find_map(|key| non_empty_str(first.get(*key)))
        }
        Value::Object(by_code) => by_code.keys().next().map(|code| code.trim().to_string()),
        _ => None,
    }?;

    CURRENCY_CODE_LEN.contains(&code.chars().count()).then_some(code)
}
