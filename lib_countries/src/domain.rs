//! # Country Domain Model
//!
//! The single persisted entity (`CountryRecord`), the reconciled draft that the
//! refresh pipeline hands to a store, and the query types used by the listing
//! endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// # Country Record
///
/// A persisted country. `name` is the natural key; stores compare it
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// Store-assigned surrogate id.
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    /// Units of the local currency per USD.
    pub exchange_rate: Option<f64>,
    /// Present only when `exchange_rate` is present and positive.
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    /// Moment of the upsert that created or last touched this record.
    pub last_refreshed_at: DateTime<Utc>,
}

/// # Country Draft
///
/// The output of reconciliation: every field of a record except the ones the
/// store owns (`id`, `last_refreshed_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDraft {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
}

impl CountryDraft {
    /// Builds the persisted form of this draft.
    pub fn into_record(self, id: i64, refreshed_at: DateTime<Utc>) -> CountryRecord {
        CountryRecord {
            id,
            name: self.name,
            capital: self.capital,
            region: self.region,
            population: self.population,
            currency_code: self.currency_code,
            exchange_rate: self.exchange_rate,
            estimated_gdp: self.estimated_gdp,
            flag_url: self.flag_url,
            last_refreshed_at: refreshed_at,
        }
    }
}

/// Whether an upsert created a new record or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// # Sort Order
///
/// Orderings accepted by the listing endpoint's `sort` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    GdpDesc,
    GdpAsc,
    #[default]
    NameAsc,
    NameDesc,
    PopulationDesc,
    PopulationAsc,
}

impl SortOrder {
    /// Every accepted wire value, in documentation order.
    pub const ALL: [SortOrder; 6] = [
        SortOrder::GdpDesc,
        SortOrder::GdpAsc,
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::PopulationDesc,
        SortOrder::PopulationAsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::GdpDesc => "gdp_desc",
            SortOrder::GdpAsc => "gdp_asc",
            SortOrder::NameAsc => "name_asc",
            SortOrder::NameDesc => "name_desc",
            SortOrder::PopulationDesc => "population_desc",
            SortOrder::PopulationAsc => "population_asc",
        }
    }

    /// GDP orderings leave out records that have no estimate.
    pub fn requires_gdp(&self) -> bool {
        matches!(self, SortOrder::GdpDesc | SortOrder::GdpAsc)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a `sort` value is not one of [`SortOrder::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortOrder(pub String);

impl fmt::Display for UnknownSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort order '{}'", self.0)
    }
}

impl std::error::Error for UnknownSortOrder {}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == wanted)
            .ok_or_else(|| UnknownSortOrder(s.to_string()))
    }
}

/// # Country Query
///
/// Filters and ordering for a listing. Filters are case-insensitive exact
/// matches; `None` means "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryQuery {
    pub region: Option<String>,
    pub currency: Option<String>,
    pub sort: SortOrder,
}

/// Aggregate view of the store used by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub total_countries: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_parses_every_wire_value() {
        for order in SortOrder::ALL {
            assert_eq!(order.as_str().parse::<SortOrder>(), Ok(order));
        }
        assert_eq!("GDP_DESC".parse::<SortOrder>(), Ok(SortOrder::GdpDesc));
    }

    #[test]
    fn sort_order_rejects_unknown_values() {
        let err = "capital_asc".parse::<SortOrder>().unwrap_err();
        assert_eq!(err, UnknownSortOrder("capital_asc".to_string()));
    }

    #[test]
    fn default_sort_is_name_ascending() {
        assert_eq!(CountryQuery::default().sort, SortOrder::NameAsc);
    }

    #[test]
    fn record_serializes_with_snake_case_fields() {
        let refreshed_at = Utc::now();
        let record = CountryDraft {
            name: "Ghana".into(),
            capital: Some("Accra".into()),
            region: Some("Africa".into()),
            population: 31_072_940,
            currency_code: Some("GHS".into()),
            exchange_rate: Some(15.34),
            estimated_gdp: None,
            flag_url: None,
        }
        .into_record(7, refreshed_at);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["currency_code"], "GHS");
        assert!(json["estimated_gdp"].is_null());
        assert!(json.get("last_refreshed_at").is_some());
    }
}
