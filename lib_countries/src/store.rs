//! # Country Store
//!
//! Persistence seam for country records, keyed by case-insensitive name.
//! `MemoryCountryStore` lives here; the PostgreSQL store is in
//! `connections::db_postgres` behind the `connections` feature.

use crate::domain::{CountryDraft, CountryQuery, CountryRecord, SortOrder, StoreStatus, UpsertOutcome};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// Keyed persistence for country records.
///
/// Implementations must serialize concurrent upserts of the same name so that
/// only one of them reports [`UpsertOutcome::Inserted`].
#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Inserts or overwrites the record whose name matches `draft.name`
    /// case-insensitively, stamping it with `refreshed_at`.
    async fn upsert(&self, draft: &CountryDraft, refreshed_at: DateTime<Utc>) -> Result<UpsertOutcome, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<CountryRecord>, StoreError>;

    async fn list(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, StoreError>;

    /// Returns `false` when no record matched.
    async fn delete_by_name(&self, name: &str) -> Result<bool, StoreError>;

    async fn status(&self) -> Result<StoreStatus, StoreError>;
}

/// The lookup key for a name.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// # Memory Country Store
///
/// An in-process store. Used by the tests and by the server when no database
/// URL is configured; contents are lost on restart.
#[derive(Default)]
pub struct MemoryCountryStore {
    records: RwLock<BTreeMap<String, CountryRecord>>,
    next_id: AtomicI64,
}

impl MemoryCountryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts records as-is, replacing any with the same name. For seeding.
    pub async fn seed(&self, records: impl IntoIterator<Item = CountryRecord>) {
        let mut guard = self.records.write().await;
        for record in records {
            self.next_id.fetch_max(record.id, AtomicOrdering::SeqCst);
            guard.insert(name_key(&record.name), record);
        }
    }
}

#[async_trait]
impl CountryStore for MemoryCountryStore {
    async fn upsert(&self, draft: &CountryDraft, refreshed_at: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        let key = name_key(&draft.name);
        if key.is_empty() {
            return Err(StoreError::Constraint("name must not be empty".to_string()));
        }
        if draft.population < 0 {
            return Err(StoreError::Constraint(format!("population {} is negative", draft.population)));
        }

        let mut guard = self.records.write().await;
        match guard.get_mut(&key) {
            Some(existing) => {
                let id = existing.id;
                *existing = draft.clone().into_record(id, refreshed_at);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                guard.insert(key, draft.clone().into_record(id, refreshed_at));
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CountryRecord>, StoreError> {
        Ok(self.records.read().await.get(&name_key(name)).cloned())
    }

    async fn list(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, StoreError> {
        let region = query.region.as_deref().map(str::to_lowercase);
        let currency = query.currency.as_deref().map(str::to_lowercase);

        let mut rows: Vec<CountryRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| matches_filter(r.region.as_deref(), region.as_deref()))
            .filter(|r| matches_filter(r.currency_code.as_deref(), currency.as_deref()))
            .filter(|r| !query.sort.requires_gdp() || r.estimated_gdp.is_some())
            .cloned()
            .collect();

        rows.sort_by(|a, b| compare(a, b, query.sort));
        Ok(rows)
    }

    async fn delete_by_name(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&name_key(name)).is_some())
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let guard = self.records.read().await;
        Ok(StoreStatus {
            total_countries: guard.len() as u64,
            last_refreshed_at: guard.values().map(|r| r.last_refreshed_at).max(),
        })
    }
}

fn matches_filter(value: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => value.is_some_and(|v| v.to_lowercase() == wanted),
    }
}

fn compare(a: &CountryRecord, b: &CountryRecord, sort: SortOrder) -> Ordering {
    let gdp = |r: &CountryRecord| r.estimated_gdp.unwrap_or(f64::NEG_INFINITY);
    let primary = match sort {
        SortOrder::GdpDesc => gdp(b).total_cmp(&gdp(a)),
        SortOrder::GdpAsc => gdp(a).total_cmp(&gdp(b)),
        SortOrder::NameAsc => a.name.cmp(&b.name),
        SortOrder::NameDesc => b.name.cmp(&a.name),
        SortOrder::PopulationDesc => b.population.cmp(&a.population),
        SortOrder::PopulationAsc => a.population.cmp(&b.population),
    };
    primary.then_with(|| a.name.cmp(&b.name))
}
