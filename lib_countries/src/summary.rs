//! # Summary Image
//!
//! The data behind the summary image and the cache that serves it.
//!
//! - **`SummarySnapshot`**: totals, the top countries by estimated GDP and the
//!   last refresh time, read from a [`CountryStore`].
//! - **`SummaryRenderer`**: snapshot → encoded image bytes. Implementations are
//!   pure; the PNG one lives in `imaging` behind the `imaging` feature.
//! - **`ImageCache`**: the most recent rendering, kept in memory and mirrored to
//!   disk so a restart keeps serving it.

use crate::domain::{CountryQuery, SortOrder};
use crate::errors::{ImageError, StoreError};
use crate::store::CountryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// File name of the cached image inside the cache directory.
pub const SUMMARY_FILE_NAME: &str = "summary.png";

/// One row of the top-N list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCountry {
    pub name: String,
    pub estimated_gdp: f64,
}

/// # Summary Snapshot
///
/// What the summary image shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySnapshot {
    pub total_countries: u64,
    /// Highest estimated GDP first. Records without an estimate never appear.
    pub top: Vec<TopCountry>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

impl SummarySnapshot {
    /// Reads totals and the `top_n` highest estimates from `store`.
    ///
    /// # Errors
    /// Propagates the store's error.
    pub async fn from_store(store: &dyn CountryStore, top_n: usize) -> Result<Self, StoreError> {
        let status = store.status().await?;
        let ranked = store
            .list(&CountryQuery {
                sort: SortOrder::GdpDesc,
                ..Default::default()
            })
            .await?;

        let top = ranked
            .into_iter()
            .filter_map(|r| r.estimated_gdp.map(|gdp| TopCountry { name: r.name, estimated_gdp: gdp }))
            .take(top_n)
            .collect();

        Ok(Self {
            total_countries: status.total_countries,
            top,
            last_refreshed_at: status.last_refreshed_at,
            generated_at: Utc::now(),
        })
    }
}

/// Renders a snapshot to an encoded image.
pub trait SummaryRenderer: Send + Sync {
    fn render(&self, snapshot: &SummarySnapshot) -> Result<Vec<u8>, ImageError>;
}

/// # Image Cache
///
/// Holds the last rendered summary. `get` returns `None` until something has
/// been stored or loaded.
#[derive(Debug, Default)]
pub struct ImageCache {
    path: Option<PathBuf>,
    bytes: RwLock<Option<Arc<Vec<u8>>>>,
}

impl ImageCache {
    /// A cache mirrored to `<cache_dir>/summary.png`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Some(cache_dir.as_ref().join(SUMMARY_FILE_NAME)),
            bytes: RwLock::new(None),
        }
    }

    /// A cache that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads a previously written image, if the file exists.
    ///
    /// # Returns
    /// `true` when an image was loaded.
    pub async fn load(&self) -> Result<bool, ImageError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        match tokio::fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => {
                info!(path = %path.display(), size = bytes.len(), "loaded cached summary image");
                *self.bytes.write().await = Some(Arc::new(bytes));
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the cached image, writing the file first when disk-backed.
    pub async fn store(&self, bytes: Vec<u8>) -> Result<(), ImageError> {
        if let Some(path) = &self.path {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(path, &bytes).await?;
            debug!(path = %path.display(), size = bytes.len(), "summary image written");
        }
        *self.bytes.write().await = Some(Arc::new(bytes));
        Ok(())
    }

    pub async fn get(&self) -> Option<Arc<Vec<u8>>> {
        self.bytes.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CountryDraft;
    use crate::store::MemoryCountryStore;

    fn draft(name: &str, gdp: Option<f64>) -> CountryDraft {
        CountryDraft {
            name: name.to_string(),
            capital: None,
            region: None,
            population: 1,
            currency_code: None,
            exchange_rate: gdp.map(|_| 1.0),
            estimated_gdp: gdp,
            flag_url: None,
        }
    }

    #[tokio::test]
    async fn snapshot_takes_top_n_by_gdp() {
        let store = MemoryCountryStore::new();
        let now = Utc::now();
        for (name, gdp) in [("A", Some(1.0)), ("B", Some(3.0)), ("C", None), ("D", Some(2.0))] {
            store.upsert(&draft(name, gdp), now).await.unwrap();
        }

        let snapshot = SummarySnapshot::from_store(&store, 2).await.unwrap();

        assert_eq!(snapshot.total_countries, 4);
        assert_eq!(
            snapshot.top.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            ["B", "D"]
        );
        assert_eq!(snapshot.last_refreshed_at, Some(now));
    }

    #[tokio::test]
    async fn cache_is_empty_until_stored() {
        let cache = ImageCache::in_memory();
        assert!(cache.get().await.is_none());
        assert!(!cache.load().await.unwrap());

        cache.store(vec![1, 2, 3]).await.unwrap();
        assert_eq!(cache.get().await.unwrap().as_slice(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn disk_cache_survives_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");

        let first = ImageCache::new(&cache_dir);
        assert!(!first.load().await.unwrap());
        first.store(vec![9, 8, 7]).await.unwrap();
        assert!(cache_dir.join(SUMMARY_FILE_NAME).exists());

        let second = ImageCache::new(&cache_dir);
        assert!(second.load().await.unwrap());
        assert_eq!(second.get().await.unwrap().as_slice(), &[9, 8, 7]);
    }
}
