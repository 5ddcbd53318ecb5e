use super::config::Settings;
use anyhow::Context;
use lib_countries::connections::PgCountryStore;
use lib_countries::imaging::PngSummaryRenderer;
use lib_countries::retrieve::ClientOptions;
use lib_countries::sources::{HttpCountrySource, HttpRateSource};
use lib_countries::{CountryStore, ImageCache, MemoryCountryStore, RefreshCoordinator};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CountryStore>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub image_cache: Arc<ImageCache>,
}

impl AppState {
    pub fn new(store: Arc<dyn CountryStore>, coordinator: Arc<RefreshCoordinator>, image_cache: Arc<ImageCache>) -> Self {
        Self {
            store,
            coordinator,
            image_cache,
        }
    }

    /// Wires the production collaborators from resolved settings.
    ///
    /// The store is PostgreSQL when a database URL is set, in-memory otherwise.
    /// A summary image left by a previous run is loaded into the cache.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        // 1. Store
        let store: Arc<dyn CountryStore> = match &settings.database_url {
            Some(url) => Arc::new(
                PgCountryStore::connect(url, settings.db_max_connections)
                    .await
                    .context("connecting to the country database")?,
            ),
            None => {
                warn!("DATABASE_URL not set; records are kept in memory and lost on restart");
                Arc::new(MemoryCountryStore::new())
            }
        };

        // 2. Upstream sources
        let options = ClientOptions {
            timeout: settings.source_timeout,
            max_retries: settings.source_retries,
        };
        let countries = HttpCountrySource::with_options(&settings.countries_endpoints, options)
            .context("building the country source")?;
        let rates = HttpRateSource::with_options(&settings.rates_endpoints, options)
            .context("building the exchange rate source")?;

        // 3. Summary image cache
        let image_cache = Arc::new(ImageCache::new(&settings.cache_dir));
        match image_cache.load().await {
            Ok(true) => info!(dir = %settings.cache_dir.display(), "serving summary image from a previous run"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "could not read cached summary image"),
        }

        // 4. Refresh coordinator
        let coordinator = RefreshCoordinator::new(Arc::new(countries), Arc::new(rates), store.clone())
            .with_summary(Arc::new(PngSummaryRenderer::new()), image_cache.clone())
            .with_budget(settings.refresh_budget)
            .with_max_errors(settings.max_reported_errors)
            .with_top_n(settings.summary_top_n);

        Ok(Self::new(store, Arc::new(coordinator), image_cache))
    }
}
