//! # Refresh Coordinator
//!
//! Runs one refresh: fetch countries, fetch rates, reconcile and upsert every
//! entry, then regenerate the summary image.
//!
//! ## Failure policy
//! - Country source down: the refresh fails before anything is written.
//! - Rate source down: the fallback table is used; the refresh proceeds.
//! - One entry fails to reconcile or upsert: it is counted and reported, the
//!   loop continues.
//! - Fetch plus loop exceed the budget: the refresh fails with a timeout.
//!   Records upserted before that point stay written.
//! - Image generation fails: noted in the report; the refresh still succeeds.

use crate::domain::UpsertOutcome;
use crate::errors::RefreshError;
use crate::reconcile::{entry_label, reconcile};
use crate::sources::{CountrySource, RateOrigin, RateSource};
use crate::store::CountryStore;
use crate::summary::{ImageCache, SummaryRenderer, SummarySnapshot};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Wall-clock budget for fetching and the upsert loop.
pub const DEFAULT_REFRESH_BUDGET: Duration = Duration::from_secs(45);
/// How many per-entry error messages a report keeps.
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 10;
/// How many countries the summary image ranks.
pub const DEFAULT_SUMMARY_TOP_N: usize = 5;

/// # Refresh Report
///
/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    /// Upserts that inserted a new record.
    ///
    /// Counts are per upsert, not per distinct record: a name that appears
    /// twice in one batch (say "Congo" and "CONGO") is counted once here and
    /// once under `updated`, and the later entry's values are the ones kept.
    pub created: u64,
    /// Upserts that overwrote a record, including one inserted earlier in the
    /// same batch.
    pub updated: u64,
    /// Entries attempted, successful or not.
    pub total_processed: u64,
    /// Entries that failed to reconcile or upsert.
    pub failed: u64,
    /// The first few failure messages, `"<name or #index>: <reason>"`, plus an
    /// image generation failure if any.
    pub errors: Vec<String>,
    /// Records in the store once the loop finished.
    pub total_countries: u64,
    pub rates_origin: RateOrigin,
    pub image_generated: bool,
}

impl RefreshReport {
    fn new(rates_origin: RateOrigin) -> Self {
        Self {
            created: 0,
            updated: 0,
            total_processed: 0,
            failed: 0,
            errors: Vec::new(),
            total_countries: 0,
            rates_origin,
            image_generated: false,
        }
    }

    fn record_failure(&mut self, label: String, reason: impl fmt::Display, max_errors: usize) {
        self.failed += 1;
        if self.errors.len() < max_errors {
            self.errors.push(format!("{label}: {reason}"));
        }
    }
}

/// Refresh states, logged at `debug` as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    FetchingCountries,
    FetchingRates,
    Reconciling,
    GeneratingImage,
    Done,
    FailedSourceUnavailable,
    FailedTimeout,
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefreshState::Idle => "Idle",
            RefreshState::FetchingCountries => "FetchingCountries",
            RefreshState::FetchingRates => "FetchingRates",
            RefreshState::Reconciling => "Reconciling",
            RefreshState::GeneratingImage => "GeneratingImage",
            RefreshState::Done => "Done",
            RefreshState::FailedSourceUnavailable => "Failed(SourceUnavailable)",
            RefreshState::FailedTimeout => "Failed(Timeout)",
        };
        f.write_str(name)
    }
}

/// # Refresh Coordinator
///
/// Owns the collaborators of a refresh. Cheap to share behind an `Arc`;
/// overlapping `refresh` calls are allowed and interleave per record.
pub struct RefreshCoordinator {
    countries: Arc<dyn CountrySource>,
    rates: Arc<dyn RateSource>,
    store: Arc<dyn CountryStore>,
    renderer: Option<Arc<dyn SummaryRenderer>>,
    image_cache: Option<Arc<ImageCache>>,
    rng: Mutex<StdRng>,
    budget: Duration,
    max_errors: usize,
    top_n: usize,
}

impl RefreshCoordinator {
    pub fn new(countries: Arc<dyn CountrySource>, rates: Arc<dyn RateSource>, store: Arc<dyn CountryStore>) -> Self {
        Self {
            countries,
            rates,
            store,
            renderer: None,
            image_cache: None,
            rng: Mutex::new(StdRng::from_os_rng()),
            budget: DEFAULT_REFRESH_BUDGET,
            max_errors: DEFAULT_MAX_REPORTED_ERRORS,
            top_n: DEFAULT_SUMMARY_TOP_N,
        }
    }

    /// Regenerates the summary image after each refresh.
    pub fn with_summary(mut self, renderer: Arc<dyn SummaryRenderer>, cache: Arc<ImageCache>) -> Self {
        self.renderer = Some(renderer);
        self.image_cache = Some(cache);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Replaces the GDP multiplier generator, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// # Refresh
    ///
    /// Runs one full refresh.
    ///
    /// # Errors
    /// - [`RefreshError::SourceUnavailable`] if no country endpoint answered.
    /// - [`RefreshError::Timeout`] if fetching and upserting exceeded the budget.
    /// - [`RefreshError::Store`] if the final record count could not be read.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();
        transition(RefreshState::Idle);

        let mut report = match tokio::time::timeout(self.budget, self.fetch_and_upsert()).await {
            Ok(result) => result?,
            Err(_) => {
                transition(RefreshState::FailedTimeout);
                warn!(budget_secs = self.budget.as_secs_f64(), "refresh timed out");
                return Err(RefreshError::Timeout { budget: self.budget });
            }
        };

        transition(RefreshState::GeneratingImage);
        report.image_generated = match self.regenerate_image().await {
            Ok(generated) => generated,
            Err(reason) => {
                warn!(%reason, "summary image generation failed");
                report.errors.push(format!("summary image: {reason}"));
                false
            }
        };

        report.total_countries = self.store.status().await?.total_countries;
        transition(RefreshState::Done);

        info!(
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            total_processed = report.total_processed,
            total_countries = report.total_countries,
            rates = %report.rates_origin,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh completed"
        );
        Ok(report)
    }

    async fn fetch_and_upsert(&self) -> Result<RefreshReport, RefreshError> {
        // 1. Countries first: without them there is nothing to do.
        transition(RefreshState::FetchingCountries);
        let entries = self.countries.fetch_countries().await.map_err(|e| {
            transition(RefreshState::FailedSourceUnavailable);
            warn!(error = %e, "country source unavailable");
            RefreshError::from(e)
        })?;

        // 2. Rates never fail.
        transition(RefreshState::FetchingRates);
        let rates = self.rates.fetch_rates().await;
        if rates.is_fallback() {
            warn!(currencies = rates.len(), "using fallback exchange rates");
        }

        // 3. Reconcile and upsert, one entry at a time.
        transition(RefreshState::Reconciling);
        let mut report = RefreshReport::new(rates.origin().clone());

        for (index, raw) in entries.iter().enumerate() {
            report.total_processed += 1;
            let label = || entry_label(raw).unwrap_or_else(|| format!("#{index}"));

            let reconciled = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                reconcile(raw, &rates, &mut *rng)
            };
            let draft = match reconciled {
                Ok(draft) => draft,
                Err(e) => {
                    let label = label();
                    warn!(entry = %label, error = %e, "skipping country entry");
                    report.record_failure(label, e, self.max_errors);
                    continue;
                }
            };

            match self.store.upsert(&draft, Utc::now()).await {
                Ok(UpsertOutcome::Inserted) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!(country = %draft.name, error = %e, "upsert failed");
                    report.record_failure(draft.name, e, self.max_errors);
                }
            }
        }

        Ok(report)
    }

    /// Renders and caches the summary. `Ok(false)` when no renderer is set.
    async fn regenerate_image(&self) -> Result<bool, String> {
        let (Some(renderer), Some(cache)) = (&self.renderer, &self.image_cache) else {
            debug!("no summary renderer configured; skipping image");
            return Ok(false);
        };

        let snapshot = SummarySnapshot::from_store(self.store.as_ref(), self.top_n)
            .await
            .map_err(|e| e.to_string())?;
        let bytes = renderer.render(&snapshot).map_err(|e| e.to_string())?;
        cache.store(bytes).await.map_err(|e| e.to_string())?;
        Ok(true)
    }
}

fn transition(state: RefreshState) {
    debug!(%state, "refresh state");
}
