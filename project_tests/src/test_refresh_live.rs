//! # Live Refresh Run
//!
//! Runs one full refresh against the real country and exchange-rate APIs,
//! keeping records in memory and the summary image in a temporary
//! directory, then prints the report and the top of the GDP ranking.

use lib_countries::imaging::PngSummaryRenderer;
use lib_countries::loggers::{LogSettings, setup_logging};
use lib_countries::sources::{HttpCountrySource, HttpRateSource};
use lib_countries::{CountryQuery, CountryStore, ImageCache, MemoryCountryStore, RefreshCoordinator, SortOrder};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Console logging only
    let _guard = setup_logging(&LogSettings {
        app_name: "refresh_live".to_string(),
        level: "info".to_string(),
        ..Default::default()
    })?;

    // 2. Live sources, in-memory store, throwaway image cache
    let timeout = Duration::from_secs(15);
    let cache_dir = tempfile::tempdir()?;
    let store = Arc::new(MemoryCountryStore::new());
    let cache = Arc::new(ImageCache::new(cache_dir.path()));
    let coordinator = RefreshCoordinator::new(
        Arc::new(HttpCountrySource::with_defaults(timeout)?),
        Arc::new(HttpRateSource::with_defaults(timeout)?),
        store.clone(),
    )
    .with_summary(Arc::new(PngSummaryRenderer::new()), cache.clone());

    println!("[*] Refreshing from the live APIs...");

    // 3. Refresh and report
    let report = match coordinator.refresh().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\n[ERROR] Refresh failed:");
            eprintln!(">>> {}", e);
            std::process::exit(1);
        }
    };

    println!("\n[SUCCESS] Refresh finished:");
    println!("-----------------------------------------------");
    println!("created:         {}", report.created);
    println!("updated:         {}", report.updated);
    println!("failed:          {}", report.failed);
    println!("total_processed: {}", report.total_processed);
    println!("total_countries: {}", report.total_countries);
    println!("rates:           {}", report.rates_origin);
    for error in &report.errors {
        println!("  ! {}", error);
    }
    println!("-----------------------------------------------");

    let richest = store
        .list(&CountryQuery { sort: SortOrder::GdpDesc, ..Default::default() })
        .await?;
    for record in richest.iter().take(5) {
        println!(
            "{:<32} {:>8} {:>22.2}",
            record.name,
            record.currency_code.as_deref().unwrap_or("-"),
            record.estimated_gdp.unwrap_or_default()
        );
    }

    // 4. Summary image
    match cache.get().await {
        Some(bytes) => println!("\n[INFO] Summary image: {} bytes at {:?}", bytes.len(), cache.path()),
        None => println!("\n[WARN] No summary image was generated"),
    }

    Ok(())
}
