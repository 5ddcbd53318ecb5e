//! # Country Exchange Server
//!
//! REST service that refreshes country metadata and exchange rates on
//! demand and serves the merged records.

mod countries_logic;

use anyhow::Context;
use countries_logic::config::load_config;
use countries_logic::routes::router;
use countries_logic::state::AppState;
use lib_countries::loggers::setup_logging;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and configuration
    dotenvy::dotenv().ok();
    let settings = load_config()?;

    // 2. Logging; the guard flushes the file writer on exit
    let _guard = setup_logging(&settings.log_settings())?;
    info!(
        port = settings.port,
        database = settings.database_url.is_some(),
        cache_dir = %settings.cache_dir.display(),
        "configuration loaded"
    );

    // 3. Collaborators
    let state = AppState::from_settings(&settings).await?;
    let app = router(state);

    // 4. Serve until Ctrl-C or SIGTERM
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        warn!(error = %e, "cannot listen for SIGTERM");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {}
    }
}
