//! dlgate-server entry point.

use dlgate_extractor::{CredentialStore, FallbackController, ProcessExtractorAdapter, ProfileRegistry};
use dlgate_server::state::AppState;
use dlgate_server::store::DownloadStore;
use dlgate_server::{reaper, server};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let settings = match dlgate_core::Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    // worker_count needs to size the runtime before anything is spawned on
    // it, so the attribute macro (which builds a runtime with a fixed,
    // compile-time configuration) can't be used here.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.worker_count)
        .enable_all()
        .build()?;

    runtime.block_on(run(settings))
}

async fn run(settings: dlgate_core::Settings) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!("starting dlgate-server");

    let registry = ProfileRegistry::new(&settings.default_order, settings.default_profile.as_deref())?;
    let credentials = CredentialStore::load(
        settings.credential_blob_base64.as_deref().filter(|_| settings.allow_credential_profile),
        settings.download_dir.join(".dlgate-credentials"),
    );
    let adapter = Arc::new(ProcessExtractorAdapter::new());
    let controller = Arc::new(FallbackController::new(registry, credentials, adapter));

    let store = DownloadStore::new(settings.download_dir.clone());
    store.ensure_exists().await?;

    let settings = Arc::new(settings);
    let state = Arc::new(AppState {
        settings: settings.clone(),
        controller,
        store: store.clone(),
    });

    tokio::spawn(reaper::run(
        store,
        settings.reaper_tick(),
        settings.reaper_window(),
    ));

    let (addr, server_handle) = server::start_server(state).await?;
    info!("dlgate-server ready at {}", addr);

    if let Err(err) = server_handle.await {
        error!(%err, "server task ended unexpectedly");
    }

    Ok(())
}
