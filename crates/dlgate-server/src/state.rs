//! Shared application state: one immutable context, no process-wide
//! singletons.

use dlgate_core::Settings;
use dlgate_extractor::FallbackController;
use std::sync::Arc;

use crate::store::DownloadStore;

pub struct AppState {
    pub settings: Arc<Settings>,
    pub controller: Arc<FallbackController>,
    pub store: DownloadStore,
}
