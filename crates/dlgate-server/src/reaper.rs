//! Background reaper.
//!
//! Two deletion paths feed off the same [`DownloadStore`]: the periodic
//! sweep here, and the eager per-response deletion scheduled by the
//! download/stream handlers via [`schedule_eager_deletion`]. The sweep
//! exists to catch crashes and leaked partials; it is not the common path.

use crate::store::DownloadStore;
use std::path::PathBuf;
use std::time::Duration;

/// Runs until the process exits; spawned once from `main`.
pub async fn run(store: DownloadStore, tick: Duration, window: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let removed = store.sweep_older_than(window).await;
        if removed > 0 {
            tracing::info!(removed, "reaper swept stale files");
        }
    }
}

/// Schedule deletion of `path` after `delay`, detached from the request
/// task so the response can complete without waiting on it.
pub fn schedule_eager_deletion(store: DownloadStore, path: PathBuf, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        store.remove(&path).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn eager_deletion_removes_file_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStore::new(dir.path().to_path_buf());
        let path = dir.path().join("abc.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        schedule_eager_deletion(store, path.clone(), Duration::from_secs(5));
        assert!(path.exists());

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(!path.exists());
    }
}
