//! Download store.
//!
//! A single flat directory. Filenames are `<identifier>.<ext>`, no
//! metadata sidecars, no subdirectories. Ownership of a
//! [`dlgate_core::model::FetchedFile`] passes from the handler to the
//! reaper once a deletion is scheduled.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Wraps the configured download directory; stateless beyond that path.
#[derive(Clone)]
pub struct DownloadStore {
    dir: PathBuf,
}

impl DownloadStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_exists(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Delete `path` if it still exists. Idempotent: a missing file is not
    /// an error.
    pub async fn remove(&self, path: &Path) {
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove store file");
            }
        }
    }

    /// Sweep the directory for regular files older than `window`, deleting
    /// each one. Returns the count removed. A missing or empty directory
    /// is a no-op.
    pub async fn sweep_older_than(&self, window: Duration) -> usize {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let now = SystemTime::now();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(created) = metadata.created().or_else(|_| metadata.modified()) else {
                continue;
            };
            let Ok(age) = now.duration_since(created) else {
                continue;
            };
            if age > window {
                self.remove(&entry.path()).await;
                removed += 1;
            }
        }
        removed
    }

    /// Free bytes available on the filesystem backing the store, for the
    /// health endpoint.
    pub fn free_disk_bytes(&self) -> u64 {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|d| self.dir.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.available_space())
            .unwrap_or(0)
    }
}
