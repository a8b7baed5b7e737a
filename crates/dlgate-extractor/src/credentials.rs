//! Credential store.
//!
//! Holds the decoded credential blob in memory and materialises it to a
//! private, owner-only-permissions file on demand. Each call to
//! [`CredentialStore::acquire`] writes its own independent copy — cheap to
//! re-materialise, and it means no two concurrent fetches ever share a
//! mutable file.

use dlgate_core::error::{DlgateError, ErrorKind};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct CredentialStore {
    blob: Option<Vec<u8>>,
    scratch_dir: PathBuf,
}

impl CredentialStore {
    /// Load the credential blob from a base64 string (already pulled out
    /// of process environment by `Settings::from_env`). Invalid encoding
    /// is a non-fatal warning: the store becomes empty and credentialled
    /// profiles are disabled for the life of the process.
    pub fn load(raw_base64: Option<&str>, scratch_dir: PathBuf) -> Self {
        let blob = raw_base64.and_then(|raw| {
            use base64::Engine;
            match base64::engine::general_purpose::STANDARD.decode(raw) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    tracing::warn!(error = %err, "credentialBlobBase64 is not valid base64; disabling credentialled profiles");
                    None
                }
            }
        });

        Self { blob, scratch_dir }
    }

    pub fn is_populated(&self) -> bool {
        self.blob.is_some()
    }

    /// Materialise the blob to a fresh, owner-only-permissions file and
    /// return a scoped handle. The handle unlinks the file when dropped
    /// (including on cancellation/panic unwind), so callers never need an
    /// explicit cleanup path.
    pub async fn acquire(&self) -> dlgate_core::Result<CredentialHandle> {
        let blob = self.blob.as_ref().ok_or_else(|| {
            DlgateError::extract(ErrorKind::AuthRequired, "no credential material loaded")
        })?;

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| DlgateError::io_with_path(e, self.scratch_dir.clone()))?;

        let blob = blob.clone();
        let dir = self.scratch_dir.clone();
        tokio::task::spawn_blocking(move || CredentialHandle::materialise(&dir, &blob))
            .await
            .map_err(|e| DlgateError::Other(format!("credential materialise task panicked: {e}")))?
    }
}

/// A scoped handle to a materialised credential file. The file exists for
/// the lifetime of this handle and is unlinked when it is dropped. No
/// credential path ever outlives the fetch that requested it.
pub struct CredentialHandle {
    path: PathBuf,
}

impl CredentialHandle {
    fn materialise(dir: &Path, blob: &[u8]) -> dlgate_core::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(".dlgate-cred-")
            .tempfile_in(dir)
            .map_err(|e| DlgateError::io_with_path(e, dir.to_path_buf()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| DlgateError::io_with_path(e, dir.to_path_buf()))?;
        }

        file.write_all(blob)
            .map_err(|e| DlgateError::io_with_path(e, dir.to_path_buf()))?;
        file.flush()
            .map_err(|e| DlgateError::io_with_path(e, dir.to_path_buf()))?;

        // Persist past the NamedTempFile's own drop so we control deletion
        // timing explicitly via this handle's Drop impl.
        let (_file, path) = file
            .keep()
            .map_err(|e| DlgateError::Other(format!("failed to persist credential file: {e}")))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CredentialHandle {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %err, "failed to unlink credential file on release");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_when_no_blob_configured() {
        let store = CredentialStore::load(None, std::env::temp_dir().join("dlgate-test-empty"));
        assert!(!store.is_populated());
        assert!(store.acquire().await.is_err());
    }

    #[tokio::test]
    async fn invalid_base64_is_non_fatal_and_disables_store() {
        let store = CredentialStore::load(
            Some("not valid base64!!"),
            std::env::temp_dir().join("dlgate-test-invalid"),
        );
        assert!(!store.is_populated());
    }

    #[tokio::test]
    async fn acquire_materialises_file_with_blob_contents() {
        use base64::Engine;
        let dir = tempfile::tempdir().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"secret-cookie-jar");
        let store = CredentialStore::load(Some(&encoded), dir.path().to_path_buf());
        assert!(store.is_populated());

        let handle = store.acquire().await.unwrap();
        let contents = tokio::fs::read(handle.path()).await.unwrap();
        assert_eq!(contents, b"secret-cookie-jar");

        let path = handle.path().to_path_buf();
        drop(handle);
        assert!(!path.exists(), "handle drop must unlink the file");
    }

    #[tokio::test]
    async fn concurrent_acquires_get_independent_files() {
        use base64::Engine;
        let dir = tempfile::tempdir().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"x");
        let store = CredentialStore::load(Some(&encoded), dir.path().to_path_buf());

        let a = store.acquire().await.unwrap();
        let b = store.acquire().await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
