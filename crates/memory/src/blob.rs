//! Blob stores holding persisted vector-store images.

use async_trait::async_trait;
use civicbot_core::error::StoreError;
use civicbot_core::{BlobStore, StoreArtifact, TenantId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Tenant ids become directory names, so only a conservative charset is
/// accepted: ASCII alphanumerics, `-`, `_` and `.`, not starting with a dot.
pub fn validate_tenant_id(tenant: &TenantId) -> Result<(), StoreError> {
    let id = tenant.as_str();
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!("invalid tenant id '{id}'")))
    }
}

/// One directory per tenant under `root`, one file per artifact.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// a crash mid-write leaves the previous artifact intact. `write_image`
/// stages every artifact before renaming any of them.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, tenant: &TenantId, artifact: StoreArtifact) -> Result<PathBuf, StoreError> {
        validate_tenant_id(tenant)?;
        Ok(self.root.join(tenant.as_str()).join(artifact.file_name()))
    }

    /// Write `bytes` next to `path` and return the temporary path.
    async fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            StoreError::Storage(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        Ok(tmp)
    }

    async fn commit(tmp: &Path, path: &Path) -> Result<(), StoreError> {
        tokio::fs::rename(tmp, path).await.map_err(|e| {
            StoreError::Storage(format!("Failed to replace {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.artifact_path(tenant, artifact)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let path = self.artifact_path(tenant, artifact)?;
        let tmp = Self::stage(&path, bytes).await?;
        Self::commit(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote store artifact");
        Ok(())
    }

    async fn write_image(
        &self,
        tenant: &TenantId,
        artifacts: &[(StoreArtifact, &[u8])],
    ) -> Result<(), StoreError> {
        let mut staged = Vec::with_capacity(artifacts.len());
        for (artifact, bytes) in artifacts {
            let path = self.artifact_path(tenant, *artifact)?;
            match Self::stage(&path, bytes).await {
                Ok(tmp) => staged.push((tmp, path)),
                Err(e) => {
                    for (tmp, _) in &staged {
                        let _ = tokio::fs::remove_file(tmp).await;
                    }
                    return Err(e);
                }
            }
        }

        for (tmp, path) in &staged {
            Self::commit(tmp, path).await?;
        }
        debug!(tenant = %tenant, artifacts = staged.len(), "Wrote store image");
        Ok(())
    }
}

/// Process-local blob store for tests.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<(TenantId, StoreArtifact), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an artifact directly, bypassing any store logic.
    pub fn put(&self, tenant: &TenantId, artifact: StoreArtifact, bytes: Vec<u8>) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tenant.clone(), artifact), bytes);
    }

    pub fn get(&self, tenant: &TenantId, artifact: StoreArtifact) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(tenant.clone(), artifact))
            .cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get(tenant, artifact))
    }

    async fn write(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.put(tenant, artifact, bytes.to_vec());
        Ok(())
    }
}
