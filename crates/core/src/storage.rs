//! Per-tenant durable storage for vector-store images.
//!
//! A store image is two artifacts read wholesale at load and overwritten
//! wholesale at save. There are no partial or append writes.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::tenant::TenantId;

/// The two co-located artifacts of a persisted vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreArtifact {
    Vectors,
    Metadata,
}

impl StoreArtifact {
    pub const ALL: [StoreArtifact; 2] = [StoreArtifact::Vectors, StoreArtifact::Metadata];

    /// File name used by filesystem-backed stores.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Vectors => "vectors.bin",
            Self::Metadata => "metadata.json",
        }
    }
}

/// Key-value byte store keyed by tenant.
///
/// Implementations: filesystem directory per tenant, in-memory (for testing).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Read an artifact. `Ok(None)` when it was never written.
    async fn read(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
    ) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Replace an artifact with `bytes`.
    async fn write(
        &self,
        tenant: &TenantId,
        artifact: StoreArtifact,
        bytes: &[u8],
    ) -> std::result::Result<(), StoreError>;

    /// Replace several artifacts of one image, in order.
    ///
    /// The default writes them one by one, so a failure part way through can
    /// leave a mixed image. Backends that can stage writes should override
    /// this so that a failure before the commit leaves the old image whole.
    async fn write_image(
        &self,
        tenant: &TenantId,
        artifacts: &[(StoreArtifact, &[u8])],
    ) -> std::result::Result<(), StoreError> {
        for (artifact, bytes) in artifacts {
            self.write(tenant, *artifact, bytes).await?;
        }
        Ok(())
    }
}
