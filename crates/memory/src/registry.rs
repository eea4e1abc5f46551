//! Process-wide map from tenant to its single [`TenantVectorStore`].
//!
//! The map lock is held only to find or insert a tenant's cell. The store
//! itself is opened inside a `OnceCell`, so concurrent first requests for
//! one tenant open it once, and other tenants are never blocked by a load.

use civicbot_core::error::StoreError;
use civicbot_core::{BlobStore, TenantId};
use civicbot_providers::Embedder;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::info;

use crate::blob::validate_tenant_id;
use crate::store::{StoreSettings, TenantVectorStore};

type StoreCell = Arc<OnceCell<Arc<TenantVectorStore>>>;

pub struct VectorStoreRegistry {
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<Embedder>,
    settings: StoreSettings,
    stores: Mutex<HashMap<TenantId, StoreCell>>,
}

impl VectorStoreRegistry {
    pub fn new(blobs: Arc<dyn BlobStore>, embedder: Arc<Embedder>, settings: StoreSettings) -> Self {
        Self {
            blobs,
            embedder,
            settings,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// The tenant's store, opened (and loaded) on first use.
    pub async fn get_store(&self, tenant: &TenantId) -> Result<Arc<TenantVectorStore>, StoreError> {
        validate_tenant_id(tenant)?;

        let cell = {
            let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
            stores.entry(tenant.clone()).or_default().clone()
        };

        let store = cell
            .get_or_init(|| async {
                info!(tenant = %tenant, "Opening vector store");
                Arc::new(
                    TenantVectorStore::open(
                        tenant.clone(),
                        self.blobs.clone(),
                        self.embedder.clone(),
                        self.settings,
                    )
                    .await,
                )
            })
            .await;

        Ok(store.clone())
    }

    /// Drop the cached instance. The next `get_store` reloads from storage.
    /// Handles already given out keep working on the old instance.
    pub fn evict(&self, tenant: &TenantId) -> bool {
        let removed = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tenant)
            .is_some();
        if removed {
            info!(tenant = %tenant, "Vector store evicted");
        }
        removed
    }

    /// Tenants with a cached store, sorted.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tenants.sort();
        tenants
    }

    pub fn len(&self) -> usize {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
