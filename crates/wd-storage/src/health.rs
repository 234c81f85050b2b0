//! Blob store health check

use wd_core::WdResult;

use crate::BlobStore;

/// Verify the blob store is reachable
pub async fn check_health(store: &dyn BlobStore) -> WdResult<()> {
    store.health().await.inspect_err(|e| {
        tracing::warn!(backend = store.name(), "blob store health check failed: {e}");
    })
}

/// Returns true if the blob store is reachable, false otherwise (non-panicking)
pub async fn is_healthy(store: &dyn BlobStore) -> bool {
    check_health(store).await.is_ok()
}
