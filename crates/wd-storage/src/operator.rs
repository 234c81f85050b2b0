//! OpenDAL-backed blob store: content-addressed blobs under a prefix
//!
//! Layout: `{prefix}/blobs/{blake3(ciphertext)}`. Storing identical ciphertext
//! twice is a no-op returning the same locator.

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use std::path::Path;
use wd_core::{WdError, WdResult};

use crate::BlobStore;

/// Build an OpenDAL operator rooted at a local directory.
pub fn build_operator(root: &Path) -> WdResult<Operator> {
    let builder = opendal::services::Fs::default().root(&root.to_string_lossy());

    let op = Operator::new(builder)
        .map_err(|e| WdError::Storage(format!("creating OpenDAL fs operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();

    Ok(op)
}

pub struct OperatorStore {
    op: Operator,
    prefix: String,
}

impl OperatorStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn blob_path(&self, blob_id: &str) -> String {
        format!("{}/blobs/{blob_id}", self.prefix)
    }
}

fn storage_err(context: &str, e: opendal::Error) -> WdError {
    if e.kind() == ErrorKind::NotFound {
        WdError::NotFound(context.to_string())
    } else {
        WdError::Storage(format!("{context}: {e}"))
    }
}

#[async_trait]
impl BlobStore for OperatorStore {
    fn name(&self) -> &str {
        "opendal"
    }

    async fn put(&self, data: Vec<u8>) -> WdResult<String> {
        let blob_id = blake3::hash(&data).to_hex().to_string();
        let path = self.blob_path(&blob_id);

        let stored = self
            .op
            .exists(&path)
            .await
            .map_err(|e| storage_err(&format!("checking blob {path}"), e))?;
        if stored {
            tracing::debug!(blob_id = %blob_id, "dedup: blob already stored");
            return Ok(blob_id);
        }

        let len = data.len();
        self.op
            .write(&path, data)
            .await
            .map_err(|e| storage_err(&format!("writing blob {path}"), e))?;

        tracing::debug!(blob_id = %blob_id, bytes = len, "blob stored");
        Ok(blob_id)
    }

    async fn get(&self, blob_id: &str) -> WdResult<Vec<u8>> {
        let path = self.blob_path(blob_id);
        let buf = self
            .op
            .read(&path)
            .await
            .map_err(|e| storage_err(&format!("blob {blob_id}"), e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, blob_id: &str) -> WdResult<()> {
        let path = self.blob_path(blob_id);
        self.op
            .delete(&path)
            .await
            .map_err(|e| storage_err(&format!("deleting blob {blob_id}"), e))
    }

    async fn health(&self) -> WdResult<()> {
        match self.op.list(&format!("{}/", self.prefix)).await {
            Ok(_) => Ok(()),
            // nothing written yet
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WdError::Storage(format!("storage health check failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> OperatorStore {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        OperatorStore::new(op, "test/")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = memory_store();
        let id = store.put(b"ciphertext".to_vec()).await.unwrap();
        assert_eq!(id.len(), 64, "blake3 hex locator");
        assert_eq!(store.get(&id).await.unwrap(), b"ciphertext");
    }

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let store = memory_store();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();
        let c = store.put(b"different".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = memory_store();
        let err = store.get("deadbeef").await.unwrap_err();
        assert!(matches!(err, WdError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = memory_store();
        let id = store.put(b"to be removed".to_vec()).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_health_on_empty_store() {
        let store = memory_store();
        assert!(crate::health::is_healthy(&store).await);
    }

    #[tokio::test]
    async fn test_put_surfaces_backend_errors() {
        let blocker = std::env::temp_dir().join(format!("waldrive-blocker-{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = OperatorStore::new(build_operator(&blocker.join("root")).unwrap(), "test");
        let err = store.put(b"ciphertext".to_vec()).await.unwrap_err();
        assert!(matches!(err, WdError::Storage(_)), "got {err:?}");

        std::fs::remove_file(&blocker).unwrap();
    }

    #[test]
    fn test_build_fs_operator() {
        let tmp = std::env::temp_dir().join("waldrive-op-test");
        assert!(build_operator(&tmp).is_ok());
    }
}
