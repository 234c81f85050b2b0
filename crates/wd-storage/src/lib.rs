//! wd-storage: blob stores for encrypted file content
//!
//! A blob store only ever sees ciphertext. Locators it returns are opaque and
//! world-readable; confidentiality comes from the encryption layer.

pub mod health;
pub mod operator;
pub mod walrus;

pub use health::check_health;
pub use operator::{build_operator, OperatorStore};
pub use walrus::WalrusClient;

use async_trait::async_trait;
use wd_core::config::{expand_tilde, StorageBackend, WdConfig};
use wd_core::{WdError, WdResult};

/// Content storage addressed by opaque locators.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Store `data` and return its locator.
    async fn put(&self, data: Vec<u8>) -> WdResult<String>;

    /// Fetch the bytes stored under `blob_id`.
    async fn get(&self, blob_id: &str) -> WdResult<Vec<u8>>;

    /// Remove a blob. Backends without deletion return `Unsupported`.
    async fn delete(&self, blob_id: &str) -> WdResult<()> {
        Err(WdError::Unsupported(format!(
            "{} cannot delete blob {blob_id}",
            self.name()
        )))
    }

    /// Verify the backend is reachable.
    async fn health(&self) -> WdResult<()> {
        Ok(())
    }
}

/// Build the blob store selected by `[storage] backend`.
pub fn build_blob_store(config: &WdConfig) -> WdResult<Box<dyn BlobStore>> {
    match config.storage.backend {
        StorageBackend::Walrus => Ok(Box::new(WalrusClient::new(&config.walrus)?)),
        StorageBackend::Fs => {
            let root = expand_tilde(&config.storage.fs_root);
            let op = build_operator(&root)?;
            Ok(Box::new(OperatorStore::new(op, "waldrive")))
        }
    }
}
