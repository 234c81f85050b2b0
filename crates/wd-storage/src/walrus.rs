//! Walrus publisher/aggregator HTTP client
//!
//! Upload:   `PUT {publisher}{store_path}?epochs=N` with the raw bytes as body.
//! Download: `GET {aggregator}/v1/blobs/{blob_id}`.
//!
//! The publisher answers with either `newlyCreated.blobObject.blobId` or
//! `alreadyCertified.blobId`. Neither endpoint needs credentials.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use wd_core::config::WalrusConfig;
use wd_core::{WdError, WdResult};

use crate::BlobStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

/// Extract the blob id from a publisher store response.
pub fn parse_store_response(body: &[u8]) -> WdResult<String> {
    let resp: StoreResponse = serde_json::from_slice(body)
        .map_err(|e| WdError::Network(format!("unexpected Walrus response: {e}")))?;

    match (resp.newly_created, resp.already_certified) {
        (Some(created), _) => Ok(created.blob_object.blob_id),
        (None, Some(certified)) => Ok(certified.blob_id),
        (None, None) => Err(WdError::Network("unexpected Walrus response".into())),
    }
}

pub struct WalrusClient {
    http: reqwest::Client,
    publisher_url: String,
    aggregator_url: String,
    store_path: String,
    epochs: u32,
}

impl WalrusClient {
    pub fn new(cfg: &WalrusConfig) -> WdResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| WdError::Config(format!("building HTTP client: {e}")))?;

        if cfg.publisher_url.starts_with("http://") || cfg.aggregator_url.starts_with("http://") {
            tracing::warn!(
                publisher = %cfg.publisher_url,
                aggregator = %cfg.aggregator_url,
                "Walrus endpoint uses plaintext HTTP"
            );
        }

        Ok(Self {
            http,
            publisher_url: cfg.publisher_url.trim_end_matches('/').to_string(),
            aggregator_url: cfg.aggregator_url.trim_end_matches('/').to_string(),
            store_path: format!("/{}", cfg.store_path.trim_start_matches('/')),
            epochs: cfg.epochs,
        })
    }

    fn store_url(&self) -> String {
        format!(
            "{}{}?epochs={}",
            self.publisher_url, self.store_path, self.epochs
        )
    }

    /// Public aggregator URL for a blob.
    pub fn blob_url(&self, blob_id: &str) -> String {
        format!("{}/v1/blobs/{blob_id}", self.aggregator_url)
    }
}

#[async_trait]
impl BlobStore for WalrusClient {
    fn name(&self) -> &str {
        "walrus"
    }

    async fn put(&self, data: Vec<u8>) -> WdResult<String> {
        let len = data.len();
        let resp = self
            .http
            .put(self.store_url())
            .body(data)
            .send()
            .await
            .map_err(|e| WdError::Network(format!("failed to upload to Walrus: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WdError::Network(format!(
                "failed to upload to Walrus: HTTP {status}"
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| WdError::Network(format!("reading Walrus response: {e}")))?;
        let blob_id = parse_store_response(&body)?;

        tracing::debug!(blob_id = %blob_id, bytes = len, epochs = self.epochs, "stored on Walrus");
        Ok(blob_id)
    }

    async fn get(&self, blob_id: &str) -> WdResult<Vec<u8>> {
        let resp = self
            .http
            .get(self.blob_url(blob_id))
            .send()
            .await
            .map_err(|e| WdError::Network(format!("failed to fetch file from Walrus: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WdError::Network(format!(
                "failed to fetch file from Walrus: {}",
                status.as_u16()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| WdError::Network(format!("reading Walrus blob {blob_id}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn health(&self) -> WdResult<()> {
        // any HTTP answer means the aggregator is reachable
        self.http
            .get(&self.aggregator_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| WdError::Network(format!("Walrus aggregator unreachable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newly_created() {
        let body = br#"{"newlyCreated":{"blobObject":{"id":"0x1","blobId":"abc123","size":10},"cost":5}}"#;
        assert_eq!(parse_store_response(body).unwrap(), "abc123");
    }

    #[test]
    fn test_parse_already_certified() {
        let body = br#"{"alreadyCertified":{"blobId":"xyz789","endEpoch":42}}"#;
        assert_eq!(parse_store_response(body).unwrap(), "xyz789");
    }

    #[test]
    fn test_parse_unexpected() {
        let err = parse_store_response(br#"{"markedInvalid":{}}"#).unwrap_err();
        assert!(err.to_string().contains("unexpected Walrus response"));
        assert!(parse_store_response(b"<html>").is_err());
    }

    #[test]
    fn test_urls() {
        let cfg = WalrusConfig {
            publisher_url: "https://pub.example/".into(),
            aggregator_url: "https://agg.example".into(),
            store_path: "v1/blobs".into(),
            epochs: 3,
            timeout_secs: 5,
        };
        let client = WalrusClient::new(&cfg).unwrap();
        assert_eq!(client.store_url(), "https://pub.example/v1/blobs?epochs=3");
        assert_eq!(client.blob_url("b1"), "https://agg.example/v1/blobs/b1");
    }

    #[tokio::test]
    async fn test_delete_unsupported() {
        let client = WalrusClient::new(&WalrusConfig::default()).unwrap();
        assert!(matches!(
            client.delete("b1").await,
            Err(WdError::Unsupported(_))
        ));
    }
}
