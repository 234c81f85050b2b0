use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{WdError, WdResult};

/// Top-level client configuration (loaded from waldrive.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WdConfig {
    pub wallet: WalletConfig,
    pub storage: StorageConfig,
    pub walrus: WalrusConfig,
    pub crypto: CryptoConfig,
    pub ledger: LedgerConfig,
    pub transfer: TransferConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Wallet address used as the owner of uploaded records
    pub address: Option<String>,
}

/// Which blob store backs uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Walrus publisher/aggregator HTTP API
    Walrus,
    /// Local directory through OpenDAL (offline use and testing)
    Fs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend
    pub fs_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalrusConfig {
    pub publisher_url: String,
    pub aggregator_url: String,
    /// Path appended to the publisher URL for uploads
    pub store_path: String,
    /// Storage duration in Walrus epochs
    pub epochs: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations for the wallet-derived key (default: 100000)
    pub pbkdf2_iterations: u32,
    /// How long a derived key stays in the session cache (default: 3600)
    pub session_ttl_secs: u64,
    /// Where the session key cache is persisted between CLI invocations
    pub session_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON file holding file/folder records
    pub records_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Delete the uploaded blob if recording it fails (best effort)
    pub cleanup_orphans: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Walrus,
            fs_root: PathBuf::from("~/.local/share/waldrive/blobs"),
        }
    }
}

impl Default for WalrusConfig {
    fn default() -> Self {
        Self {
            publisher_url: "https://publisher.walrus-testnet.walrus.space".into(),
            aggregator_url: "https://aggregator.walrus-testnet.walrus.space".into(),
            store_path: "/v1/store".into(),
            epochs: 1,
            timeout_secs: 60,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            session_ttl_secs: 3600,
            session_file: PathBuf::from("~/.cache/waldrive/session.json"),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from("~/.local/share/waldrive/records.json"),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            cleanup_orphans: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl WdConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> WdResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| WdError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// The configured wallet address, or a config error telling the user how to set it.
    pub fn wallet_address(&self) -> WdResult<&str> {
        self.wallet
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                WdError::Config(
                    "wallet address not set (add `address` under [wallet] or pass --address)"
                        .into(),
                )
            })
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}
