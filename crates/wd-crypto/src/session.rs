//! Session key cache: avoid re-prompting the wallet on every file operation.
//!
//! A single slot holding `{address, base64 key, timestamp}`. Caching a key for
//! a second address evicts the first. Entries older than the TTL (default one
//! hour) are evicted on read. The slot can be persisted to a small JSON file so
//! separate CLI invocations share one "session".

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::keys::UserKey;

/// Default lifetime of a cached key.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

struct CacheEntry {
    address: String,
    key_data: SecretString,
    timestamp: u64,
}

/// On-disk shape of the slot.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    address: String,
    #[serde(rename = "keyData")]
    key_data: String,
    timestamp: u64,
}

/// Single-entry, time-bounded cache of the wallet-derived key.
pub struct SessionKeyCache {
    slot: Mutex<Option<CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionKeyCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Store exported key material for `address`, replacing any prior entry.
    pub fn cache_key(&self, address: &str, key_b64: &str) {
        let entry = CacheEntry {
            address: address.to_string(),
            key_data: SecretString::from(key_b64.to_string()),
            timestamp: self.clock.now_millis(),
        };
        *self.lock() = Some(entry);
    }

    /// Cached key material for `address`, if present and younger than the TTL.
    ///
    /// An expired entry is evicted. An entry for a different address is left in
    /// place and `None` is returned.
    pub fn get_cached_key(&self, address: &str) -> Option<SecretString> {
        let mut slot = self.lock();
        let entry = slot.as_ref()?;

        if entry.address != address {
            return None;
        }

        let age = self.clock.now_millis().saturating_sub(entry.timestamp);
        if age >= self.ttl.as_millis() as u64 {
            tracing::debug!(address = %address, age_ms = age, "session key expired");
            *slot = None;
            return None;
        }

        Some(SecretString::from(entry.key_data.expose_secret().to_string()))
    }

    /// Cache a derived user key.
    pub fn cache_user_key(&self, address: &str, key: &UserKey) {
        self.cache_key(address, &key.to_base64());
    }

    /// The cached user key for `address`. Undecodable key material is evicted.
    pub fn cached_user_key(&self, address: &str) -> Option<UserKey> {
        let key_data = self.get_cached_key(address)?;
        match UserKey::from_base64(key_data.expose_secret()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(address = %address, "discarding unusable cached key: {e}");
                self.clear();
                None
            }
        }
    }

    /// Unconditionally drop the cached entry (logout, security reset).
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Load the slot from `path`. Missing, unreadable or corrupt files give an
    /// empty cache.
    pub fn load(path: &Path, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cache = Self::with_clock(ttl, clock);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return cache,
        };
        match serde_json::from_str::<StoredEntry>(&content) {
            Ok(stored) => {
                *cache.lock() = Some(CacheEntry {
                    address: stored.address,
                    key_data: SecretString::from(stored.key_data),
                    timestamp: stored.timestamp,
                });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring corrupt session cache: {e}");
            }
        }
        cache
    }

    /// Write the slot to `path` (mode 0600 on Unix), or remove the file when
    /// the slot is empty.
    pub fn persist(&self, path: &Path) -> std::io::Result<()> {
        let stored = self.lock().as_ref().map(|e| StoredEntry {
            address: e.address.clone(),
            key_data: e.key_data.expose_secret().to_string(),
            timestamp: e.timestamp,
        });

        let Some(stored) = stored else {
            return match std::fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = zeroize::Zeroizing::new(serde_json::to_vec(&stored)?);
        let tmp = path.with_extension("tmp");
        write_private(&tmp, &json)?;
        std::fs::rename(&tmp, path)
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheEntry>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SessionKeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    f.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}
