//! wd-transfer: secure upload/download orchestration
//!
//! Each operation runs a fixed sequence of steps and reports
//! `(TransferStep, fraction)` pairs to an optional callback. Any failing step
//! aborts the whole operation and its error is returned as-is.
//!
//! Upload:   Encrypting → Uploading → Securing → Blockchain → Complete
//! Download: Authenticating → Preparing → Downloading → Decrypting → Complete

pub mod engine;
pub mod ops;

pub use engine::{download_secure_file, upload_secure_file};

use wd_core::types::{Progress, TransferStep};
use wd_core::WdResult;
use wd_crypto::{derive_user_key, KdfParams, SessionKeyCache, UserKey, WalletSigner};
use wd_ledger::RecordStore;
use wd_storage::BlobStore;

/// Progress callback type
pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;

/// Everything an orchestrator talks to, borrowed for the duration of a call.
pub struct TransferContext<'a> {
    pub blobs: &'a dyn BlobStore,
    pub records: &'a dyn RecordStore,
    pub signer: &'a dyn WalletSigner,
    pub sessions: &'a SessionKeyCache,
    /// Address of the connected wallet; owner of everything uploaded
    pub wallet_address: &'a str,
    pub kdf: KdfParams,
    /// Delete the stored blob when the record step of an upload fails
    pub cleanup_orphans: bool,
}

impl<'a> TransferContext<'a> {
    pub fn new(
        blobs: &'a dyn BlobStore,
        records: &'a dyn RecordStore,
        signer: &'a dyn WalletSigner,
        sessions: &'a SessionKeyCache,
        wallet_address: &'a str,
    ) -> Self {
        Self {
            blobs,
            records,
            signer,
            sessions,
            wallet_address,
            kdf: KdfParams::default(),
            cleanup_orphans: true,
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_cleanup_orphans(mut self, enabled: bool) -> Self {
        self.cleanup_orphans = enabled;
        self
    }
}

/// The wallet's user key: from the session cache when fresh, otherwise
/// derived via a signature request and then cached.
pub async fn resolve_user_key(ctx: &TransferContext<'_>) -> WdResult<UserKey> {
    if let Some(key) = ctx.sessions.cached_user_key(ctx.wallet_address) {
        tracing::debug!(address = %ctx.wallet_address, "using cached session key");
        return Ok(key);
    }

    let key = derive_user_key(ctx.signer, ctx.wallet_address, &ctx.kdf).await?;
    ctx.sessions.cache_user_key(ctx.wallet_address, &key);
    tracing::info!(address = %ctx.wallet_address, "derived new session key");
    Ok(key)
}

pub(crate) fn report(progress: Option<&ProgressFn>, step: TransferStep, fraction: f64) {
    if let Some(cb) = progress {
        cb(Progress {
            step,
            progress: fraction,
        });
    }
}
