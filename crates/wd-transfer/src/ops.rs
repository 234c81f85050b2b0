//! Record operations on behalf of the connected wallet
//!
//! Everything here is metadata only; file bytes are never touched except for
//! the best-effort blob removal in [`delete`].

use wd_core::types::{
    same_address, unix_now, ActivityAction, ActivityEntry, FileContent, FileRecord, FolderRecord,
    ShareGrant,
};
use wd_core::{WdError, WdResult};
use wd_crypto::decrypt_string;

use crate::engine::log_activity;
use crate::TransferContext;

/// Contents of one folder.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub folders: Vec<FolderRecord>,
    pub files: Vec<FileRecord>,
}

/// Folders and files owned by the wallet in `folder_id` (`None` = root).
pub async fn list(ctx: &TransferContext<'_>, folder_id: Option<&str>) -> WdResult<Listing> {
    let folders = ctx.records.list_folders(ctx.wallet_address, folder_id).await?;
    let files = ctx.records.list_files(ctx.wallet_address, folder_id).await?;
    Ok(Listing { folders, files })
}

/// Look up a file the wallet owns. Files owned by others read as missing.
pub async fn owned_file(ctx: &TransferContext<'_>, id: &str) -> WdResult<FileRecord> {
    let record = ctx.records.get_file(id).await?;
    if !same_address(&record.owner, ctx.wallet_address) {
        return Err(WdError::NotFound(format!("file {id}")));
    }
    Ok(record)
}

/// Look up a file the wallet may download: its own, or anyone's public file.
pub async fn readable_file(ctx: &TransferContext<'_>, id: &str) -> WdResult<FileRecord> {
    let record = ctx.records.get_file(id).await?;
    if !record.is_public && !same_address(&record.owner, ctx.wallet_address) {
        return Err(WdError::NotFound(format!("file {id}")));
    }
    Ok(record)
}

pub async fn rename(ctx: &TransferContext<'_>, id: &str, new_name: &str) -> WdResult<FileRecord> {
    let old = owned_file(ctx, id).await?;
    let record = ctx.records.rename_file(id, new_name).await?;
    log_activity(
        ctx,
        ActivityAction::Rename,
        id,
        &format!("{} -> {}", old.name, record.name),
    )
    .await;
    Ok(record)
}

/// Flip the public flag and return the updated record.
pub async fn toggle_public(ctx: &TransferContext<'_>, id: &str) -> WdResult<FileRecord> {
    let current = owned_file(ctx, id).await?;
    let record = ctx.records.set_public(id, !current.is_public).await?;
    let detail = if record.is_public { "public" } else { "private" };
    log_activity(ctx, ActivityAction::Visibility, id, detail).await;
    Ok(record)
}

/// Delete a file record, then try to remove its blob.
///
/// The blob is only removed when its locator can be recovered without a new
/// signature request (legacy record, or a cached session key). Backends that
/// cannot delete leave the blob in place.
pub async fn delete(ctx: &TransferContext<'_>, id: &str) -> WdResult<FileRecord> {
    owned_file(ctx, id).await?;
    let record = ctx.records.delete_file(id).await?;

    match blob_locator_if_known(ctx, &record) {
        Some(blob_id) => match ctx.blobs.delete(&blob_id).await {
            Ok(()) => tracing::debug!(blob_id = %blob_id, "blob removed"),
            Err(WdError::Unsupported(_)) => {
                tracing::debug!(backend = ctx.blobs.name(), "backend cannot delete blobs")
            }
            Err(e) => tracing::warn!(blob_id = %blob_id, "failed to remove blob: {e}"),
        },
        None => tracing::debug!(id = %id, "blob locator unavailable without a session key"),
    }

    log_activity(ctx, ActivityAction::Delete, id, &record.name).await;
    Ok(record)
}

fn blob_locator_if_known(ctx: &TransferContext<'_>, record: &FileRecord) -> Option<String> {
    match &record.content {
        FileContent::Legacy { blob_id } => Some(blob_id.clone()),
        FileContent::Encrypted {
            encrypted_blob_id, ..
        } => {
            let key = ctx.sessions.cached_user_key(ctx.wallet_address)?;
            decrypt_string(encrypted_blob_id, &key).ok()
        }
    }
}

pub async fn create_folder(
    ctx: &TransferContext<'_>,
    name: &str,
    parent_id: Option<&str>,
    is_public: bool,
) -> WdResult<FolderRecord> {
    let folder = ctx
        .records
        .create_folder(ctx.wallet_address, name, parent_id, is_public)
        .await?;
    log_activity(ctx, ActivityAction::CreateFolder, &folder.id, &folder.name).await;
    Ok(folder)
}

/// Record an access grant for `shared_with`. Nothing is re-encrypted, so the
/// recipient cannot decrypt the file with their own wallet.
pub async fn share(
    ctx: &TransferContext<'_>,
    id: &str,
    shared_with: &str,
    can_write: bool,
    can_delete: bool,
) -> WdResult<ShareGrant> {
    let record = owned_file(ctx, id).await?;
    if same_address(shared_with, ctx.wallet_address) {
        return Err(WdError::Record("cannot share a file with its owner".into()));
    }

    let grant = ShareGrant {
        file_id: record.id.clone(),
        shared_with: shared_with.to_string(),
        can_write,
        can_delete,
        created_at: unix_now(),
    };
    ctx.records.share_file(grant.clone()).await?;

    if record.content.is_encrypted() {
        tracing::warn!(
            id = %record.id,
            shared_with = %shared_with,
            "grant recorded; the recipient cannot decrypt this file with their own wallet"
        );
    }

    log_activity(ctx, ActivityAction::Share, id, shared_with).await;
    Ok(grant)
}

pub async fn shares(ctx: &TransferContext<'_>, id: &str) -> WdResult<Vec<ShareGrant>> {
    owned_file(ctx, id).await?;
    ctx.records.list_shares(id).await
}

pub async fn recent_activity(ctx: &TransferContext<'_>, limit: usize) -> WdResult<Vec<ActivityEntry>> {
    ctx.records.list_activity(ctx.wallet_address, limit).await
}
