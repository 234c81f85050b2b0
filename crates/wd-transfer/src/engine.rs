//! Upload and download pipelines

use zeroize::Zeroizing;

use wd_core::types::{ActivityAction, FileContent, FileRecord, NewFile, TransferStep};
use wd_core::{WdError, WdResult};
use wd_crypto::{decrypt_file, decrypt_string, encrypt_file, encrypt_string, PlainFile};

use crate::{report, resolve_user_key, ProgressFn, TransferContext};

/// Encrypt `file`, store the ciphertext, and create its record.
///
/// The stored record carries the blob locator and the per-file key, both
/// encrypted under the wallet-derived user key.
pub async fn upload_secure_file(
    ctx: &TransferContext<'_>,
    file: &PlainFile,
    folder_id: Option<&str>,
    is_public: bool,
    progress: Option<&ProgressFn>,
) -> WdResult<FileRecord> {
    report(progress, TransferStep::Encrypting, 0.1);
    let on_encrypt = |p: f64| report(progress, TransferStep::Encrypting, 0.1 + p * 0.5);
    let encrypted = encrypt_file(file, Some(&on_encrypt))?;

    report(progress, TransferStep::Uploading, 0.6);
    let blob_id = ctx.blobs.put(encrypted.encrypted_blob).await?;
    report(progress, TransferStep::Uploading, 0.8);

    tracing::debug!(name = %file.name, backend = ctx.blobs.name(), "ciphertext stored");

    report(progress, TransferStep::Securing, 0.85);
    let (encrypted_blob_id, encrypted_file_key) =
        match seal_locators(ctx, &blob_id, &encrypted.file_key_b64).await {
            Ok(sealed) => sealed,
            Err(e) => {
                cleanup_orphan(ctx, &blob_id).await;
                return Err(e);
            }
        };

    report(progress, TransferStep::Blockchain, 0.9);
    let new_file = NewFile {
        owner: ctx.wallet_address.to_string(),
        name: file.name.clone(),
        size: file.size(),
        mime_type: file.mime_type.clone(),
        folder_id: folder_id.map(str::to_string),
        is_public,
        content: FileContent::Encrypted {
            encrypted_blob_id,
            encrypted_file_key,
        },
    };

    let record = match ctx.records.create_file(new_file).await {
        Ok(record) => record,
        Err(e) => {
            cleanup_orphan(ctx, &blob_id).await;
            return Err(e);
        }
    };

    report(progress, TransferStep::Complete, 1.0);

    tracing::info!(id = %record.id, name = %record.name, size = record.size, "secure upload complete");
    log_activity(ctx, ActivityAction::Upload, &record.id, &record.name).await;

    Ok(record)
}

/// Encrypt the blob locator and file key under the wallet-derived user key.
async fn seal_locators(
    ctx: &TransferContext<'_>,
    blob_id: &str,
    file_key_b64: &str,
) -> WdResult<(String, String)> {
    let user_key = resolve_user_key(ctx).await?;
    Ok((
        encrypt_string(blob_id, &user_key)?,
        encrypt_string(file_key_b64, &user_key)?,
    ))
}

/// Fetch and decrypt the file behind `record`.
///
/// Records created before encryption existed are returned as stored, without
/// asking the wallet for anything.
pub async fn download_secure_file(
    ctx: &TransferContext<'_>,
    record: &FileRecord,
    progress: Option<&ProgressFn>,
) -> WdResult<PlainFile> {
    let file = match &record.content {
        FileContent::Legacy { blob_id } => download_legacy(ctx, record, blob_id, progress).await?,
        FileContent::Encrypted {
            encrypted_blob_id,
            encrypted_file_key,
        } => {
            download_encrypted(ctx, record, encrypted_blob_id, encrypted_file_key, progress).await?
        }
    };

    log_activity(ctx, ActivityAction::Download, &record.id, &record.name).await;
    Ok(file)
}

async fn download_legacy(
    ctx: &TransferContext<'_>,
    record: &FileRecord,
    blob_id: &str,
    progress: Option<&ProgressFn>,
) -> WdResult<PlainFile> {
    tracing::warn!(id = %record.id, name = %record.name, "file is not encrypted, serving stored bytes");

    report(progress, TransferStep::Downloading, 0.3);
    let bytes = ctx.blobs.get(blob_id).await?;
    report(progress, TransferStep::Complete, 1.0);

    Ok(PlainFile::new(
        record.name.clone(),
        record.mime_type.clone(),
        bytes,
    ))
}

async fn download_encrypted(
    ctx: &TransferContext<'_>,
    record: &FileRecord,
    encrypted_blob_id: &str,
    encrypted_file_key: &str,
    progress: Option<&ProgressFn>,
) -> WdResult<PlainFile> {
    report(progress, TransferStep::Authenticating, 0.1);
    let user_key = resolve_user_key(ctx).await?;

    report(progress, TransferStep::Preparing, 0.2);
    let blob_id = decrypt_string(encrypted_blob_id, &user_key)?;
    let file_key = Zeroizing::new(decrypt_string(encrypted_file_key, &user_key)?);

    report(progress, TransferStep::Downloading, 0.3);
    let blob = ctx.blobs.get(&blob_id).await?;
    report(progress, TransferStep::Downloading, 0.6);

    report(progress, TransferStep::Decrypting, 0.7);
    let on_decrypt = |p: f64| report(progress, TransferStep::Decrypting, 0.7 + p * 0.3);
    let file = decrypt_file(
        &blob,
        &file_key,
        &record.name,
        &record.mime_type,
        Some(&on_decrypt),
    )?;

    report(progress, TransferStep::Complete, 1.0);

    tracing::info!(id = %record.id, name = %record.name, bytes = file.bytes.len(), "secure download complete");
    Ok(file)
}

/// Best-effort removal of a blob whose record could not be written.
async fn cleanup_orphan(ctx: &TransferContext<'_>, blob_id: &str) {
    if !ctx.cleanup_orphans {
        tracing::warn!(blob_id = %blob_id, "upload aborted, blob left orphaned");
        return;
    }

    match ctx.blobs.delete(blob_id).await {
        Ok(()) => tracing::info!(blob_id = %blob_id, "removed orphaned blob"),
        Err(WdError::Unsupported(_)) => tracing::warn!(
            blob_id = %blob_id,
            backend = ctx.blobs.name(),
            "upload aborted and the backend cannot delete; blob orphaned"
        ),
        Err(e) => tracing::warn!(blob_id = %blob_id, "failed to remove orphaned blob: {e}"),
    }
}

/// Activity logging never fails the operation it describes.
pub(crate) async fn log_activity(
    ctx: &TransferContext<'_>,
    action: ActivityAction,
    subject: &str,
    detail: &str,
) {
    let entry = wd_ledger::activity(ctx.wallet_address, action, subject, detail);
    if let Err(e) = ctx.records.log_activity(entry).await {
        tracing::warn!(action = %action, subject = %subject, "failed to record activity: {e}");
    }
}
