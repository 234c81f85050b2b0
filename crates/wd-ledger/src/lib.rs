//! wd-ledger: persistence of file/folder metadata
//!
//! The record store is the system of record for names, sizes, visibility and
//! the encrypted locator/key pair of each file. It never sees plaintext keys.

pub mod json;

pub use json::JsonRecordStore;

use async_trait::async_trait;
use wd_core::types::{ActivityAction, ActivityEntry, FileRecord, FolderRecord, NewFile, ShareGrant};
use wd_core::WdResult;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_file(&self, file: NewFile) -> WdResult<FileRecord>;

    async fn get_file(&self, id: &str) -> WdResult<FileRecord>;

    /// Files owned by `owner` in `folder_id` (`None` = root), newest first.
    async fn list_files(&self, owner: &str, folder_id: Option<&str>) -> WdResult<Vec<FileRecord>>;

    async fn rename_file(&self, id: &str, new_name: &str) -> WdResult<FileRecord>;

    async fn set_public(&self, id: &str, is_public: bool) -> WdResult<FileRecord>;

    /// Remove the record and its share grants, returning what was removed.
    async fn delete_file(&self, id: &str) -> WdResult<FileRecord>;

    async fn create_folder(
        &self,
        owner: &str,
        name: &str,
        parent_id: Option<&str>,
        is_public: bool,
    ) -> WdResult<FolderRecord>;

    async fn list_folders(&self, owner: &str, parent_id: Option<&str>) -> WdResult<Vec<FolderRecord>>;

    async fn share_file(&self, grant: ShareGrant) -> WdResult<()>;

    async fn list_shares(&self, file_id: &str) -> WdResult<Vec<ShareGrant>>;

    async fn log_activity(&self, entry: ActivityEntry) -> WdResult<()>;

    /// Most recent activity for `owner`, newest first, at most `limit` entries.
    async fn list_activity(&self, owner: &str, limit: usize) -> WdResult<Vec<ActivityEntry>>;
}

/// Build an activity entry stamped with the current time.
pub fn activity(owner: &str, action: ActivityAction, subject: &str, detail: impl Into<String>) -> ActivityEntry {
    ActivityEntry {
        owner: owner.to_string(),
        action,
        subject: subject.to_string(),
        detail: detail.into(),
        at: wd_core::types::unix_now(),
    }
}
