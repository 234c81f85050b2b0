//! JSON record store: the whole ledger lives in memory and every mutation is
//! written through to disk atomically (temp file + rename).
//!
//! Opened without a path it is purely in-memory, which is what tests and
//! throwaway sessions use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use wd_core::types::{
    same_address, unix_now, ActivityEntry, FileRecord, FolderRecord, NewFile, ShareGrant,
};
use wd_core::{WdError, WdResult};

use crate::RecordStore;

/// Oldest activity entries are dropped beyond this many.
const MAX_ACTIVITY: usize = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Ledger {
    files: BTreeMap<String, FileRecord>,
    folders: BTreeMap<String, FolderRecord>,
    shares: Vec<ShareGrant>,
    activity: Vec<ActivityEntry>,
}

pub struct JsonRecordStore {
    path: Option<PathBuf>,
    ledger: Mutex<Ledger>,
}

impl JsonRecordStore {
    /// Load or create a record store at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(path: &Path) -> WdResult<Self> {
        let ledger = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| WdError::Record(format!("parsing {}: {e}", path.display())))?
        } else {
            Ledger::default()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            ledger: Mutex::new(ledger),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to a staged copy of the ledger, persist it, then publish it.
    /// If either step fails, neither memory nor disk changes.
    fn mutate<T>(&self, f: impl FnOnce(&mut Ledger) -> WdResult<T>) -> WdResult<T> {
        let mut ledger = self.lock();
        let mut staged = ledger.clone();
        let out = f(&mut staged)?;
        self.flush(&staged)?;
        *ledger = staged;
        Ok(out)
    }

    fn flush(&self, ledger: &Ledger) -> WdResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(ledger)
            .map_err(|e| WdError::Record(format!("serializing records: {e}")))?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Names end up as local file names on download, so they must be a single
/// path component.
fn check_name(kind: &str, name: &str) -> WdResult<()> {
    if name.trim().is_empty() {
        return Err(WdError::Record(format!("{kind} name must not be empty")));
    }
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(WdError::Record(format!("invalid {kind} name: {name:?}")));
    }
    Ok(())
}

fn check_folder(ledger: &Ledger, folder_id: Option<&str>) -> WdResult<()> {
    match folder_id {
        Some(id) if !ledger.folders.contains_key(id) => {
            Err(WdError::NotFound(format!("folder {id}")))
        }
        _ => Ok(()),
    }
}

fn file_mut<'a>(ledger: &'a mut Ledger, id: &str) -> WdResult<&'a mut FileRecord> {
    ledger
        .files
        .get_mut(id)
        .ok_or_else(|| WdError::NotFound(format!("file {id}")))
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn create_file(&self, file: NewFile) -> WdResult<FileRecord> {
        check_name("file", &file.name)?;
        self.mutate(|ledger| {
            check_folder(ledger, file.folder_id.as_deref())?;

            let now = unix_now();
            let record = FileRecord {
                id: uuid::Uuid::new_v4().to_string(),
                owner: file.owner,
                name: file.name,
                size: file.size,
                mime_type: file.mime_type,
                folder_id: file.folder_id,
                is_public: file.is_public,
                content: file.content,
                created_at: now,
                updated_at: now,
            };
            ledger.files.insert(record.id.clone(), record.clone());
            tracing::debug!(id = %record.id, name = %record.name, "file record created");
            Ok(record)
        })
    }

    async fn get_file(&self, id: &str) -> WdResult<FileRecord> {
        self.lock()
            .files
            .get(id)
            .cloned()
            .ok_or_else(|| WdError::NotFound(format!("file {id}")))
    }

    async fn list_files(&self, owner: &str, folder_id: Option<&str>) -> WdResult<Vec<FileRecord>> {
        let ledger = self.lock();
        let mut files: Vec<FileRecord> = ledger
            .files
            .values()
            .filter(|f| same_address(&f.owner, owner) && f.folder_id.as_deref() == folder_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    async fn rename_file(&self, id: &str, new_name: &str) -> WdResult<FileRecord> {
        check_name("file", new_name)?;
        self.mutate(|ledger| {
            let record = file_mut(ledger, id)?;
            record.name = new_name.to_string();
            record.updated_at = unix_now();
            Ok(record.clone())
        })
    }

    async fn set_public(&self, id: &str, is_public: bool) -> WdResult<FileRecord> {
        self.mutate(|ledger| {
            let record = file_mut(ledger, id)?;
            record.is_public = is_public;
            record.updated_at = unix_now();
            Ok(record.clone())
        })
    }

    async fn delete_file(&self, id: &str) -> WdResult<FileRecord> {
        self.mutate(|ledger| {
            let record = ledger
                .files
                .remove(id)
                .ok_or_else(|| WdError::NotFound(format!("file {id}")))?;
            ledger.shares.retain(|s| s.file_id != id);
            Ok(record)
        })
    }

    async fn create_folder(
        &self,
        owner: &str,
        name: &str,
        parent_id: Option<&str>,
        is_public: bool,
    ) -> WdResult<FolderRecord> {
        check_name("folder", name)?;
        self.mutate(|ledger| {
            check_folder(ledger, parent_id)?;

            let folder = FolderRecord {
                id: uuid::Uuid::new_v4().to_string(),
                owner: owner.to_string(),
                name: name.to_string(),
                parent_id: parent_id.map(str::to_string),
                is_public,
                created_at: unix_now(),
            };
            ledger.folders.insert(folder.id.clone(), folder.clone());
            Ok(folder)
        })
    }

    async fn list_folders(&self, owner: &str, parent_id: Option<&str>) -> WdResult<Vec<FolderRecord>> {
        let ledger = self.lock();
        let mut folders: Vec<FolderRecord> = ledger
            .folders
            .values()
            .filter(|f| same_address(&f.owner, owner) && f.parent_id.as_deref() == parent_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn share_file(&self, grant: ShareGrant) -> WdResult<()> {
        self.mutate(|ledger| {
            if !ledger.files.contains_key(&grant.file_id) {
                return Err(WdError::NotFound(format!("file {}", grant.file_id)));
            }
            ledger
                .shares
                .retain(|s| !(s.file_id == grant.file_id && s.shared_with == grant.shared_with));
            ledger.shares.push(grant);
            Ok(())
        })
    }

    async fn list_shares(&self, file_id: &str) -> WdResult<Vec<ShareGrant>> {
        Ok(self
            .lock()
            .shares
            .iter()
            .filter(|s| s.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn log_activity(&self, entry: ActivityEntry) -> WdResult<()> {
        self.mutate(|ledger| {
            ledger.activity.push(entry);
            if ledger.activity.len() > MAX_ACTIVITY {
                let excess = ledger.activity.len() - MAX_ACTIVITY;
                ledger.activity.drain(..excess);
            }
            Ok(())
        })
    }

    async fn list_activity(&self, owner: &str, limit: usize) -> WdResult<Vec<ActivityEntry>> {
        Ok(self
            .lock()
            .activity
            .iter()
            .rev()
            .filter(|a| same_address(&a.owner, owner))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_core::types::{ActivityAction, FileContent};

    fn new_file(owner: &str, name: &str, folder: Option<&str>) -> NewFile {
        NewFile {
            owner: owner.into(),
            name: name.into(),
            size: 3,
            mime_type: "text/plain".into(),
            folder_id: folder.map(str::to_string),
            is_public: false,
            content: FileContent::Encrypted {
                encrypted_blob_id: "E".into(),
                encrypted_file_key: "K".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = JsonRecordStore::in_memory();
        let rec = store.create_file(new_file("0xA", "a.txt", None)).await.unwrap();
        let got = store.get_file(&rec.id).await.unwrap();
        assert_eq!(got.name, "a.txt");
        assert!(got.content.is_encrypted());
    }

    #[tokio::test]
    async fn test_missing_folder_rejected() {
        let store = JsonRecordStore::in_memory();
        let err = store
            .create_file(new_file("0xA", "a.txt", Some("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, WdError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_owner_and_folder() {
        let store = JsonRecordStore::in_memory();
        let folder = store.create_folder("0xA", "docs", None, false).await.unwrap();
        store.create_file(new_file("0xA", "root.txt", None)).await.unwrap();
        store
            .create_file(new_file("0xA", "in-docs.txt", Some(&folder.id)))
            .await
            .unwrap();
        store.create_file(new_file("0xB", "other.txt", None)).await.unwrap();

        let root = store.list_files("0xA", None).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "root.txt");

        let docs = store.list_files("0xA", Some(&folder.id)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "in-docs.txt");

        assert_eq!(store.list_folders("0xA", None).await.unwrap().len(), 1);
        assert!(store.list_folders("0xB", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_and_visibility() {
        let store = JsonRecordStore::in_memory();
        let rec = store.create_file(new_file("0xA", "a.txt", None)).await.unwrap();

        let renamed = store.rename_file(&rec.id, "b.txt").await.unwrap();
        assert_eq!(renamed.name, "b.txt");
        assert!(store.rename_file(&rec.id, "  ").await.is_err());

        let public = store.set_public(&rec.id, true).await.unwrap();
        assert!(public.is_public);
    }

    #[tokio::test]
    async fn test_delete_removes_shares() {
        let store = JsonRecordStore::in_memory();
        let rec = store.create_file(new_file("0xA", "a.txt", None)).await.unwrap();
        store
            .share_file(ShareGrant {
                file_id: rec.id.clone(),
                shared_with: "0xB".into(),
                can_write: false,
                can_delete: false,
                created_at: 0,
            })
            .await
            .unwrap();
        assert_eq!(store.list_shares(&rec.id).await.unwrap().len(), 1);

        store.delete_file(&rec.id).await.unwrap();
        assert!(store.list_shares(&rec.id).await.unwrap().is_empty());
        assert!(matches!(
            store.get_file(&rec.id).await,
            Err(WdError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_share_replaces_grant_for_same_address() {
        let store = JsonRecordStore::in_memory();
        let rec = store.create_file(new_file("0xA", "a.txt", None)).await.unwrap();
        for can_write in [false, true] {
            store
                .share_file(ShareGrant {
                    file_id: rec.id.clone(),
                    shared_with: "0xB".into(),
                    can_write,
                    can_delete: false,
                    created_at: 0,
                })
                .await
                .unwrap();
        }
        let shares = store.list_shares(&rec.id).await.unwrap();
        assert_eq!(shares.len(), 1);
        assert!(shares[0].can_write);
    }

    #[tokio::test]
    async fn test_activity_newest_first() {
        let store = JsonRecordStore::in_memory();
        for subject in ["one", "two", "three"] {
            store
                .log_activity(crate::activity("0xA", ActivityAction::Upload, subject, ""))
                .await
                .unwrap();
        }
        store
            .log_activity(crate::activity("0xB", ActivityAction::Upload, "theirs", ""))
            .await
            .unwrap();

        let recent = store.list_activity("0xA", 2).await.unwrap();
        let subjects: Vec<_> = recent.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/records.json");

        let id = {
            let store = JsonRecordStore::open(&path).unwrap();
            store.create_file(new_file("0xA", "kept.txt", None)).await.unwrap().id
        };

        let reopened = JsonRecordStore::open(&path).unwrap();
        assert_eq!(reopened.get_file(&id).await.unwrap().name, "kept.txt");
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_ledger_unchanged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        // the parent of the records file is a regular file, so every flush fails
        let store = JsonRecordStore::open(&blocker.join("records.json")).unwrap();
        assert!(store.create_file(new_file("0xA", "a.txt", None)).await.is_err());
        assert!(store.list_files("0xA", None).await.unwrap().is_empty());
        assert!(store.create_folder("0xA", "docs", None, false).await.is_err());
        assert!(store.list_folders("0xA", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_like_names_rejected() {
        let store = JsonRecordStore::in_memory();
        for bad in ["../../.bashrc", "/etc/passwd", "a\\b", "..", "."] {
            assert!(
                matches!(
                    store.create_file(new_file("0xA", bad, None)).await,
                    Err(WdError::Record(_))
                ),
                "{bad} accepted"
            );
            assert!(store.create_folder("0xA", bad, None, false).await.is_err());
        }

        let rec = store.create_file(new_file("0xA", "ok.txt", None)).await.unwrap();
        assert!(store.rename_file(&rec.id, "../escape").await.is_err());
        assert_eq!(store.get_file(&rec.id).await.unwrap().name, "ok.txt");
        assert!(store.rename_file(&rec.id, "..hidden.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_owner_match_ignores_case() {
        let store = JsonRecordStore::in_memory();
        store.create_file(new_file("0xAbC", "a.txt", None)).await.unwrap();
        store.create_folder("0xAbC", "docs", None, false).await.unwrap();
        store
            .log_activity(crate::activity("0xAbC", ActivityAction::Upload, "a", ""))
            .await
            .unwrap();

        assert_eq!(store.list_files("0xabc", None).await.unwrap().len(), 1);
        assert_eq!(store.list_folders("0xABC", None).await.unwrap().len(), 1);
        assert_eq!(store.list_activity("0xabc", 10).await.unwrap().len(), 1);
    }

    #[test]
    fn test_open_corrupt_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, "[oops").unwrap();
        assert!(matches!(
            JsonRecordStore::open(&path),
            Err(WdError::Record(_))
        ));
    }
}
