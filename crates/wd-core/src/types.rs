use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Where a file's bytes live and whether they are encrypted.
///
/// Records written before client-side encryption existed carry only a plain
/// `blob_id`; they deserialize into `Legacy` and are served without decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Encrypted {
        /// Blob locator, `encrypt_string`-ed under the owner's derived key
        encrypted_blob_id: String,
        /// Per-file key (base64), `encrypt_string`-ed under the owner's derived key
        encrypted_file_key: String,
    },
    Legacy {
        blob_id: String,
    },
}

impl FileContent {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, FileContent::Encrypted { .. })
    }
}

/// File metadata as persisted by the record store (database or ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Wallet address of the owner
    pub owner: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// `None` means the root folder
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(flatten)]
    pub content: FileContent,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Input to `RecordStore::create_file`.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub folder_id: Option<String>,
    pub is_public: bool,
    pub content: FileContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: u64,
}

/// Access grant recorded for another address. Nothing is re-encrypted for the
/// recipient; the grant is bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub file_id: String,
    pub shared_with: String,
    pub can_write: bool,
    pub can_delete: bool,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Upload,
    Download,
    Rename,
    Delete,
    Share,
    Visibility,
    CreateFolder,
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityAction::Upload => "upload",
            ActivityAction::Download => "download",
            ActivityAction::Rename => "rename",
            ActivityAction::Delete => "delete",
            ActivityAction::Share => "share",
            ActivityAction::Visibility => "visibility",
            ActivityAction::CreateFolder => "create_folder",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub owner: String,
    pub action: ActivityAction,
    /// File or folder id the action applied to
    pub subject: String,
    #[serde(default)]
    pub detail: String,
    pub at: u64,
}

/// Step of an upload or download, reported alongside fractional progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    // upload
    Encrypting,
    Uploading,
    Securing,
    Blockchain,
    // download
    Authenticating,
    Preparing,
    Downloading,
    Decrypting,
    Complete,
}

impl std::fmt::Display for TransferStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferStep::Encrypting => "encrypting",
            TransferStep::Uploading => "uploading",
            TransferStep::Securing => "securing",
            TransferStep::Blockchain => "blockchain",
            TransferStep::Authenticating => "authenticating",
            TransferStep::Preparing => "preparing",
            TransferStep::Downloading => "downloading",
            TransferStep::Decrypting => "decrypting",
            TransferStep::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// A progress report: current step and overall fraction in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub step: TransferStep,
    pub progress: f64,
}

/// Wallet addresses are hex; compare them without regard to case.
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
