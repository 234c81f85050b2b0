//! wd-crypto: client-side encryption for WalDrive
//!
//! Files are encrypted before they leave the machine. The scheme is a two-level
//! envelope:
//!
//! ```text
//! User Key (256-bit, PBKDF2-SHA256 over a wallet signature, never stored server-side)
//!   ├── encrypt_string(blob locator)   → record.encrypted_blob_id
//!   └── encrypt_string(file key, b64)  → record.encrypted_file_key
//!         └── File Key (per-file, 256-bit random)
//!               └── AES-256-GCM(file bytes) → blob store
//! ```
//!
//! Every AEAD output uses the same layout: `[12-byte nonce][ciphertext][16-byte tag]`.

pub mod envelope;
pub mod error;
pub mod file;
pub mod kdf;
pub mod keys;
pub mod session;

pub use envelope::{decrypt_string, encrypt_string};
pub use error::CryptoError;
pub use file::{decrypt_file, encrypt_file, EncryptedFile, PlainFile};
pub use kdf::{derive_user_key, KdfParams, SignedMessage, WalletSigner};
pub use keys::{generate_file_key, FileKey, UserKey};
pub use session::{Clock, ManualClock, SessionKeyCache, SystemClock};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
