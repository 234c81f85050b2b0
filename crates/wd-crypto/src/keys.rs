//! Key types: wallet-derived user key and per-file keys

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::KEY_SIZE;

/// The 256-bit key derived from the owner's wallet signature.
///
/// Encrypts blob locators and file keys. Zeroized on drop.
#[derive(Clone)]
pub struct UserKey {
    bytes: [u8; KEY_SIZE],
}

impl UserKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Raw key bytes as standard base64, for the session cache.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(B64.encode(self.bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        decode_key(encoded).map(Self::from_bytes)
    }
}

impl Drop for UserKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Export the raw key as standard base64.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(B64.encode(self.bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        decode_key(encoded).map(Self::from_bytes)
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

fn decode_key(encoded: &str) -> Result<[u8; KEY_SIZE], CryptoError> {
    let mut raw = B64
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("not base64: {e}")))?;

    if raw.len() != KEY_SIZE {
        let len = raw.len();
        raw.zeroize();
        return Err(CryptoError::InvalidKey(format!(
            "key has wrong size: {len} bytes (expected {KEY_SIZE})"
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&raw);
    raw.zeroize();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key_generation() {
        let k1 = generate_file_key();
        let k2 = generate_file_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_file_key_base64_roundtrip() {
        let key = generate_file_key();
        let exported = key.to_base64();
        let imported = FileKey::from_base64(&exported).unwrap();
        assert_eq!(key.as_bytes(), imported.as_bytes());
    }

    #[test]
    fn test_exported_key_length() {
        // 32 bytes → 44 base64 chars with padding
        let key = UserKey::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(key.to_base64().len(), 44);
    }

    #[test]
    fn test_import_wrong_length() {
        let short = B64.encode([1u8; 16]);
        let err = FileKey::from_base64(&short).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn test_import_not_base64() {
        assert!(UserKey::from_base64("!!! not base64 !!!").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let key = UserKey::from_bytes([0xAB; KEY_SIZE]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }
}
