//! Whole-file encryption with a fresh per-file key
//!
//! Progress is reported at coarse checkpoints, not per byte.

use std::path::Path;
use zeroize::Zeroizing;

use crate::envelope::{open, seal};
use crate::error::CryptoError;
use crate::keys::{generate_file_key, FileKey};

/// A named, typed file held entirely in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PlainFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a local file; the MIME type is guessed from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let mime_type = guess_mime(&name).to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for PlainFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Output of [`encrypt_file`].
pub struct EncryptedFile {
    /// `[12-byte nonce][ciphertext][16-byte tag]`, ready for the blob store
    pub encrypted_blob: Vec<u8>,
    /// The per-file key, base64. Must be wrapped before it is stored anywhere.
    pub file_key_b64: Zeroizing<String>,
}

impl std::fmt::Debug for EncryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("encrypted_blob", &format_args!("{} bytes", self.encrypted_blob.len()))
            .field("file_key_b64", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `file` under a freshly generated key.
///
/// Checkpoints: 0.3 after the bytes are read, 0.7 after encryption, 1.0 after
/// the key is exported.
pub fn encrypt_file(
    file: &PlainFile,
    on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
) -> Result<EncryptedFile, CryptoError> {
    let file_key = generate_file_key();
    let data = file.bytes.as_slice();

    report(on_progress, 0.3);

    let encrypted_blob = seal(file_key.as_bytes(), data)?;

    report(on_progress, 0.7);

    let file_key_b64 = file_key.to_base64();

    report(on_progress, 1.0);

    tracing::debug!(
        name = %file.name,
        plaintext_bytes = data.len(),
        ciphertext_bytes = encrypted_blob.len(),
        "file encrypted"
    );

    Ok(EncryptedFile {
        encrypted_blob,
        file_key_b64,
    })
}

/// Decrypt a blob produced by [`encrypt_file`] and rebuild the named file.
///
/// Checkpoints: 0.2 after key import, 0.5 after the payload is split,
/// 0.9 after decryption, 1.0 when the file is built. A malformed key is
/// reported as [`CryptoError::Decryption`].
pub fn decrypt_file(
    encrypted_blob: &[u8],
    file_key_b64: &str,
    original_name: &str,
    original_mime_type: &str,
    on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
) -> Result<PlainFile, CryptoError> {
    let file_key = FileKey::from_base64(file_key_b64).map_err(|e| {
        tracing::debug!("file key import failed: {e}");
        CryptoError::Decryption
    })?;

    report(on_progress, 0.2);
    report(on_progress, 0.5);

    let bytes = open(file_key.as_bytes(), encrypted_blob)?;

    report(on_progress, 0.9);

    let file = PlainFile::new(original_name, original_mime_type, bytes);

    report(on_progress, 1.0);

    Ok(file)
}

fn report(on_progress: Option<&(dyn Fn(f64) + Send + Sync)>, p: f64) {
    if let Some(cb) = on_progress {
        cb(p);
    }
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NONCE_SIZE, TAG_SIZE};
    use std::sync::Mutex;

    fn sample() -> PlainFile {
        PlainFile::new("report.pdf", "application/pdf", b"%PDF-1.7 pretend".to_vec())
    }

    #[test]
    fn test_file_roundtrip() {
        let file = sample();
        let enc = encrypt_file(&file, None).unwrap();
        let dec = decrypt_file(
            &enc.encrypted_blob,
            &enc.file_key_b64,
            &file.name,
            &file.mime_type,
            None,
        )
        .unwrap();
        assert_eq!(dec, file);
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let file = PlainFile::new("empty", "application/octet-stream", Vec::new());
        let enc = encrypt_file(&file, None).unwrap();
        assert_eq!(enc.encrypted_blob.len(), NONCE_SIZE + TAG_SIZE);
        let dec = decrypt_file(&enc.encrypted_blob, &enc.file_key_b64, "empty", "x", None).unwrap();
        assert!(dec.bytes.is_empty());
    }

    #[test]
    fn test_two_encryptions_differ() {
        let file = sample();
        let a = encrypt_file(&file, None).unwrap();
        let b = encrypt_file(&file, None).unwrap();
        assert_ne!(a.encrypted_blob, b.encrypted_blob);
        assert_ne!(*a.file_key_b64, *b.file_key_b64);
    }

    #[test]
    fn test_wrong_file_key() {
        let file = sample();
        let a = encrypt_file(&file, None).unwrap();
        let b = encrypt_file(&file, None).unwrap();
        let err = decrypt_file(&a.encrypted_blob, &b.file_key_b64, "x", "y", None).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn test_malformed_file_key() {
        let enc = encrypt_file(&sample(), None).unwrap();
        let err = decrypt_file(&enc.encrypted_blob, "c2hvcnQ=", "x", "y", None).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn test_tampered_blob() {
        let enc = encrypt_file(&sample(), None).unwrap();
        let mut blob = enc.encrypted_blob.clone();
        blob[NONCE_SIZE + 1] ^= 0x01;
        let err = decrypt_file(&blob, &enc.file_key_b64, "x", "y", None).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn test_progress_checkpoints() {
        let seen = Mutex::new(Vec::new());
        let cb = |p: f64| seen.lock().unwrap().push(p);

        let enc = encrypt_file(&sample(), Some(&cb)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.3, 0.7, 1.0]);

        seen.lock().unwrap().clear();
        decrypt_file(&enc.encrypted_blob, &enc.file_key_b64, "a", "b", Some(&cb)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.2, 0.5, 0.9, 1.0]);
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("Photo.JPG");
        std::fs::write(&path, b"jpeg").unwrap();

        let file = PlainFile::from_path(&path).unwrap();
        assert_eq!(file.name, "Photo.JPG");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.size(), 4);
    }

    #[test]
    fn test_guess_mime_unknown() {
        assert_eq!(guess_mime("noext"), "application/octet-stream");
        assert_eq!(guess_mime("archive.tar.zst"), "application/octet-stream");
        assert_eq!(guess_mime("notes.md"), "text/markdown");
    }
}
