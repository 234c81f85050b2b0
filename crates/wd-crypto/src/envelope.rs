//! AES-256-GCM envelopes for strings and byte payloads
//!
//! Payload format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! String envelopes carry the same bytes as standard base64 so they fit in
//! string-typed record fields.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;

use crate::error::CryptoError;
use crate::keys::UserKey;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a payload produced by [`seal`].
///
/// Fails with [`CryptoError::Decryption`] on a wrong key, any modified byte,
/// or input too short to hold a nonce and tag. No partial plaintext is returned.
pub fn open(key: &[u8; KEY_SIZE], payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption);
    }

    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Encrypt the UTF-8 bytes of `plaintext` and return base64(`nonce || ciphertext`).
pub fn encrypt_string(plaintext: &str, key: &UserKey) -> Result<String, CryptoError> {
    let sealed = seal(key.as_bytes(), plaintext.as_bytes())?;
    Ok(B64.encode(sealed))
}

/// Inverse of [`encrypt_string`].
pub fn decrypt_string(encrypted_b64: &str, key: &UserKey) -> Result<String, CryptoError> {
    let combined = B64
        .decode(encrypted_b64.trim())
        .map_err(|_| CryptoError::Decryption)?;
    let plaintext = open(key.as_bytes(), &combined)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
}
