//! Key derivation: wallet signature → user key (PBKDF2-HMAC-SHA256)
//!
//! The same wallet signing the same fixed message always yields the same key,
//! so no server-side key storage exists.

use async_trait::async_trait;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::keys::UserKey;
use crate::KEY_SIZE;

/// Application-wide PBKDF2 salt.
pub const KDF_SALT: &[u8] = b"waldrive-salt-v1";

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Signature returned by a wallet.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    /// Hex-encoded raw signature bytes (a leading `0x` is tolerated)
    pub signature: String,
}

/// A wallet able to sign arbitrary messages on the user's behalf.
///
/// Implementations may prompt the user; returning an error means the user
/// declined or the wallet failed.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign(&self, message: &[u8]) -> anyhow::Result<SignedMessage>;
}

/// PBKDF2 parameters
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Iteration count (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// The fixed message a wallet signs to unlock its encryption key.
pub fn key_derivation_message(wallet_address: &str) -> String {
    format!("WalDrive Encryption Key\nAddress: {wallet_address}\nPurpose: Secure file access")
}

/// Decode a hex signature string into raw bytes.
pub fn decode_signature(signature_hex: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let trimmed = signature_hex.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(hex_str)
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::InvalidSignature(format!("not hex: {e}")))
}

/// Derive the user key from raw signature bytes.
///
/// Only the first 32 bytes of the signature are used as PBKDF2 input.
pub fn key_from_signature(signature: &[u8], params: &KdfParams) -> Result<UserKey, CryptoError> {
    if signature.len() < KEY_SIZE {
        return Err(CryptoError::InvalidSignature(format!(
            "signature too short: {} bytes (need at least {KEY_SIZE})",
            signature.len()
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(&signature[..KEY_SIZE], KDF_SALT, params.iterations, &mut key);

    let user_key = UserKey::from_bytes(key);
    key.zeroize();
    Ok(user_key)
}

/// Ask `signer` to sign the key-derivation message for `wallet_address` and
/// derive the user key from the result.
pub async fn derive_user_key(
    signer: &dyn WalletSigner,
    wallet_address: &str,
    params: &KdfParams,
) -> Result<UserKey, CryptoError> {
    let message = key_derivation_message(wallet_address);

    tracing::debug!(address = %wallet_address, "requesting key-derivation signature");

    let signed = signer.sign(message.as_bytes()).await.map_err(|e| {
        tracing::warn!(address = %wallet_address, "signature request failed: {e}");
        CryptoError::SignatureDenied(e.to_string())
    })?;

    let raw = decode_signature(&signed.signature)?;
    key_from_signature(&raw, params)
}
