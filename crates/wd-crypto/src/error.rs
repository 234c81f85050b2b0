use thiserror::Error;
use wd_core::WdError;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("user cancelled signature or wallet error: {0}")]
    SignatureDenied(String),

    #[error("invalid wallet signature: {0}")]
    InvalidSignature(String),

    #[error("invalid key, corrupted data, or truncated input")]
    Decryption,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl From<CryptoError> for WdError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::SignatureDenied(msg) => WdError::SignatureDenied(msg),
            CryptoError::InvalidSignature(msg) => WdError::SignatureDenied(msg),
            CryptoError::Decryption => WdError::Decryption(
                "invalid key, corrupted data, or truncated input".into(),
            ),
            CryptoError::InvalidKey(msg) => WdError::Decryption(msg),
            CryptoError::Encryption(msg) => WdError::Other(anyhow::anyhow!(msg)),
        }
    }
}
