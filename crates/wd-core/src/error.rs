use thiserror::Error;

pub type WdResult<T> = Result<T, WdError>;

#[derive(Debug, Error)]
pub enum WdError {
    /// The wallet refused (or failed) to sign the key-derivation message.
    #[error("signature denied: {0}")]
    SignatureDenied(String),

    /// AEAD authentication failed: wrong key, corrupted or truncated ciphertext,
    /// or a plaintext record routed into the encrypted path.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("record error: {0}")]
    Record(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

