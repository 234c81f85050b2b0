//! Terminal wallet signer
//!
//! Shows the key-derivation message and reads back the hex signature the user
//! produced with their wallet (for example `sui keytool sign`). Input is not
//! echoed. An empty answer declines the request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use wd_crypto::{SignedMessage, WalletSigner};

pub struct PromptSigner {
    preset: Option<SecretString>,
}

impl PromptSigner {
    /// `preset` skips the prompt (scripted use via `WALDRIVE_SIGNATURE`).
    pub fn new(preset: Option<String>) -> Self {
        Self {
            preset: preset.map(SecretString::from),
        }
    }
}

#[async_trait]
impl WalletSigner for PromptSigner {
    async fn sign(&self, message: &[u8]) -> Result<SignedMessage> {
        if let Some(sig) = &self.preset {
            return parse_signature_input(sig.expose_secret());
        }

        let text = String::from_utf8_lossy(message).into_owned();
        let input = tokio::task::spawn_blocking(move || {
            eprintln!("Sign this message with your wallet to unlock your files:\n\n{text}\n");
            rpassword::prompt_password("Signature (hex, empty to cancel): ")
        })
        .await
        .context("signature prompt task failed")?
        .context("reading signature")?;

        parse_signature_input(&input)
    }
}

fn parse_signature_input(input: &str) -> Result<SignedMessage> {
    let signature = input.trim();
    if signature.is_empty() {
        anyhow::bail!("signature request declined");
    }
    Ok(SignedMessage {
        signature: signature.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_declines() {
        assert!(parse_signature_input("").is_err());
        assert!(parse_signature_input("  \n").is_err());
    }

    #[test]
    fn test_input_is_trimmed() {
        let signed = parse_signature_input(" 0xabcd\n").unwrap();
        assert_eq!(signed.signature, "0xabcd");
    }

    #[tokio::test]
    async fn test_preset_skips_prompt() {
        let signer = PromptSigner::new(Some("deadbeef".into()));
        let signed = signer.sign(b"anything").await.unwrap();
        assert_eq!(signed.signature, "deadbeef");
    }
}
