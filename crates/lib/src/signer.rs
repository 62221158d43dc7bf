use crate::error::SweepError;
use solana_sdk::signature::Keypair;
use std::fs;

/// Parses the operator signing key in the formats operators actually keep
/// them in: a JSON keypair file, a base58 string, or a "[0, 1, ...]" array.
pub struct KeypairUtil;

impl KeypairUtil {
    pub fn from_private_key_string(private_key: &str) -> Result<Keypair, SweepError> {
        // Try to parse as a file path first
        if let Ok(file_content) = fs::read_to_string(private_key) {
            return Self::from_json_keypair(&file_content);
        }

        // Try to parse as U8Array format
        if private_key.trim().starts_with('[') && private_key.trim().ends_with(']') {
            return Self::from_u8_array_string(private_key);
        }

        Self::from_base58(private_key)
    }

    pub fn from_base58(private_key: &str) -> Result<Keypair, SweepError> {
        let decoded = bs58::decode(private_key)
            .into_vec()
            .map_err(|e| SweepError::SigningError(format!("Invalid base58 string: {e}")))?;

        if decoded.len() != 64 {
            return Err(SweepError::SigningError(format!(
                "Invalid private key length: expected 64 bytes, got {}",
                decoded.len()
            )));
        }

        Keypair::try_from(&decoded[..])
            .map_err(|e| SweepError::SigningError(format!("Invalid private key bytes: {e}")))
    }

    pub fn from_u8_array_string(array_str: &str) -> Result<Keypair, SweepError> {
        let trimmed = array_str.trim();

        if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
            return Err(SweepError::SigningError(
                "U8Array string must start with '[' and end with ']'".to_string(),
            ));
        }

        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.trim().is_empty() {
            return Err(SweepError::SigningError("U8Array string cannot be empty".to_string()));
        }

        let bytes: Vec<u8> = inner
            .split(',')
            .map(|s| s.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|e| SweepError::SigningError(format!("Invalid byte in U8Array: {e}")))?;

        if bytes.len() != 64 {
            return Err(SweepError::SigningError(format!(
                "Private key must be exactly 64 bytes, got {}",
                bytes.len()
            )));
        }

        Keypair::try_from(&bytes[..])
            .map_err(|e| SweepError::SigningError(format!("Invalid private key bytes: {e}")))
    }

    /// JSON keypair files are the array format the Solana tooling writes.
    pub fn from_json_keypair(json_content: &str) -> Result<Keypair, SweepError> {
        let bytes: Vec<u8> = serde_json::from_str(json_content.trim())
            .map_err(|e| SweepError::SigningError(format!("Invalid JSON keypair: {e}")))?;

        if bytes.len() != 64 {
            return Err(SweepError::SigningError(format!(
                "JSON keypair must contain exactly 64 bytes, got {}",
                bytes.len()
            )));
        }

        Keypair::try_from(&bytes[..])
            .map_err(|e| SweepError::SigningError(format!("Invalid private key bytes: {e}")))
    }
}
