use serde::{Deserialize, Serialize};
use solana_client::client_error::ClientError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum SweepError {
    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Transaction execution failed: {0}")]
    TransactionExecutionFailed(String),

    #[error("Token operation failed: {0}")]
    TokenOperationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Internal error: {0}")]
    InternalServerError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<ClientError> for SweepError {
    fn from(e: ClientError) -> Self {
        let error_string = e.to_string();
        if error_string.contains("AccountNotFound")
            || error_string.contains("could not find account")
        {
            SweepError::AccountNotFound(error_string)
        } else {
            SweepError::RpcError(error_string)
        }
    }
}

impl From<std::io::Error> for SweepError {
    fn from(e: std::io::Error) -> Self {
        SweepError::InternalServerError(e.to_string())
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(e: serde_json::Error) -> Self {
        SweepError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for SweepError {
    fn from(e: csv::Error) -> Self {
        SweepError::RegistryError(e.to_string())
    }
}

impl From<bs58::decode::Error> for SweepError {
    fn from(e: bs58::decode::Error) -> Self {
        SweepError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_conversion() {
        let client_error = ClientError::from(std::io::Error::other("test"));
        let sweep_error: SweepError = client_error.into();
        assert!(matches!(sweep_error, SweepError::RpcError(_)));
        if let SweepError::RpcError(msg) = sweep_error {
            assert!(msg.contains("test"));
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::other("file not found");
        let sweep_error: SweepError = io_error.into();
        assert!(matches!(sweep_error, SweepError::InternalServerError(_)));
    }

    #[test]
    fn test_bs58_decode_error_conversion() {
        let bs58_error = bs58::decode::Error::InvalidCharacter { character: 'x', index: 0 };
        let sweep_error: SweepError = bs58_error.into();
        assert!(matches!(sweep_error, SweepError::SerializationError(_)));
    }

    #[test]
    fn test_error_display() {
        let error = SweepError::AccountNotFound("test_account".to_string());
        assert_eq!(format!("{error}"), "Account test_account not found");

        let error = SweepError::ConfigError("missing treasury".to_string());
        assert_eq!(format!("{error}"), "Invalid configuration: missing treasury");
    }
}
