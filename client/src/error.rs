//! Error types for the LOVE20 client

use ethers::types::{Bytes, H256};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Comprehensive error types for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] love20_protocol::ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("RPC error: {message}")]
    Rpc {
        message: String,
        code: Option<i64>,
        revert_data: Option<Bytes>,
    },

    #[error("Transaction reverted: {tx_hash:?}")]
    Reverted { tx_hash: H256 },

    #[error("Transaction dropped: {tx_hash:?}")]
    Dropped { tx_hash: H256 },

    #[error("Decode error: {function} - {message}")]
    Decode { function: String, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Step {step} is locked until the previous step is confirmed")]
    StepLocked { step: usize },

    #[error("No signer configured")]
    NoSigner,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wallet phrases that mean the user dismissed a signature prompt
const USER_REJECTION_PHRASES: &[&str] = &[
    "user rejected",
    "user denied",
    "user cancelled",
    "user canceled",
    "rejected the request",
    "action_rejected",
    "request rejected",
];

/// EIP-1193 "user rejected request" code
const USER_REJECTION_CODE: i64 = 4001;

impl ClientError {
    /// Build an RPC error, classifying wallet rejections as `UserRejected`
    pub fn rpc<S: Into<String>>(message: S, code: Option<i64>, revert_data: Option<Bytes>) -> Self {
        let message = message.into();
        if looks_like_user_rejection(&message, code) {
            return Self::UserRejected(message);
        }
        Self::Rpc {
            message,
            code,
            revert_data,
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(function: S, message: S) -> Self {
        Self::Decode {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the user dismissed the wallet prompt
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, ClientError::UserRejected(_))
    }

    /// Raw revert payload, when the node returned one
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            ClientError::Rpc { revert_data, .. } => revert_data.as_ref(),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Rpc { revert_data, .. } => revert_data.is_none(),
            ClientError::Dropped { .. } => true,
            ClientError::Io(_) => true,
            _ => false,
        }
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Protocol(e) => e.category(),
            ClientError::Config(_) => "config",
            ClientError::Abi(_) => "abi",
            ClientError::Serialization(_) => "serialization",
            ClientError::Io(_) => "io",
            ClientError::UserRejected(_) => "user_rejected",
            ClientError::Rpc { revert_data: Some(_), .. } => "contract_revert",
            ClientError::Rpc { .. } => "network",
            ClientError::Reverted { .. } => "contract_revert",
            ClientError::Dropped { .. } => "network",
            ClientError::Decode { .. } => "abi",
            ClientError::Cache { .. } => "cache",
            ClientError::StepLocked { .. } => "sequencing",
            ClientError::NoSigner => "config",
            ClientError::InvalidInput { .. } => "validation",
            ClientError::Internal(_) => "internal",
        }
    }
}

/// Heuristic match on wallet error shapes
pub fn looks_like_user_rejection(message: &str, code: Option<i64>) -> bool {
    if code == Some(USER_REJECTION_CODE) {
        return true;
    }
    let lowered = message.to_lowercase();
    USER_REJECTION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Merge child errors, keeping the first one present
pub fn first_error<'a, I>(errors: I) -> Option<&'a ClientError>
where
    I: IntoIterator<Item = Option<&'a ClientError>>,
{
    errors.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_detection() {
        assert!(looks_like_user_rejection("MetaMask Tx Signature: User denied transaction signature.", None));
        assert!(looks_like_user_rejection("anything", Some(4001)));
        assert!(looks_like_user_rejection("ACTION_REJECTED", None));
        assert!(!looks_like_user_rejection("execution reverted", Some(3)));
    }

    #[test]
    fn test_rpc_constructor_classifies() {
        assert!(ClientError::rpc("User rejected the request.", None, None).is_user_rejection());

        let revert = ClientError::rpc("execution reverted", Some(3), Some(Bytes::from(vec![1, 2, 3, 4])));
        assert_eq!(revert.category(), "contract_revert");
        assert!(!revert.is_retryable());

        let network = ClientError::rpc("connection refused", None, None);
        assert_eq!(network.category(), "network");
        assert!(network.is_retryable());
    }

    #[test]
    fn test_first_error_precedence() {
        let a = ClientError::internal("a");
        let b = ClientError::internal("b");
        let merged = first_error([None, Some(&a), Some(&b)]);
        assert_eq!(merged.map(|e| e.to_string()), Some("Internal error: a".to_string()));
        assert!(first_error([None, None]).is_none());
    }
}
