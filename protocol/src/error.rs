//! Error types for the protocol crate

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building calls, decoding results or loading configuration
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid token symbol: {0}")]
    InvalidSymbol(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown function {function} on {contract}")]
    UnknownFunction { contract: String, function: String },

    #[error("Unexpected output from {function}: {message}")]
    UnexpectedOutput { function: String, message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Create a new unexpected output error
    pub fn unexpected_output<S: Into<String>>(function: S, message: S) -> Self {
        Self::UnexpectedOutput {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ProtocolError::InvalidAddress(_) => "validation",
            ProtocolError::InvalidSymbol(_) => "validation",
            ProtocolError::Config(_) => "config",
            ProtocolError::Abi(_) => "abi",
            ProtocolError::Serialization(_) => "serialization",
            ProtocolError::UnknownFunction { .. } => "abi",
            ProtocolError::UnexpectedOutput { .. } => "abi",
            ProtocolError::Validation { .. } => "validation",
            ProtocolError::Internal(_) => "internal",
        }
    }
}
