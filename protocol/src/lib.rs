//! # LOVE20 Protocol
//!
//! Shared building blocks for talking to the LOVE20 contracts: domain types
//! mirrored from on-chain storage, the contract ABIs the client calls,
//! layered configuration, and the registry that maps extension factories to
//! their closed set of behaviours.

pub mod abi;
pub mod config;
pub mod error;
pub mod extension;
pub mod serde_u256;
pub mod types;

// Re-export commonly used types
pub use config::Love20Config;
pub use error::{ProtocolError, Result};
pub use extension::{ExtensionDispatch, ExtensionKind, ExtensionRegistry};
pub use types::*;

/// Current version of the protocol crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basis points denominator used by every percentage in the protocol
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Parse a hex address, accepting mixed case and an optional `0x` prefix
pub fn parse_address(value: &str) -> Result<ethers::types::Address> {
    let trimmed = value.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidAddress(value.to_string()));
    }

    format!("0x{}", hex_part.to_lowercase())
        .parse()
        .map_err(|_| ProtocolError::InvalidAddress(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_is_case_insensitive() {
        let lower = parse_address("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        let upper = parse_address("0XABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        let bare = parse_address("AbCdEfAbCdEfAbCdEfAbCdEfAbCdEfAbCdEfAbCd").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower, bare);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("0xzzcdefabcdefabcdefabcdefabcdefabcdefabcd").is_err());
    }
}
