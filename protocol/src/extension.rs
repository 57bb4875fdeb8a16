//! Extension kinds and factory-address dispatch
//!
//! An action may be bound to a satellite extension contract. The extension
//! reports the factory that deployed it, and the factory decides which of the
//! known behaviours applies. The registry is built once from configuration.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ContractsConfig;
use crate::parse_address;

/// The closed set of extension behaviours the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// Stake LP tokens to participate
    Lp,

    /// Join through a group with a bounded capacity
    GroupAction,

    /// Reward distribution service for groups
    GroupService,
}

impl ExtensionKind {
    /// Get the kind name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionKind::Lp => "lp",
            ExtensionKind::GroupAction => "group_action",
            ExtensionKind::GroupService => "group_service",
        }
    }
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of resolving a factory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtensionDispatch {
    Known { kind: ExtensionKind },
    Unsupported { factory: Address },
}

impl ExtensionDispatch {
    pub fn kind(&self) -> Option<ExtensionKind> {
        match self {
            ExtensionDispatch::Known { kind } => Some(*kind),
            ExtensionDispatch::Unsupported { .. } => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ExtensionDispatch::Known { .. })
    }
}

/// Ordered factory → kind registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionRegistry {
    entries: Vec<(Address, ExtensionKind)>,
}

impl ExtensionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configured factory addresses.
    ///
    /// Unset (zero) factories are skipped.
    pub fn from_contracts(contracts: &ContractsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(contracts.lp_extension_factory, ExtensionKind::Lp);
        registry.register(contracts.group_action_extension_factory, ExtensionKind::GroupAction);
        registry.register(contracts.group_service_extension_factory, ExtensionKind::GroupService);
        registry
    }

    /// Register a factory. Earlier registrations take precedence.
    pub fn register(&mut self, factory: Address, kind: ExtensionKind) {
        if factory.is_zero() {
            debug!(kind = %kind, "Skipping unset extension factory");
            return;
        }
        self.entries.push((factory, kind));
    }

    /// Resolve a factory address; first match wins
    pub fn resolve(&self, factory: Address) -> ExtensionDispatch {
        self.entries
            .iter()
            .find(|(registered, _)| *registered == factory)
            .map(|(_, kind)| ExtensionDispatch::Known { kind: *kind })
            .unwrap_or(ExtensionDispatch::Unsupported { factory })
    }

    /// Resolve a hex string, ignoring case. Unparseable input is unsupported.
    pub fn resolve_str(&self, factory: &str) -> ExtensionDispatch {
        match parse_address(factory) {
            Ok(address) => self.resolve(address),
            Err(e) => {
                debug!(input = factory, error = %e, "Unparseable extension factory");
                ExtensionDispatch::Unsupported { factory: Address::zero() }
            }
        }
    }

    /// Registered factories in precedence order
    pub fn entries(&self) -> &[(Address, ExtensionKind)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Love20Config;
    use proptest::prelude::*;

    fn registry() -> ExtensionRegistry {
        let mut contracts = Love20Config::default().contracts;
        contracts.lp_extension_factory = Address::repeat_byte(0xa1);
        contracts.group_action_extension_factory = Address::repeat_byte(0xb2);
        contracts.group_service_extension_factory = Address::repeat_byte(0xc3);
        ExtensionRegistry::from_contracts(&contracts)
    }

    #[test]
    fn test_every_registered_factory_resolves() {
        let registry = registry();
        assert_eq!(registry.len(), 3);

        for (factory, kind) in registry.entries() {
            assert_eq!(registry.resolve(*factory), ExtensionDispatch::Known { kind: *kind });
        }
    }

    #[test]
    fn test_resolve_str_ignores_case() {
        let registry = registry();
        let upper = format!("0x{}", "A1".repeat(20));
        let lower = format!("0x{}", "a1".repeat(20));

        assert_eq!(registry.resolve_str(&upper).kind(), Some(ExtensionKind::Lp));
        assert_eq!(registry.resolve_str(&lower).kind(), Some(ExtensionKind::Lp));
        assert!(!registry.resolve_str("garbage").is_supported());
    }

    #[test]
    fn test_unparseable_factory_is_unsupported() {
        let registry = registry();
        for input in ["", "0x", "0x1234", "not an address"] {
            assert_eq!(
                registry.resolve_str(input),
                ExtensionDispatch::Unsupported { factory: Address::zero() }
            );
        }
    }

    #[test]
    fn test_first_match_wins() {
        let shared = Address::repeat_byte(0x42);
        let mut registry = ExtensionRegistry::new();
        registry.register(shared, ExtensionKind::GroupService);
        registry.register(shared, ExtensionKind::Lp);

        assert_eq!(registry.resolve(shared).kind(), Some(ExtensionKind::GroupService));
    }

    #[test]
    fn test_zero_factories_not_registered() {
        let registry = ExtensionRegistry::from_contracts(&Love20Config::default().contracts);
        assert!(registry.is_empty());
        assert_eq!(
            registry.resolve(Address::zero()),
            ExtensionDispatch::Unsupported { factory: Address::zero() }
        );
    }

    proptest! {
        #[test]
        fn prop_unknown_factories_are_unsupported(bytes in any::<[u8; 20]>()) {
            let registry = registry();
            let factory = Address::from(bytes);
            let known = registry.entries().iter().any(|(a, _)| *a == factory);

            let dispatch = registry.resolve(factory);
            if known {
                prop_assert!(dispatch.is_supported());
            } else {
                prop_assert_eq!(dispatch, ExtensionDispatch::Unsupported { factory });
            }
        }
    }
}
