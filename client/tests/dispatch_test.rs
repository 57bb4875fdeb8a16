//! Integration tests for extension dispatch

mod test_utils;

use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, U256};
use proptest::prelude::*;

use love20_client::chain::ContractCall;
use love20_client::dispatch::{load_action_extension, load_extension_view, ExtensionView};
use love20_client::testing::FakeChainClient;
use love20_client::{BatchExecutor, Result};
use love20_protocol::abi::{EXTENSION_ABI, EXTENSION_CENTER_ABI, GROUP_SERVICE_EXTENSION_ABI};
use love20_protocol::{ExtensionDispatch, ExtensionKind, ExtensionRegistry};

use test_utils::*;

#[tokio::test]
async fn test_action_extension_to_group_service_view() -> Result<()> {
    let fake = Arc::new(FakeChainClient::read_only());
    let config = sample_config();
    let token = sample_token();
    let extension = Address::repeat_byte(0xe5);

    fake.respond(
        &ContractCall::new(
            config.contracts.extension_center,
            &EXTENSION_CENTER_ABI,
            "extension",
            vec![Token::Address(token.address), Token::Uint(U256::from(7))],
        ),
        vec![Token::Address(extension)],
    );
    fake.respond(
        &ContractCall::new(extension, &EXTENSION_ABI, "factory", vec![]),
        vec![Token::Address(config.contracts.group_service_extension_factory)],
    );
    fake.respond(
        &ContractCall::new(extension, &GROUP_SERVICE_EXTENSION_ABI, "maxRecipients", vec![]),
        vec![Token::Uint(U256::from(20))],
    );

    let bound = load_action_extension(fake.as_ref(), &config.contracts, &token, U256::from(7)).await?;
    assert_eq!(bound, Some(extension));

    let registry = ExtensionRegistry::from_contracts(&config.contracts);
    let executor = BatchExecutor::new(fake, 100);
    let view = load_extension_view(&executor, &registry, extension, None).await?;

    assert_eq!(view.kind(), Some(ExtensionKind::GroupService));
    match view {
        ExtensionView::GroupService(service) => {
            assert_eq!(service.max_recipients, U256::from(20));
            assert_eq!(service.joined_value, U256::zero());
        }
        other => panic!("unexpected view {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_action_without_extension() -> Result<()> {
    let fake = FakeChainClient::read_only();
    let config = sample_config();
    let token = sample_token();
    fake.respond(
        &ContractCall::new(
            config.contracts.extension_center,
            &EXTENSION_CENTER_ABI,
            "extension",
            vec![Token::Address(token.address), Token::Uint(U256::from(8))],
        ),
        vec![Token::Address(Address::zero())],
    );

    assert_eq!(load_action_extension(&fake, &config.contracts, &token, U256::from(8)).await?, None);
    Ok(())
}

proptest! {
    #[test]
    fn prop_every_factory_resolves_to_exactly_one_outcome(bytes in any::<[u8; 20]>()) {
        let registry = ExtensionRegistry::from_contracts(&sample_config().contracts);
        let factory = Address::from(bytes);

        let registered = registry.entries().iter().find(|(address, _)| *address == factory).map(|(_, kind)| *kind);
        match registry.resolve(factory) {
            ExtensionDispatch::Known { kind } => prop_assert_eq!(Some(kind), registered),
            ExtensionDispatch::Unsupported { factory: reported } => {
                prop_assert!(registered.is_none());
                prop_assert_eq!(reported, factory);
            }
        }

        // Hex case never changes the outcome
        let upper = format!("0x{}", hex::encode(bytes).to_uppercase());
        prop_assert_eq!(registry.resolve_str(&upper), registry.resolve(factory));
    }
}
