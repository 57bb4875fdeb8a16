//! Test utilities and helpers
//!
//! Shared fixtures and scripted responses for the integration tests.

#![allow(dead_code)]

use ethers::abi::Token;
use ethers::types::{Address, U256};

use love20_client::chain::ContractCall;
use love20_client::testing::FakeChainClient;
use love20_protocol::abi::MINT_ABI;
use love20_protocol::{Love20Config, TokenContext};

/// Token used across the scenarios (`0xAAA…`)
pub fn token_address() -> Address {
    Address::repeat_byte(0xaa)
}

/// Account connected in the scenarios
pub fn account() -> Address {
    Address::repeat_byte(0x01)
}

/// Configuration with every contract pointed at a distinct fake address
pub fn sample_config() -> Love20Config {
    let mut config = Love20Config::default();
    let contracts = &mut config.contracts;
    contracts.launch = Address::repeat_byte(0x1a);
    contracts.submit = Address::repeat_byte(0x2a);
    contracts.vote = Address::repeat_byte(0x3a);
    contracts.join = Address::repeat_byte(0x4a);
    contracts.stake = Address::repeat_byte(0x5a);
    contracts.mint = Address::repeat_byte(0x6a);
    contracts.group = Address::repeat_byte(0x7a);
    contracts.extension_center = Address::repeat_byte(0x8a);
    contracts.uniswap_v2_factory = Address::repeat_byte(0x9a);
    contracts.lp_extension_factory = Address::repeat_byte(0xf1);
    contracts.group_action_extension_factory = Address::repeat_byte(0xf2);
    contracts.group_service_extension_factory = Address::repeat_byte(0xf3);
    config
}

/// Child token of LOVE20 that has finished its launch
pub fn sample_token() -> TokenContext {
    TokenContext {
        symbol: "LIFE".to_string(),
        address: token_address(),
        decimals: 18,
        parent_token_address: Address::repeat_byte(0x20),
        parent_token_symbol: Some("LOVE20".to_string()),
        has_ended: true,
        initial_stake_round: U256::from(3),
    }
}

/// `mint.actionRewardByActionIdByAccount` call for one round
pub fn reward_call(config: &Love20Config, round: u64, action_id: u64, account: Address) -> ContractCall {
    ContractCall::new(
        config.contracts.mint,
        &MINT_ABI,
        "actionRewardByActionIdByAccount",
        vec![
            Token::Address(token_address()),
            Token::Uint(U256::from(round)),
            Token::Uint(U256::from(action_id)),
            Token::Address(account),
        ],
    )
}

/// Script a reward read
pub fn script_reward(fake: &FakeChainClient, config: &Love20Config, round: u64, action_id: u64, reward: U256, is_minted: bool) {
    fake.respond(
        &reward_call(config, round, action_id, account()),
        vec![Token::Uint(reward), Token::Bool(is_minted)],
    );
}
