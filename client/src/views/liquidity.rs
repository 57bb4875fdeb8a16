//! Token / parent-token liquidity pool

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use love20_protocol::abi::{decode_reserves, UNISWAP_V2_FACTORY_ABI, UNISWAP_V2_PAIR_ABI};
use love20_protocol::{serde_u256, Love20Config, PairReserves, TokenContext};

use super::first_output;
use crate::batch::{BatchExecutor, ReadBatch};
use crate::chain::ContractCall;
use crate::derive;
use crate::{ClientError, Result};

/// State of the token's pool against its parent token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolView {
    /// Pair address; `None` when no pool exists yet
    pub pair: Option<Address>,

    pub reserves: PairReserves,

    #[serde(with = "serde_u256")]
    pub lp_total_supply: U256,

    #[serde(with = "serde_u256::option")]
    pub account_lp_balance: Option<U256>,

    /// Parent tokens per token, scaled by 10^18
    #[serde(with = "serde_u256")]
    pub price_wad: U256,

    /// Pool value in parent tokens
    #[serde(with = "serde_u256")]
    pub pool_value_in_parent: U256,

    pub account_share_bps: Option<u64>,

    #[serde(with = "serde_u256::option")]
    pub account_value_in_parent: Option<U256>,
}

impl PoolView {
    /// Parent tokens needed alongside `token_amount` when adding liquidity
    pub fn quote_parent_for(&self, token_amount: U256) -> U256 {
        derive::quote(token_amount, self.reserves.token_reserve, self.reserves.parent_reserve)
    }

    /// Tokens needed alongside `parent_amount` when adding liquidity
    pub fn quote_token_for(&self, parent_amount: U256) -> U256 {
        derive::quote(parent_amount, self.reserves.parent_reserve, self.reserves.token_reserve)
    }

    /// Parent tokens received for selling `token_amount`
    pub fn sell_token_out(&self, token_amount: U256) -> U256 {
        derive::amount_out(token_amount, self.reserves.token_reserve, self.reserves.parent_reserve)
    }

    /// Tokens received for spending `parent_amount`
    pub fn buy_token_out(&self, parent_amount: U256) -> U256 {
        derive::amount_out(parent_amount, self.reserves.parent_reserve, self.reserves.token_reserve)
    }
}

/// Load the pool view; `account` adds the account's LP position
pub async fn load_pool(
    executor: &BatchExecutor,
    config: &Love20Config,
    token: &TokenContext,
    account: Option<Address>,
) -> Result<PoolView> {
    if !token.has_parent() {
        return Err(ClientError::invalid_input(format!("{} has no parent token", token.symbol)));
    }

    // Stage 1: pair lookup
    let tokens = ContractCall::new(
        config.contracts.uniswap_v2_factory,
        &UNISWAP_V2_FACTORY_ABI,
        "getPair",
        vec![Token::Address(token.address), Token::Address(token.parent_token_address)],
    )
    .read(executor.client())
    .await?;
    let pair = first_output(tokens, "getPair", Token::into_address)?;
    if pair.is_zero() {
        debug!(symbol = %token.symbol, "No pool yet");
        return Ok(PoolView::default());
    }

    // Stage 2: pair state
    let mut batch = ReadBatch::new();
    let reserves = batch.push(ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "getReserves", vec![]));
    let token0 = batch.push(ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "token0", vec![]));
    let supply = batch.push(ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "totalSupply", vec![]));
    let balance = batch.push_if(account.map(|account| {
        ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "balanceOf", vec![Token::Address(account)])
    }));
    let results = executor.execute(batch).await?;

    let (reserve0, reserve1) = match results.tokens(reserves) {
        Some(tokens) => decode_reserves(&tokens)?,
        None => (U256::zero(), U256::zero()),
    };
    let token_is_token0 = results.address(token0).map_or(true, |token0| token0 == token.address);
    let reserves = PairReserves::ordered(reserve0, reserve1, token_is_token0);

    let lp_total_supply = results.uint_or_zero(supply);
    let account_lp_balance = results.uint(balance);
    let pool_value_in_parent = derive::pool_value_in_parent(&reserves);

    Ok(PoolView {
        pair: Some(pair),
        reserves,
        lp_total_supply,
        account_lp_balance,
        price_wad: derive::price_wad(&reserves),
        pool_value_in_parent,
        account_share_bps: account_lp_balance.map(|lp| derive::share_bps(lp, lp_total_supply)),
        account_value_in_parent: account_lp_balance
            .map(|lp| derive::lp_share_value(lp, lp_total_supply, pool_value_in_parent)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChainClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pool_orders_reserves_and_values_position() {
        let fake = Arc::new(FakeChainClient::read_only());
        let mut config = Love20Config::default();
        config.contracts.uniswap_v2_factory = Address::repeat_byte(0xfa);

        // Parent sorts before the token, so the token is token1
        let token = TokenContext {
            symbol: "LIFE".to_string(),
            address: Address::repeat_byte(0xaa),
            decimals: 18,
            parent_token_address: Address::repeat_byte(0x11),
            parent_token_symbol: Some("LOVE20".to_string()),
            has_ended: true,
            initial_stake_round: U256::one(),
        };
        let pair = Address::repeat_byte(0x77);
        let account = Address::repeat_byte(0x01);

        fake.respond(
            &ContractCall::new(
                config.contracts.uniswap_v2_factory,
                &UNISWAP_V2_FACTORY_ABI,
                "getPair",
                vec![Token::Address(token.address), Token::Address(token.parent_token_address)],
            ),
            vec![Token::Address(pair)],
        );
        fake.respond(
            &ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "getReserves", vec![]),
            vec![Token::Uint(U256::from(1_000)), Token::Uint(U256::from(4_000)), Token::Uint(U256::zero())],
        );
        fake.respond(
            &ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "token0", vec![]),
            vec![Token::Address(token.parent_token_address)],
        );
        fake.respond(
            &ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "totalSupply", vec![]),
            vec![Token::Uint(U256::from(100))],
        );
        fake.respond(
            &ContractCall::new(pair, &UNISWAP_V2_PAIR_ABI, "balanceOf", vec![Token::Address(account)]),
            vec![Token::Uint(U256::from(25))],
        );
        let executor = BatchExecutor::new(fake, 50);

        let pool = load_pool(&executor, &config, &token, Some(account)).await.unwrap();

        assert_eq!(pool.reserves.token_reserve, U256::from(4_000));
        assert_eq!(pool.reserves.parent_reserve, U256::from(1_000));
        assert_eq!(pool.pool_value_in_parent, U256::from(2_000));
        assert_eq!(pool.account_share_bps, Some(2_500));
        assert_eq!(pool.account_value_in_parent, Some(U256::from(500)));
        assert_eq!(pool.quote_parent_for(U256::from(400)), U256::from(100));
    }

    #[tokio::test]
    async fn test_root_token_has_no_pool() {
        let executor = BatchExecutor::new(Arc::new(FakeChainClient::read_only()), 50);
        let token = TokenContext {
            symbol: "LOVE20".to_string(),
            address: Address::repeat_byte(0xaa),
            decimals: 18,
            parent_token_address: Address::zero(),
            parent_token_symbol: None,
            has_ended: true,
            initial_stake_round: U256::one(),
        };

        assert!(load_pool(&executor, &Love20Config::default(), &token, None).await.is_err());
    }
}
