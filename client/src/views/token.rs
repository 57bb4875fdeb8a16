//! Token context and balances

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use love20_protocol::abi::{decode_launch_info, ERC20_ABI, LAUNCH_ABI, STAKE_ABI};
use love20_protocol::{serde_u256, Love20Config, ProtocolError, TokenContext};

use super::first_output;
use crate::batch::{BatchExecutor, ReadBatch};
use crate::chain::ContractCall;
use crate::{ClientError, Result};

/// Token context plus supply and balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOverview {
    pub context: TokenContext,

    #[serde(with = "serde_u256")]
    pub total_supply: U256,

    /// Connected account's balance
    #[serde(with = "serde_u256::option")]
    pub balance: Option<U256>,

    /// Connected account's parent-token balance
    #[serde(with = "serde_u256::option")]
    pub parent_balance: Option<U256>,
}

fn validate_symbol(symbol: &str) -> Result<()> {
    let valid = !symbol.is_empty() && symbol.len() <= 32 && symbol.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(ProtocolError::InvalidSymbol(symbol.to_string()).into());
    }
    Ok(())
}

/// Resolve a symbol and load its [`TokenContext`]
pub async fn load_token(executor: &BatchExecutor, config: &Love20Config, symbol: &str) -> Result<TokenContext> {
    validate_symbol(symbol)?;
    let contracts = &config.contracts;

    // Stage 1: symbol → address
    let tokens = ContractCall::new(
        contracts.launch,
        &LAUNCH_ABI,
        "tokenAddressBySymbol",
        vec![Token::String(symbol.to_string())],
    )
    .read(executor.client())
    .await?;
    let address = first_output(tokens, "tokenAddressBySymbol", Token::into_address)?;
    if address.is_zero() {
        return Err(ClientError::invalid_input(format!("Unknown token symbol: {}", symbol)));
    }

    // Stage 2: everything keyed by the address
    let mut batch = ReadBatch::new();
    let decimals = batch.push(ContractCall::new(address, &ERC20_ABI, "decimals", vec![]));
    let launch = batch.push(ContractCall::new(
        contracts.launch,
        &LAUNCH_ABI,
        "launchInfo",
        vec![Token::Address(address)],
    ));
    let initial_round = batch.push(ContractCall::new(
        contracts.stake,
        &STAKE_ABI,
        "initialStakeRound",
        vec![Token::Address(address)],
    ));
    let results = executor.execute(batch).await?;

    let (parent_token_address, has_ended) = match results.tokens(launch) {
        Some(tokens) => decode_launch_info(&tokens)?,
        None => (Address::zero(), false),
    };
    let decimals = results.uint(decimals).map(|d| d.low_u32().min(u8::MAX as u32) as u8).unwrap_or(18);

    // Stage 3: parent symbol, only when there is a parent
    let mut batch = ReadBatch::new();
    let parent_symbol = batch.push_if(
        (!parent_token_address.is_zero())
            .then(|| ContractCall::new(parent_token_address, &ERC20_ABI, "symbol", vec![])),
    );
    let parent_results = executor.execute(batch).await?;

    let context = TokenContext {
        symbol: symbol.to_string(),
        address,
        decimals,
        parent_token_address,
        parent_token_symbol: parent_results.string(parent_symbol),
        has_ended,
        initial_stake_round: results.uint_or_zero(initial_round),
    };

    info!(symbol = %context.symbol, address = ?context.address, parent = ?context.parent_token_symbol, "Token loaded");
    Ok(context)
}

/// Supply and balances for an already loaded token
pub async fn load_token_overview(
    executor: &BatchExecutor,
    token: &TokenContext,
    account: Option<Address>,
) -> Result<TokenOverview> {
    let mut batch = ReadBatch::new();
    let supply = batch.push(ContractCall::new(token.address, &ERC20_ABI, "totalSupply", vec![]));
    let balance = batch.push_if(account.map(|account| {
        ContractCall::new(token.address, &ERC20_ABI, "balanceOf", vec![Token::Address(account)])
    }));
    let parent_balance = batch.push_if(account.filter(|_| token.has_parent()).map(|account| {
        ContractCall::new(
            token.parent_token_address,
            &ERC20_ABI,
            "balanceOf",
            vec![Token::Address(account)],
        )
    }));
    let results = executor.execute(batch).await?;

    debug!(symbol = %token.symbol, "Token overview loaded");
    Ok(TokenOverview {
        context: token.clone(),
        total_supply: results.uint_or_zero(supply),
        balance: results.uint(balance),
        parent_balance: results.uint(parent_balance),
    })
}
