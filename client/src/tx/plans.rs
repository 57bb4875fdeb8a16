//! Ready-made transaction sequences

use ethers::abi::Token;
use ethers::types::{Address, U256};
use tracing::debug;

use love20_protocol::abi::{ERC20_ABI, JOIN_ABI, MINT_ABI, STAKE_ABI};
use love20_protocol::config::Love20Config;
use love20_protocol::TokenContext;

use super::{TxSequence, TxStep};
use crate::chain::{ChainClient, ContractCall};
use crate::{ClientError, Result};

/// Current ERC20 allowance of `owner` towards `spender`
pub async fn allowance(client: &dyn ChainClient, token: Address, owner: Address, spender: Address) -> Result<U256> {
    let tokens = ContractCall::new(
        token,
        &ERC20_ABI,
        "allowance",
        vec![Token::Address(owner), Token::Address(spender)],
    )
    .read(client)
    .await?;

    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| ClientError::decode("allowance", "expected a uint"))
}

/// `approve(spender, amount)` on `token`
pub fn approve_call(token: Address, spender: Address, amount: U256) -> ContractCall {
    ContractCall::new(
        token,
        &ERC20_ABI,
        "approve",
        vec![Token::Address(spender), Token::Uint(amount)],
    )
}

/// Approve `spender` for `amount` of `token` and then run `action`.
///
/// The approve step is left out when the current allowance already covers
/// `amount`.
pub async fn plan_approve_then(
    client: &dyn ChainClient,
    config: &Love20Config,
    token: Address,
    spender: Address,
    amount: U256,
    action: TxStep,
) -> Result<TxSequence> {
    let owner = client.account().ok_or(ClientError::NoSigner)?;
    let current = allowance(client, token, owner, spender).await?;

    let mut steps = Vec::with_capacity(2);
    if current < amount {
        steps.push(TxStep::new("approve", approve_call(token, spender, amount)));
    } else {
        debug!(token = ?token, spender = ?spender, allowance = %current, "Allowance sufficient, skipping approve");
    }
    steps.push(action);

    Ok(TxSequence::new(steps, config.network.confirmations))
}

fn require_positive(amount: U256, what: &str) -> Result<()> {
    if amount.is_zero() {
        return Err(ClientError::invalid_input(format!("{} must be greater than zero", what)));
    }
    Ok(())
}

/// Approve the stake contract, then `stakeToken`
pub async fn stake_token_plan(
    client: &dyn ChainClient,
    config: &Love20Config,
    token: &TokenContext,
    amount: U256,
    promised_waiting_phases: U256,
) -> Result<TxSequence> {
    require_positive(amount, "Stake amount")?;
    require_positive(promised_waiting_phases, "Waiting phases")?;
    let to = client.account().ok_or(ClientError::NoSigner)?;

    let stake = TxStep::new(
        "stake_token",
        ContractCall::new(
            config.contracts.stake,
            &STAKE_ABI,
            "stakeToken",
            vec![
                Token::Address(token.address),
                Token::Uint(amount),
                Token::Uint(promised_waiting_phases),
                Token::Address(to),
            ],
        ),
    );

    plan_approve_then(client, config, token.address, config.contracts.stake, amount, stake).await
}

/// Approve the join contract, then `join`
pub async fn join_plan(
    client: &dyn ChainClient,
    config: &Love20Config,
    token: &TokenContext,
    action_id: U256,
    amount: U256,
    verification_infos: Vec<String>,
) -> Result<TxSequence> {
    require_positive(amount, "Join amount")?;

    let join = TxStep::new(
        "join",
        ContractCall::new(
            config.contracts.join,
            &JOIN_ABI,
            "join",
            vec![
                Token::Address(token.address),
                Token::Uint(action_id),
                Token::Uint(amount),
                Token::Array(verification_infos.into_iter().map(Token::String).collect()),
            ],
        ),
    );

    plan_approve_then(client, config, token.address, config.contracts.join, amount, join).await
}

/// Single-step `mintActionReward`
pub fn mint_reward_plan(config: &Love20Config, token: &TokenContext, round: u64, action_id: U256) -> TxSequence {
    let mint = TxStep::new(
        "mint_action_reward",
        ContractCall::new(
            config.contracts.mint,
            &MINT_ABI,
            "mintActionReward",
            vec![
                Token::Address(token.address),
                Token::Uint(U256::from(round)),
                Token::Uint(action_id),
            ],
        ),
    );
    TxSequence::new(vec![mint], config.network.confirmations)
}
