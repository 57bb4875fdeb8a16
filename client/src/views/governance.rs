//! Governance position of one account

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use love20_protocol::abi::{decode_stake_status, MINT_ABI, STAKE_ABI};
use love20_protocol::{serde_u256, Love20Config, StakeStatus, TokenContext, BPS_DENOMINATOR};

use crate::batch::{BatchExecutor, ReadBatch};
use crate::chain::ContractCall;
use crate::derive;
use crate::Result;

/// Governance figures for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceView {
    pub current_round: u64,

    /// Total governance votes for the token
    #[serde(with = "serde_u256")]
    pub total_gov_votes: U256,

    /// Account's valid governance votes
    #[serde(with = "serde_u256")]
    pub valid_gov_votes: U256,

    pub stake: StakeStatus,

    /// Account's share of governance votes
    pub gov_vote_share_bps: u64,

    /// Whether the account may submit an action this round
    pub can_submit_action: bool,

    /// Governance reward paid out for the previous round
    #[serde(with = "serde_u256")]
    pub last_round_gov_reward: U256,

    /// Estimated yearly return on staked tokens; unknown without a stake
    pub estimated_apy_bps: Option<u64>,
}

/// Whether `valid` votes out of `total` reach `min_bps`
pub fn can_submit_action(valid: U256, total: U256, min_bps: u64) -> bool {
    if total.is_zero() || valid.is_zero() {
        return false;
    }
    valid.full_mul(U256::from(BPS_DENOMINATOR)) >= total.full_mul(U256::from(min_bps))
}

/// Estimated APY from the account's share of last round's governance reward
pub fn estimate_apy_bps(
    last_round_gov_reward: U256,
    valid_gov_votes: U256,
    total_gov_votes: U256,
    staked: U256,
    rounds_per_year: u64,
) -> Option<u64> {
    if staked.is_zero() {
        return None;
    }
    let reward_per_round = derive::mul_div(last_round_gov_reward, valid_gov_votes, total_gov_votes);
    Some(derive::annualized_yield_bps(reward_per_round, rounds_per_year, staked))
}

/// Load the governance view for `account`
pub async fn load_governance(
    executor: &BatchExecutor,
    config: &Love20Config,
    token: &TokenContext,
    account: Address,
) -> Result<GovernanceView> {
    let stake = config.contracts.stake;

    // Stage 1: round and vote figures
    let mut batch = ReadBatch::new();
    let round = batch.push(ContractCall::new(stake, &STAKE_ABI, "currentRound", vec![]));
    let total = batch.push(ContractCall::new(
        stake,
        &STAKE_ABI,
        "govVotesNum",
        vec![Token::Address(token.address)],
    ));
    let valid = batch.push(ContractCall::new(
        stake,
        &STAKE_ABI,
        "validGovVotes",
        vec![Token::Address(token.address), Token::Address(account)],
    ));
    let status = batch.push(ContractCall::new(
        stake,
        &STAKE_ABI,
        "accountStakeStatus",
        vec![Token::Address(token.address), Token::Address(account)],
    ));
    let results = executor.execute(batch).await?;

    let current_round = results.uint_or_zero(round).low_u64();
    let total_gov_votes = results.uint_or_zero(total);
    let valid_gov_votes = results.uint_or_zero(valid);
    let stake_status = match results.tokens(status) {
        Some(tokens) => decode_stake_status(&tokens)?,
        None => StakeStatus::default(),
    };

    // Stage 2: previous round's reward, once the round is known
    let mut batch = ReadBatch::new();
    let reward = batch.push_if((current_round > 0).then(|| {
        ContractCall::new(
            config.contracts.mint,
            &MINT_ABI,
            "govReward",
            vec![Token::Address(token.address), Token::Uint(U256::from(current_round - 1))],
        )
    }));
    let reward_results = executor.execute(batch).await?;
    let last_round_gov_reward = reward_results.uint_or_zero(reward);

    let view = GovernanceView {
        current_round,
        total_gov_votes,
        valid_gov_votes,
        stake: stake_status,
        gov_vote_share_bps: derive::share_bps(valid_gov_votes, total_gov_votes),
        can_submit_action: can_submit_action(
            valid_gov_votes,
            total_gov_votes,
            config.protocol.submit_min_gov_vote_bps,
        ),
        last_round_gov_reward,
        estimated_apy_bps: estimate_apy_bps(
            last_round_gov_reward,
            valid_gov_votes,
            total_gov_votes,
            stake_status.st_amount,
            config.protocol.rounds_per_year(),
        ),
    };

    debug!(
        symbol = %token.symbol,
        account = ?account,
        round = current_round,
        share_bps = view.gov_vote_share_bps,
        "Governance view loaded"
    );
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_submit_threshold() {
        // 1% minimum
        assert!(can_submit_action(U256::from(1), U256::from(100), 100));
        assert!(!can_submit_action(U256::from(99), U256::from(10_000), 100));
        assert!(!can_submit_action(U256::zero(), U256::from(100), 0));
        assert!(!can_submit_action(U256::from(5), U256::zero(), 100));
    }

    #[test]
    fn test_apy_requires_stake() {
        assert_eq!(estimate_apy_bps(U256::from(100), U256::from(1), U256::from(2), U256::zero(), 365), None);

        // Half of 100 per round, 365 rounds, on 36_500 staked: 50%
        let apy = estimate_apy_bps(U256::from(100), U256::from(1), U256::from(2), U256::from(36_500), 365);
        assert_eq!(apy, Some(5_000));
    }
}
