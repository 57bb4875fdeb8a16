//! Action reward list

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use love20_protocol::abi::{decode_action_reward, MINT_ABI};
use love20_protocol::{Love20Config, RewardRecord, TokenContext};

use crate::batch::{BatchExecutor, BatchResults, ReadBatch, Slot};
use crate::cache::Clock;
use crate::chain::ContractCall;
use crate::memo::ViewMemo;
use crate::pending::{OperationId, PendingWriteLog};
use crate::Result;

/// How a reward row is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardDisplay {
    /// Reward exists and can be minted
    Mintable,

    Minted,

    /// Mint confirmed locally, not yet visible to reads
    MintPending,

    /// No reward for this round
    Empty,
}

impl fmt::Display for RewardDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RewardDisplay::Mintable => "Mintable",
            RewardDisplay::Minted => "Minted",
            RewardDisplay::MintPending => "Minting",
            RewardDisplay::Empty => "-",
        };
        f.write_str(label)
    }
}

/// One round's reward with its display state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRow {
    pub record: RewardRecord,
    pub display: RewardDisplay,
}

/// Rewards of one account in one action over a list of rounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsView {
    pub token: Address,
    pub action_id: u64,
    pub account: Address,
    pub rows: Vec<RewardRow>,
}

impl RewardsView {
    /// Rounds that can be minted right now
    pub fn mintable_rounds(&self) -> Vec<u64> {
        self.rows
            .iter()
            .filter(|row| row.display == RewardDisplay::Mintable)
            .map(|row| row.record.round)
            .collect()
    }
}

/// The `count` rounds before `current_round`, newest first
pub fn recent_rounds(current_round: u64, count: usize) -> Vec<u64> {
    (0..current_round).rev().take(count).collect()
}

fn display_for<C: Clock>(record: &RewardRecord, operation: &OperationId, pending: &PendingWriteLog<C>) -> RewardDisplay {
    let still_pending = pending.reconcile(operation, record.is_minted);
    if record.is_minted {
        RewardDisplay::Minted
    } else if record.reward.is_zero() {
        RewardDisplay::Empty
    } else if still_pending {
        RewardDisplay::MintPending
    } else {
        RewardDisplay::Mintable
    }
}

fn derive_rows<C: Clock>(
    results: &BatchResults,
    slots: &[(u64, Slot)],
    token: Address,
    action_id: U256,
    account: Address,
    pending: &PendingWriteLog<C>,
) -> Result<Vec<RewardRow>> {
    slots
        .iter()
        .map(|(round, slot)| {
            let (reward, is_minted) = match results.tokens(*slot) {
                Some(tokens) => decode_action_reward(&tokens)?,
                None => (U256::zero(), false),
            };
            let record = RewardRecord {
                round: *round,
                reward,
                is_minted,
            };
            let operation = OperationId::mint_action_reward(token, *round, action_id, account);
            Ok(RewardRow {
                display: display_for(&record, &operation, pending),
                record,
            })
        })
        .collect()
}

/// Load reward rows for `rounds` in one batch
pub async fn load_action_rewards<C: Clock>(
    executor: &BatchExecutor,
    config: &Love20Config,
    token: &TokenContext,
    action_id: u64,
    account: Address,
    rounds: &[u64],
    pending: &PendingWriteLog<C>,
) -> Result<RewardsView> {
    let (results, slots) = fetch(executor, config, token, action_id, account, rounds).await?;
    let rows = derive_rows(&results, &slots, token.address, U256::from(action_id), account, pending)?;

    debug!(symbol = %token.symbol, action_id = action_id, rounds = rounds.len(), "Rewards loaded");
    Ok(RewardsView {
        token: token.address,
        action_id,
        account,
        rows,
    })
}

/// Like [`load_action_rewards`], but returns the memoized view when neither
/// the raw reads nor the pending log changed
#[allow(clippy::too_many_arguments)]
pub async fn load_action_rewards_memoized<C: Clock>(
    executor: &BatchExecutor,
    memo: &ViewMemo<RewardsView>,
    config: &Love20Config,
    token: &TokenContext,
    action_id: u64,
    account: Address,
    rounds: &[u64],
    pending: &PendingWriteLog<C>,
) -> Result<Arc<RewardsView>> {
    let (results, slots) = fetch(executor, config, token, action_id, account, rounds).await?;
    let rows = derive_rows(&results, &slots, token.address, U256::from(action_id), account, pending)?;

    let mut hasher = DefaultHasher::new();
    results.fingerprint().hash(&mut hasher);
    rounds.hash(&mut hasher);
    rows.iter().map(|row| row.display).collect::<Vec<_>>().hash(&mut hasher);

    let key = format!("rewards_{:#x}_{}_{:#x}", token.address, action_id, account);
    Ok(memo.get_or_derive(&key, hasher.finish(), || RewardsView {
        token: token.address,
        action_id,
        account,
        rows,
    }))
}

async fn fetch(
    executor: &BatchExecutor,
    config: &Love20Config,
    token: &TokenContext,
    action_id: u64,
    account: Address,
    rounds: &[u64],
) -> Result<(BatchResults, Vec<(u64, Slot)>)> {
    let mut batch = ReadBatch::new();
    let slots = rounds
        .iter()
        .map(|round| {
            let slot = batch.push(ContractCall::new(
                config.contracts.mint,
                &MINT_ABI,
                "actionRewardByActionIdByAccount",
                vec![
                    Token::Address(token.address),
                    Token::Uint(U256::from(*round)),
                    Token::Uint(U256::from(action_id)),
                    Token::Address(account),
                ],
            ));
            (*round, slot)
        })
        .collect::<Vec<_>>();

    let results = executor.execute(batch).await?;
    Ok((results, slots))
}
