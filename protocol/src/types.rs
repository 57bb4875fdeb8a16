//! Domain types mirrored from LOVE20 contract storage

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// A launched token and the lifecycle flags the client cares about.
///
/// Loaded once per session and passed explicitly to every loader that needs
/// it, so staleness is visible at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContext {
    /// Token symbol as registered at launch
    pub symbol: String,

    /// ERC20 address
    pub address: Address,

    /// ERC20 decimals
    pub decimals: u8,

    /// Token the launch was funded with (zero for the root token)
    pub parent_token_address: Address,

    /// Parent symbol, when the parent is known
    pub parent_token_symbol: Option<String>,

    /// Whether the fair launch has finished
    pub has_ended: bool,

    /// First round in which staking was possible
    #[serde(with = "crate::serde_u256")]
    pub initial_stake_round: U256,
}

impl TokenContext {
    /// Whether this token has a parent token
    pub fn has_parent(&self) -> bool {
        !self.parent_token_address.is_zero()
    }

    /// Whether staking has opened
    pub fn staking_open(&self) -> bool {
        self.has_ended && !self.initial_stake_round.is_zero()
    }
}

/// Immutable description of an action, as written by `submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    #[serde(with = "crate::serde_u256")]
    pub id: U256,
    pub author: Address,
    #[serde(with = "crate::serde_u256")]
    pub create_at_block: U256,
    #[serde(with = "crate::serde_u256")]
    pub min_stake: U256,
    #[serde(with = "crate::serde_u256")]
    pub max_random_accounts: U256,
    pub white_list_address: Address,
    pub title: String,
    pub verification_rule: String,
}

/// Reward owed to one account for one action in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Round the reward belongs to
    pub round: u64,

    /// Reward amount in token base units
    #[serde(with = "crate::serde_u256")]
    pub reward: U256,

    /// Whether the reward has been minted on-chain
    pub is_minted: bool,
}

impl RewardRecord {
    /// A reward that exists and has not been claimed yet
    pub fn is_mintable(&self) -> bool {
        !self.is_minted && !self.reward.is_zero()
    }
}

/// Staking position of one account for one token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StakeStatus {
    /// Staked liquidity token amount
    #[serde(with = "crate::serde_u256")]
    pub sl_amount: U256,

    /// Staked token amount
    #[serde(with = "crate::serde_u256")]
    pub st_amount: U256,

    /// Waiting phases promised at stake time
    #[serde(with = "crate::serde_u256")]
    pub promised_waiting_phases: U256,

    /// Round in which unstaking was requested (zero if never)
    #[serde(with = "crate::serde_u256")]
    pub requested_unstake_round: U256,

    /// Governance votes granted by this stake
    #[serde(with = "crate::serde_u256")]
    pub gov_votes: U256,
}

/// Reserves of a Uniswap-V2-style pair, ordered as (token, parent token)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PairReserves {
    #[serde(with = "crate::serde_u256")]
    pub token_reserve: U256,
    #[serde(with = "crate::serde_u256")]
    pub parent_reserve: U256,
}

impl PairReserves {
    /// Order raw pair reserves given which side holds `token`
    pub fn ordered(reserve0: U256, reserve1: U256, token_is_token0: bool) -> Self {
        if token_is_token0 {
            Self { token_reserve: reserve0, parent_reserve: reserve1 }
        } else {
            Self { token_reserve: reserve1, parent_reserve: reserve0 }
        }
    }

    /// Whether either side is empty
    pub fn is_empty(&self) -> bool {
        self.token_reserve.is_zero() || self.parent_reserve.is_zero()
    }
}
