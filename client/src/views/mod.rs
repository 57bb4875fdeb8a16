//! Composite read views
//!
//! Each loader is an explicit pipeline of batched stages: a stage only
//! starts once the values it depends on are known, and independent stages
//! run concurrently. Configuration and the token context are always passed
//! in by the caller.

pub mod action;
pub mod governance;
pub mod liquidity;
pub mod rewards;
pub mod token;

pub use action::{
    load_action_infos, load_action_view, load_governor_statuses, load_group_names, ActionView, GovernorStatus,
};
pub use governance::{can_submit_action, load_governance, GovernanceView};
pub use liquidity::{load_pool, PoolView};
pub use rewards::{load_action_rewards, load_action_rewards_memoized, recent_rounds, RewardDisplay, RewardRow, RewardsView};
pub use token::{load_token, load_token_overview, TokenOverview};

use ethers::abi::Token;

use crate::ClientError;

/// First output token of a single read as a given type
pub(crate) fn first_output<T>(
    tokens: Vec<Token>,
    function: &'static str,
    convert: fn(Token) -> Option<T>,
) -> crate::Result<T> {
    tokens
        .into_iter()
        .next()
        .and_then(convert)
        .ok_or_else(|| ClientError::decode(function, "unexpected output type"))
}
