//! Action metadata, group names and governor status
//!
//! These loaders consult the local cache first and batch only the misses.
//! Action metadata never changes once created and is cached without expiry;
//! group names and governor status use the configured TTLs.

use std::collections::HashMap;

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use love20_protocol::abi::{decode_action_info, GROUP_ABI, JOIN_ABI, STAKE_ABI, SUBMIT_ABI};
use love20_protocol::{serde_u256, ActionInfo, ExtensionRegistry, Love20Config, TokenContext};

use crate::batch::{BatchExecutor, ReadBatch};
use crate::cache::{keys, CacheOptions, Clock, LocalCache, StorageBackend};
use crate::chain::ContractCall;
use crate::dispatch::{load_action_extension, load_extension_view, ExtensionView};
use crate::{ClientError, Result};

/// Whether an account currently holds governance votes for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorStatus {
    pub is_governor: bool,

    #[serde(with = "serde_u256")]
    pub valid_gov_votes: U256,
}

/// Action with its extension and the account's participation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionView {
    pub info: ActionInfo,

    #[serde(with = "serde_u256::option")]
    pub joined_amount: Option<U256>,

    pub extension: Option<ExtensionView>,
}

fn store<S: StorageBackend, C: Clock, T: Serialize>(
    cache: &LocalCache<S, C>,
    key: &str,
    value: &T,
    options: CacheOptions,
) {
    if let Err(e) = cache.set(key, value, options) {
        warn!(key = key, error = %e, "Failed to cache value");
    }
}

/// Load action metadata for `ids`; missing or undecodable actions are `None`
pub async fn load_action_infos<S: StorageBackend, C: Clock>(
    executor: &BatchExecutor,
    cache: &LocalCache<S, C>,
    config: &Love20Config,
    token: &TokenContext,
    ids: &[U256],
) -> Result<Vec<Option<ActionInfo>>> {
    let mut found: Vec<Option<ActionInfo>> = ids
        .iter()
        .map(|id| cache.get::<ActionInfo>(&keys::action_base_info(&token.address, *id)))
        .collect();

    let mut batch = ReadBatch::new();
    let misses: Vec<_> = ids
        .iter()
        .enumerate()
        .filter(|(index, _)| found[*index].is_none())
        .map(|(index, id)| {
            let slot = batch.push(ContractCall::new(
                config.contracts.submit,
                &SUBMIT_ABI,
                "actionInfo",
                vec![Token::Address(token.address), Token::Uint(*id)],
            ));
            (index, *id, slot)
        })
        .collect();

    debug!(requested = ids.len(), misses = misses.len(), "Loading action infos");
    let results = executor.execute(batch).await?;

    for (index, id, slot) in misses {
        let Some(tokens) = results.tokens(slot) else {
            continue;
        };
        match decode_action_info(&tokens) {
            // An unset action decodes with author zero
            Ok(info) if !info.author.is_zero() => {
                store(cache, &keys::action_base_info(&token.address, id), &info, CacheOptions::never());
                found[index] = Some(info);
            }
            Ok(_) => {}
            Err(e) => warn!(action_id = %id, error = %e, "Undecodable action info"),
        }
    }

    Ok(found)
}

/// Load display names for `group_ids`; unknown groups are left out
pub async fn load_group_names<S: StorageBackend, C: Clock>(
    executor: &BatchExecutor,
    cache: &LocalCache<S, C>,
    config: &Love20Config,
    group_ids: &[U256],
) -> Result<HashMap<U256, String>> {
    let mut names = HashMap::with_capacity(group_ids.len());
    let mut batch = ReadBatch::new();
    let mut misses = Vec::new();

    for id in group_ids {
        if names.contains_key(id) {
            continue;
        }
        match cache.get::<String>(&keys::group_name(*id)) {
            Some(name) => {
                names.insert(*id, name);
            }
            None if !misses.iter().any(|(missing, _)| missing == id) => {
                let slot = batch.push(ContractCall::new(
                    config.contracts.group,
                    &GROUP_ABI,
                    "groupNameOf",
                    vec![Token::Uint(*id)],
                ));
                misses.push((*id, slot));
            }
            None => {}
        }
    }

    let results = executor.execute(batch).await?;
    let ttl = CacheOptions::expires_in(config.cache.group_name_ttl());
    for (id, slot) in misses {
        if let Some(name) = results.string(slot).filter(|name| !name.is_empty()) {
            store(cache, &keys::group_name(id), &name, ttl);
            names.insert(id, name);
        }
    }

    Ok(names)
}

/// Load governor status for `accounts`
pub async fn load_governor_statuses<S: StorageBackend, C: Clock>(
    executor: &BatchExecutor,
    cache: &LocalCache<S, C>,
    config: &Love20Config,
    token: &TokenContext,
    accounts: &[Address],
) -> Result<HashMap<Address, GovernorStatus>> {
    let mut statuses = HashMap::with_capacity(accounts.len());
    let mut batch = ReadBatch::new();
    let mut misses = Vec::new();

    for account in accounts {
        if statuses.contains_key(account) || misses.iter().any(|(missing, _)| missing == account) {
            continue;
        }
        match cache.get::<GovernorStatus>(&keys::governor_status(&token.address, account)) {
            Some(status) => {
                statuses.insert(*account, status);
            }
            None => {
                let slot = batch.push(ContractCall::new(
                    config.contracts.stake,
                    &STAKE_ABI,
                    "validGovVotes",
                    vec![Token::Address(token.address), Token::Address(*account)],
                ));
                misses.push((*account, slot));
            }
        }
    }

    let results = executor.execute(batch).await?;
    let ttl = CacheOptions::expires_in(config.cache.governor_status_ttl());
    for (account, slot) in misses {
        // Failed reads are not cached so the next load retries them
        let Some(valid_gov_votes) = results.uint(slot) else {
            continue;
        };
        let status = GovernorStatus {
            is_governor: !valid_gov_votes.is_zero(),
            valid_gov_votes,
        };
        store(cache, &keys::governor_status(&token.address, &account), &status, ttl);
        statuses.insert(account, status);
    }

    Ok(statuses)
}

/// Load one action together with its extension and the account's stake in it
#[allow(clippy::too_many_arguments)]
pub async fn load_action_view<S: StorageBackend, C: Clock>(
    executor: &BatchExecutor,
    cache: &LocalCache<S, C>,
    config: &Love20Config,
    registry: &ExtensionRegistry,
    token: &TokenContext,
    action_id: U256,
    account: Option<Address>,
) -> Result<Option<ActionView>> {
    let joined = async {
        let mut batch = ReadBatch::new();
        let slot = batch.push_if(account.map(|account| {
            ContractCall::new(
                config.contracts.join,
                &JOIN_ABI,
                "amountByActionIdByAccount",
                vec![Token::Address(token.address), Token::Uint(action_id), Token::Address(account)],
            )
        }));
        let results = executor.execute(batch).await?;
        Ok::<_, ClientError>(results.uint(slot))
    };

    // Independent stages run together; the extension view needs the address first
    let ids = [action_id];
    let (mut infos, extension, joined_amount) = futures::try_join!(
        load_action_infos(executor, cache, config, token, &ids),
        load_action_extension(executor.client(), &config.contracts, token, action_id),
        joined,
    )?;

    let Some(info) = infos.pop().flatten() else {
        debug!(symbol = %token.symbol, action_id = %action_id, "Action not found");
        return Ok(None);
    };

    let extension = match extension {
        Some(address) => Some(load_extension_view(executor, registry, address, account).await?),
        None => None,
    };

    Ok(Some(ActionView {
        info,
        joined_amount,
        extension,
    }))
}
