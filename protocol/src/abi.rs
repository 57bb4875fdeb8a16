//! Contract ABIs and output decoders
//!
//! Only the functions the client actually calls are declared. Decoders turn
//! raw `Token` lists into the domain types in [`crate::types`].

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::types::{ActionInfo, StakeStatus};
use crate::{ProtocolError, Result};

/// ERC20 token ABI
pub static ERC20_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [{"name": "account", "type": "address"}],
            "name": "balanceOf",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "decimals",
            "outputs": [{"name": "", "type": "uint8"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "symbol",
            "outputs": [{"name": "", "type": "string"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "totalSupply",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "owner", "type": "address"},
                {"name": "spender", "type": "address"}
            ],
            "name": "allowance",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "spender", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ],
            "name": "approve",
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]))
    .expect("Valid ERC20 ABI")
});

/// Multicall3 `aggregate3`, used for every batched read
pub static MULTICALL3_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {
                    "components": [
                        {"name": "target", "type": "address"},
                        {"name": "allowFailure", "type": "bool"},
                        {"name": "callData", "type": "bytes"}
                    ],
                    "name": "calls",
                    "type": "tuple[]"
                }
            ],
            "name": "aggregate3",
            "outputs": [
                {
                    "components": [
                        {"name": "success", "type": "bool"},
                        {"name": "returnData", "type": "bytes"}
                    ],
                    "name": "returnData",
                    "type": "tuple[]"
                }
            ],
            "stateMutability": "payable",
            "type": "function"
        }
    ]))
    .expect("Valid Multicall3 ABI")
});

/// Uniswap V2 factory ABI (pair lookup)
pub static UNISWAP_V2_FACTORY_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenA", "type": "address"},
                {"name": "tokenB", "type": "address"}
            ],
            "name": "getPair",
            "outputs": [{"name": "pair", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid Uniswap V2 factory ABI")
});

/// Uniswap V2 pair ABI
pub static UNISWAP_V2_PAIR_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "getReserves",
            "outputs": [
                {"name": "reserve0", "type": "uint112"},
                {"name": "reserve1", "type": "uint112"},
                {"name": "blockTimestampLast", "type": "uint32"}
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "token0",
            "outputs": [{"name": "", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "totalSupply",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"name": "account", "type": "address"}],
            "name": "balanceOf",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid Uniswap V2 pair ABI")
});

/// Launch contract ABI
pub static LAUNCH_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [{"name": "symbol", "type": "string"}],
            "name": "tokenAddressBySymbol",
            "outputs": [{"name": "", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"name": "tokenAddress", "type": "address"}],
            "name": "launchInfo",
            "outputs": [
                {"name": "parentTokenAddress", "type": "address"},
                {"name": "parentTokenFundraisingGoal", "type": "uint256"},
                {"name": "totalContributed", "type": "uint256"},
                {"name": "hasEnded", "type": "bool"}
            ],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid launch ABI")
});

/// Stake contract ABI
pub static STAKE_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "currentRound",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"name": "tokenAddress", "type": "address"}],
            "name": "initialStakeRound",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"name": "tokenAddress", "type": "address"}],
            "name": "govVotesNum",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "account", "type": "address"}
            ],
            "name": "validGovVotes",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "account", "type": "address"}
            ],
            "name": "accountStakeStatus",
            "outputs": [
                {"name": "slAmount", "type": "uint256"},
                {"name": "stAmount", "type": "uint256"},
                {"name": "promisedWaitingPhases", "type": "uint256"},
                {"name": "requestedUnstakeRound", "type": "uint256"},
                {"name": "govVotes", "type": "uint256"}
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "tokenAmount", "type": "uint256"},
                {"name": "promisedWaitingPhases", "type": "uint256"},
                {"name": "to", "type": "address"}
            ],
            "name": "stakeToken",
            "outputs": [{"name": "stAmount", "type": "uint256"}],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]))
    .expect("Valid stake ABI")
});

/// Submit contract ABI
pub static SUBMIT_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "actionId", "type": "uint256"}
            ],
            "name": "actionInfo",
            "outputs": [
                {
                    "components": [
                        {
                            "components": [
                                {"name": "id", "type": "uint256"},
                                {"name": "author", "type": "address"},
                                {"name": "createAtBlock", "type": "uint256"}
                            ],
                            "name": "head",
                            "type": "tuple"
                        },
                        {
                            "components": [
                                {"name": "minStake", "type": "uint256"},
                                {"name": "maxRandomAccounts", "type": "uint256"},
                                {"name": "whiteListAddress", "type": "address"},
                                {"name": "title", "type": "string"},
                                {"name": "verificationRule", "type": "string"}
                            ],
                            "name": "body",
                            "type": "tuple"
                        }
                    ],
                    "name": "",
                    "type": "tuple"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid submit ABI")
});

/// Vote contract ABI
pub static VOTE_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "round", "type": "uint256"},
                {"name": "account", "type": "address"}
            ],
            "name": "votesNumByAccount",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid vote ABI")
});

/// Join contract ABI
pub static JOIN_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "actionId", "type": "uint256"},
                {"name": "account", "type": "address"}
            ],
            "name": "amountByActionIdByAccount",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "actionId", "type": "uint256"},
                {"name": "additionalAmount", "type": "uint256"},
                {"name": "verificationInfos", "type": "string[]"}
            ],
            "name": "join",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]))
    .expect("Valid join ABI")
});

/// Mint contract ABI
pub static MINT_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "round", "type": "uint256"},
                {"name": "actionId", "type": "uint256"},
                {"name": "account", "type": "address"}
            ],
            "name": "actionRewardByActionIdByAccount",
            "outputs": [
                {"name": "reward", "type": "uint256"},
                {"name": "isMinted", "type": "bool"}
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "round", "type": "uint256"}
            ],
            "name": "govReward",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "round", "type": "uint256"},
                {"name": "actionId", "type": "uint256"}
            ],
            "name": "mintActionReward",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]))
    .expect("Valid mint ABI")
});

/// Extension center ABI
pub static EXTENSION_CENTER_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [
                {"name": "tokenAddress", "type": "address"},
                {"name": "actionId", "type": "uint256"}
            ],
            "name": "extension",
            "outputs": [{"name": "", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid extension center ABI")
});

/// Interface every extension contract exposes
pub static EXTENSION_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "factory",
            "outputs": [{"name": "", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "joinedValue",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"name": "account", "type": "address"}],
            "name": "joinedValueByAccount",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid extension ABI")
});

/// LP-staking extension ABI
pub static LP_EXTENSION_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "lpTokenAddress",
            "outputs": [{"name": "", "type": "address"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid LP extension ABI")
});

/// Group-action extension ABI
pub static GROUP_ACTION_EXTENSION_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "maxCapacity",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "groupId",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid group action extension ABI")
});

/// Group-service extension ABI
pub static GROUP_SERVICE_EXTENSION_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [],
            "name": "maxRecipients",
            "outputs": [{"name": "", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid group service extension ABI")
});

/// Group registry ABI
pub static GROUP_ABI: Lazy<Abi> = Lazy::new(|| {
    serde_json::from_value(json!([
        {
            "inputs": [{"name": "groupId", "type": "uint256"}],
            "name": "groupNameOf",
            "outputs": [{"name": "", "type": "string"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .expect("Valid group ABI")
});

fn expect_len(function: &str, tokens: &[Token], len: usize) -> Result<()> {
    if tokens.len() != len {
        return Err(ProtocolError::unexpected_output(
            function.to_string(),
            format!("expected {} values, got {}", len, tokens.len()),
        ));
    }
    Ok(())
}

fn uint_at(function: &str, tokens: &[Token], index: usize) -> Result<U256> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_uint)
        .ok_or_else(|| ProtocolError::unexpected_output(function.to_string(), format!("value {index} is not a uint")))
}

fn address_at(function: &str, tokens: &[Token], index: usize) -> Result<Address> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_address)
        .ok_or_else(|| ProtocolError::unexpected_output(function.to_string(), format!("value {index} is not an address")))
}

fn string_at(function: &str, tokens: &[Token], index: usize) -> Result<String> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_string)
        .ok_or_else(|| ProtocolError::unexpected_output(function.to_string(), format!("value {index} is not a string")))
}

fn bool_at(function: &str, tokens: &[Token], index: usize) -> Result<bool> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_bool)
        .ok_or_else(|| ProtocolError::unexpected_output(function.to_string(), format!("value {index} is not a bool")))
}

fn tuple_at(function: &str, tokens: &[Token], index: usize) -> Result<Vec<Token>> {
    tokens
        .get(index)
        .cloned()
        .and_then(Token::into_tuple)
        .ok_or_else(|| ProtocolError::unexpected_output(function.to_string(), format!("value {index} is not a tuple")))
}

/// Decode `submit.actionInfo` output
pub fn decode_action_info(tokens: &[Token]) -> Result<ActionInfo> {
    const FN: &str = "actionInfo";
    expect_len(FN, tokens, 1)?;
    let outer = tuple_at(FN, tokens, 0)?;
    expect_len(FN, &outer, 2)?;
    let head = tuple_at(FN, &outer, 0)?;
    let body = tuple_at(FN, &outer, 1)?;
    expect_len(FN, &head, 3)?;
    expect_len(FN, &body, 5)?;

    Ok(ActionInfo {
        id: uint_at(FN, &head, 0)?,
        author: address_at(FN, &head, 1)?,
        create_at_block: uint_at(FN, &head, 2)?,
        min_stake: uint_at(FN, &body, 0)?,
        max_random_accounts: uint_at(FN, &body, 1)?,
        white_list_address: address_at(FN, &body, 2)?,
        title: string_at(FN, &body, 3)?,
        verification_rule: string_at(FN, &body, 4)?,
    })
}

/// Decode `stake.accountStakeStatus` output
pub fn decode_stake_status(tokens: &[Token]) -> Result<StakeStatus> {
    const FN: &str = "accountStakeStatus";
    expect_len(FN, tokens, 5)?;
    Ok(StakeStatus {
        sl_amount: uint_at(FN, tokens, 0)?,
        st_amount: uint_at(FN, tokens, 1)?,
        promised_waiting_phases: uint_at(FN, tokens, 2)?,
        requested_unstake_round: uint_at(FN, tokens, 3)?,
        gov_votes: uint_at(FN, tokens, 4)?,
    })
}

/// Decode `mint.actionRewardByActionIdByAccount` output into (reward, isMinted)
pub fn decode_action_reward(tokens: &[Token]) -> Result<(U256, bool)> {
    const FN: &str = "actionRewardByActionIdByAccount";
    expect_len(FN, tokens, 2)?;
    Ok((uint_at(FN, tokens, 0)?, bool_at(FN, tokens, 1)?))
}

/// Decode `pair.getReserves` output into (reserve0, reserve1)
pub fn decode_reserves(tokens: &[Token]) -> Result<(U256, U256)> {
    const FN: &str = "getReserves";
    expect_len(FN, tokens, 3)?;
    Ok((uint_at(FN, tokens, 0)?, uint_at(FN, tokens, 1)?))
}

/// Decode `launch.launchInfo` output into (parent token, has ended)
pub fn decode_launch_info(tokens: &[Token]) -> Result<(Address, bool)> {
    const FN: &str = "launchInfo";
    expect_len(FN, tokens, 4)?;
    Ok((address_at(FN, tokens, 0)?, bool_at(FN, tokens, 3)?))
}
