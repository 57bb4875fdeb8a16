//! Contract revert decoding
//!
//! Revert payloads start with a 4-byte selector. Known LOVE20 custom errors
//! are matched against a static table; `Error(string)` and `Panic(uint256)`
//! are decoded structurally. Everything else becomes a generic message.

use std::collections::HashMap;
use std::fmt;

use ethers::abi::{self, ParamType, Token};
use ethers::types::U256;
use ethers::utils::id;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ClientError;

/// Display language for decoded messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl std::str::FromStr for Locale {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Locale::En),
            "zh" | "zh-cn" | "chinese" => Ok(Locale::Zh),
            other => Err(ClientError::invalid_input(format!("Unsupported locale: {}", other))),
        }
    }
}

struct KnownError {
    signature: &'static str,
    en: &'static str,
    zh: &'static str,
}

const KNOWN_ERRORS: &[KnownError] = &[
    KnownError { signature: "AmountIsZero()", en: "Amount must be greater than zero", zh: "数量必须大于零" },
    KnownError { signature: "InvalidToAddress()", en: "Invalid recipient address", zh: "接收地址无效" },
    KnownError { signature: "LaunchNotEnded()", en: "The fair launch has not ended yet", zh: "公平发射尚未结束" },
    KnownError { signature: "AlreadyMinted()", en: "Reward already minted", zh: "奖励已铸造" },
    KnownError { signature: "NoRewardAvailable()", en: "No reward available", zh: "没有可领取的奖励" },
    KnownError { signature: "RoundNotFinished()", en: "The round has not finished yet", zh: "本轮尚未结束" },
    KnownError {
        signature: "NotEnoughGovVotes()",
        en: "Not enough governance votes",
        zh: "治理票数不足",
    },
    KnownError { signature: "ActionNotVoted()", en: "The action has not been voted for this round", zh: "该行动本轮未获投票" },
    KnownError { signature: "AlreadySubmitted()", en: "Action already submitted this round", zh: "本轮已推举过行动" },
    KnownError {
        signature: "JoinAmountLessThanMinStake()",
        en: "Amount is below the action's minimum stake",
        zh: "参与数量低于行动最小质押量",
    },
    KnownError { signature: "NotInWhiteList()", en: "Account is not on the action's whitelist", zh: "账户不在行动白名单中" },
    KnownError { signature: "ExceedsMaxCapacity()", en: "The group has reached its capacity", zh: "链群容量已满" },
    KnownError {
        signature: "UnstakeRequested()",
        en: "Unstake already requested; staking is closed",
        zh: "已申请解除质押，无法继续质押",
    },
    KnownError {
        signature: "PromisedWaitingPhasesOutOfRange()",
        en: "Waiting phases out of range",
        zh: "承诺等待阶段超出范围",
    },
    KnownError {
        signature: "ERC20InsufficientAllowance(address,uint256,uint256)",
        en: "Insufficient allowance, approve first",
        zh: "授权额度不足，请先授权",
    },
    KnownError {
        signature: "ERC20InsufficientBalance(address,uint256,uint256)",
        en: "Insufficient balance",
        zh: "余额不足",
    },
];

static KNOWN_BY_SELECTOR: Lazy<HashMap<[u8; 4], &'static KnownError>> =
    Lazy::new(|| KNOWN_ERRORS.iter().map(|known| (id(known.signature), known)).collect());

/// `Error(string)`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Structured revert reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRevert {
    /// Known custom error; `name` is the signature without arguments
    Custom { name: String, selector: [u8; 4] },

    /// `require(cond, "reason")`
    Reason(String),

    /// Compiler-inserted panic
    Panic(U256),

    /// Selector not in the table, or payload too short
    Unknown(Vec<u8>),
}

impl fmt::Display for DecodedRevert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedRevert::Custom { name, .. } => write!(f, "{}", name),
            DecodedRevert::Reason(reason) => write!(f, "Error({:?})", reason),
            DecodedRevert::Panic(code) => write!(f, "Panic({:#x})", code),
            DecodedRevert::Unknown(data) => write!(f, "0x{}", hex::encode(data)),
        }
    }
}

/// Decode a raw revert payload
pub fn decode_revert(data: &[u8]) -> DecodedRevert {
    if data.len() < 4 {
        return DecodedRevert::Unknown(data.to_vec());
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    let payload = &data[4..];

    if selector == ERROR_STRING_SELECTOR {
        if let Ok(mut tokens) = abi::decode(&[ParamType::String], payload) {
            if let Some(Token::String(reason)) = tokens.pop() {
                return DecodedRevert::Reason(reason);
            }
        }
    } else if selector == PANIC_SELECTOR {
        if let Ok(mut tokens) = abi::decode(&[ParamType::Uint(256)], payload) {
            if let Some(Token::Uint(code)) = tokens.pop() {
                return DecodedRevert::Panic(code);
            }
        }
    } else if let Some(known) = KNOWN_BY_SELECTOR.get(&selector) {
        let name = known.signature.split('(').next().unwrap_or(known.signature);
        return DecodedRevert::Custom {
            name: name.to_string(),
            selector,
        };
    }

    DecodedRevert::Unknown(data.to_vec())
}

fn panic_message(code: U256, locale: Locale) -> &'static str {
    let code = if code > U256::from(u8::MAX) { 0 } else { code.as_u32() };
    match (code, locale) {
        (0x01, Locale::En) => "Assertion failed",
        (0x01, Locale::Zh) => "断言失败",
        (0x11, Locale::En) => "Arithmetic overflow",
        (0x11, Locale::Zh) => "算术溢出",
        (0x12, Locale::En) => "Division by zero",
        (0x12, Locale::Zh) => "除以零",
        (0x32, Locale::En) => "Index out of bounds",
        (0x32, Locale::Zh) => "数组越界",
        (_, Locale::En) => "Contract panicked",
        (_, Locale::Zh) => "合约异常",
    }
}

/// Turns client errors into messages fit for the error banner
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractErrorDecoder {
    locale: Locale,
}

impl ContractErrorDecoder {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Message for a revert payload
    pub fn revert_message(&self, data: &[u8]) -> String {
        let decoded = decode_revert(data);
        debug!(revert = %decoded, "Decoded revert payload");
        match decoded {
            DecodedRevert::Custom { selector, .. } => match KNOWN_BY_SELECTOR.get(&selector) {
                Some(known) => self.pick(known.en, known.zh).to_string(),
                None => self.pick("Transaction failed", "交易失败").to_string(),
            },
            DecodedRevert::Reason(reason) => reason,
            DecodedRevert::Panic(code) => panic_message(code, self.locale).to_string(),
            DecodedRevert::Unknown(_) => self.pick("Transaction failed", "交易失败").to_string(),
        }
    }

    /// Message for any client error
    pub fn message(&self, error: &ClientError) -> String {
        match error {
            ClientError::Rpc { revert_data: Some(data), .. } => self.revert_message(data),
            ClientError::Rpc { message, .. } => match message.split_once("execution reverted: ") {
                Some((_, reason)) if !reason.trim().is_empty() => reason.trim().to_string(),
                _ if message.contains("execution reverted") => {
                    self.pick("Transaction failed", "交易失败").to_string()
                }
                _ => self.pick("Network error, please try again later", "网络错误，请稍后重试").to_string(),
            },
            ClientError::UserRejected(_) => self.pick("Request cancelled", "已取消").to_string(),
            ClientError::Reverted { .. } => self.pick("Transaction reverted on chain", "交易在链上执行失败").to_string(),
            ClientError::Dropped { .. } => self.pick("Transaction was dropped", "交易已被丢弃").to_string(),
            ClientError::NoSigner => self.pick("Connect a wallet first", "请先连接钱包").to_string(),
            ClientError::StepLocked { .. } => {
                self.pick("Complete the previous step first", "请先完成上一步").to_string()
            }
            ClientError::InvalidInput { message } => message.clone(),
            ClientError::Io(_) => self.pick("Network error, please try again later", "网络错误，请稍后重试").to_string(),
            other => other.to_string(),
        }
    }

    fn pick(&self, en: &'static str, zh: &'static str) -> &'static str {
        match self.locale {
            Locale::En => en,
            Locale::Zh => zh,
        }
    }
}
