//! Configuration management for the LOVE20 client

use config::{Config, ConfigError, Environment, File};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::BPS_DENOMINATOR;

/// Canonical Multicall3 deployment address
pub const DEFAULT_MULTICALL3: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Love20Config {
    /// RPC and transaction settings
    pub network: NetworkConfig,

    /// Deployed contract addresses
    pub contracts: ContractsConfig,

    /// Protocol parameters and UI thresholds
    pub protocol: ProtocolParams,

    /// Local cache settings
    pub cache: CacheConfig,

    /// Read batching settings
    pub batching: BatchingConfig,

    /// Optimistic write reconciliation settings
    pub pending: PendingConfig,
}

/// RPC endpoint and transaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP JSON-RPC URL
    pub rpc_url: String,

    /// Expected chain id
    pub chain_id: u64,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Confirmations to wait before a transaction counts as confirmed
    pub confirmations: usize,
}

/// Addresses of every contract the client talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub launch: Address,
    pub submit: Address,
    pub vote: Address,
    pub join: Address,
    pub mint: Address,
    pub stake: Address,
    pub group: Address,
    pub extension_center: Address,

    /// Factory of LP-staking extensions
    pub lp_extension_factory: Address,

    /// Factory of group-action extensions
    pub group_action_extension_factory: Address,

    /// Factory of group-service extensions
    pub group_service_extension_factory: Address,

    /// Uniswap-V2-compatible factory
    pub uniswap_v2_factory: Address,

    /// Multicall3 deployment used for batched reads
    pub multicall: Address,
}

/// Protocol parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Minimum share of total governance votes (bps) needed to submit an action
    pub submit_min_gov_vote_bps: u64,

    /// Blocks per round
    pub round_blocks: u64,

    /// Average block time in seconds
    pub block_time_seconds: u64,
}

impl ProtocolParams {
    /// Number of rounds in a 365-day year
    pub fn rounds_per_year(&self) -> u64 {
        let round_seconds = self.round_blocks.saturating_mul(self.block_time_seconds);
        if round_seconds == 0 {
            return 0;
        }
        365 * 24 * 60 * 60 / round_seconds
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file backing the cache; in-memory when unset
    pub path: Option<String>,

    /// TTL for group display names
    pub group_name_ttl_seconds: u64,

    /// TTL for derived governor status
    pub governor_status_ttl_seconds: u64,
}

impl CacheConfig {
    pub fn group_name_ttl(&self) -> Duration {
        Duration::from_secs(self.group_name_ttl_seconds)
    }

    pub fn governor_status_ttl(&self) -> Duration {
        Duration::from_secs(self.governor_status_ttl_seconds)
    }
}

/// Read batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Route batches through Multicall3; otherwise one `eth_call` per read
    pub enabled: bool,

    /// Maximum calls per Multicall3 round-trip
    pub max_batch_size: usize,
}

/// Optimistic write reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Age after which an unconfirmed optimistic entry is dropped
    pub max_age_seconds: u64,
}

impl Love20Config {
    /// Load configuration from defaults, files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config/love20")
    }

    /// Load configuration rooted at a file stem such as `config/love20`
    pub fn load_from(stem: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(stem).required(false))
            // Add environment-specific config
            .add_source(
                File::with_name(&format!(
                    "{}-{}",
                    stem,
                    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name(&format!("{}-local", stem)).required(false))
            // Add environment variables with LOVE20_ prefix
            .add_source(Environment::with_prefix("LOVE20").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if Url::parse(&self.network.rpc_url).is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid RPC URL: {}",
                self.network.rpc_url
            )));
        }

        if self.network.confirmations == 0 {
            return Err(ConfigError::Message("confirmations must be greater than 0".into()));
        }

        for (name, address) in self.required_contracts() {
            if address.is_zero() {
                return Err(ConfigError::Message(format!(
                    "Contract address not configured: {}",
                    name
                )));
            }
        }

        if self.protocol.submit_min_gov_vote_bps > BPS_DENOMINATOR {
            return Err(ConfigError::Message(format!(
                "submit_min_gov_vote_bps must be at most {}",
                BPS_DENOMINATOR
            )));
        }

        if self.protocol.round_blocks == 0 || self.protocol.block_time_seconds == 0 {
            return Err(ConfigError::Message(
                "round_blocks and block_time_seconds must be greater than 0".into(),
            ));
        }

        if self.batching.max_batch_size == 0 {
            return Err(ConfigError::Message("max_batch_size must be greater than 0".into()));
        }

        Ok(())
    }

    /// Contracts every command needs; extension factories are optional
    fn required_contracts(&self) -> [(&'static str, Address); 10] {
        let c = &self.contracts;
        [
            ("launch", c.launch),
            ("submit", c.submit),
            ("vote", c.vote),
            ("join", c.join),
            ("mint", c.mint),
            ("stake", c.stake),
            ("group", c.group),
            ("extension_center", c.extension_center),
            ("uniswap_v2_factory", c.uniswap_v2_factory),
            ("multicall", c.multicall),
        ]
    }
}

impl Default for Love20Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                rpc_url: "http://localhost:8545".to_string(),
                chain_id: 1,
                request_timeout_seconds: 30,
                confirmations: 1,
            },
            contracts: ContractsConfig {
                launch: Address::zero(),
                submit: Address::zero(),
                vote: Address::zero(),
                join: Address::zero(),
                mint: Address::zero(),
                stake: Address::zero(),
                group: Address::zero(),
                extension_center: Address::zero(),
                lp_extension_factory: Address::zero(),
                group_action_extension_factory: Address::zero(),
                group_service_extension_factory: Address::zero(),
                uniswap_v2_factory: Address::zero(),
                multicall: DEFAULT_MULTICALL3
                    .parse()
                    .expect("Valid Multicall3 address"),
            },
            protocol: ProtocolParams {
                submit_min_gov_vote_bps: 100,
                round_blocks: 17_280,
                block_time_seconds: 5,
            },
            cache: CacheConfig {
                path: None,
                group_name_ttl_seconds: 24 * 60 * 60,
                governor_status_ttl_seconds: 10 * 60,
            },
            batching: BatchingConfig {
                enabled: true,
                max_batch_size: 100,
            },
            pending: PendingConfig {
                max_age_seconds: 10 * 60,
            },
        }
    }
}
