//! Chain access
//!
//! [`ChainClient`] is the seam between the read/write logic and the RPC
//! node. [`EthersChainClient`] talks to a real node; the `testing` module
//! (feature `testing`) provides a scripted in-memory implementation.

pub mod ethers_client;

pub use ethers_client::EthersChainClient;

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};

use crate::{ClientError, Result};

/// Typed description of one contract function call
#[derive(Debug, Clone)]
pub struct ContractCall {
    /// Contract address
    pub address: Address,

    /// ABI declaring `function`
    pub abi: &'static Abi,

    /// Function name
    pub function: &'static str,

    /// Encoded arguments
    pub args: Vec<Token>,
}

impl ContractCall {
    /// Create a new contract call descriptor
    pub fn new(address: Address, abi: &'static Abi, function: &'static str, args: Vec<Token>) -> Self {
        Self {
            address,
            abi,
            function,
            args,
        }
    }

    /// ABI-encode this call
    pub fn encode(&self) -> Result<RawCall> {
        let function = self.abi.function(self.function)?;
        let calldata = function.encode_input(&self.args)?;
        Ok(RawCall {
            target: self.address,
            calldata: Bytes::from(calldata),
        })
    }

    /// Decode raw return data for this call
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Token>> {
        let function = self.abi.function(self.function)?;
        function
            .decode_output(data)
            .map_err(|e| ClientError::decode(self.function.to_string(), e.to_string()))
    }

    /// Perform this call as a single, unbatched read
    pub async fn read(&self, client: &dyn ChainClient) -> Result<Vec<Token>> {
        let raw = self.encode()?;
        let data = client.read_contract(&raw).await?;
        self.decode(&data)
    }
}

/// ABI-encoded call ready for the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCall {
    pub target: Address,
    pub calldata: Bytes,
}

/// Result of one call inside a batched read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallOutcome {
    Success(Bytes),
    Failure(String),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }
}

/// What the client needs to know about a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub tx_hash: H256,
    pub block_number: Option<u64>,

    /// Execution status; `false` means the transaction reverted
    pub success: bool,
}

/// Wallet/RPC adapter used by every reader and writer
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Connected account, if a signer is configured
    fn account(&self) -> Option<Address>;

    /// Single `eth_call`
    async fn read_contract(&self, call: &RawCall) -> Result<Bytes>;

    /// Batched read; one outcome per call, in order
    async fn read_contracts(&self, calls: &[RawCall]) -> Result<Vec<CallOutcome>>;

    /// Dry-run a state-changing call from the connected account
    async fn simulate_write(&self, call: &RawCall) -> Result<()>;

    /// Sign and broadcast a state-changing call
    async fn send_transaction(&self, call: &RawCall) -> Result<H256>;

    /// Wait until the transaction has `confirmations` confirmations
    async fn wait_for_receipt(&self, tx_hash: H256, confirmations: usize) -> Result<ReceiptSummary>;
}
