//! Scripted in-memory chain for tests.
//!
//! Responses are keyed by the exact ABI-encoded call, so a test registers
//! the same [`ContractCall`] its code under test will build.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256};
use ethers::utils::keccak256;
use parking_lot::Mutex;

use crate::chain::{CallOutcome, ChainClient, ContractCall, RawCall, ReceiptSummary};
use crate::{ClientError, Result};

/// How the next write behaves
#[derive(Debug, Clone)]
pub enum WriteScript {
    /// Broadcast and mine successfully
    Succeed,

    /// The wallet prompt is dismissed
    Reject,

    /// Simulation fails with the given revert payload
    RevertOnSimulate(Bytes),

    /// Broadcast succeeds but the receipt has status 0
    RevertOnChain,

    /// Transport failure on broadcast
    NetworkError(String),
}

/// In-memory [`ChainClient`]
pub struct FakeChainClient {
    account: Option<Address>,
    responses: Mutex<HashMap<RawCall, CallOutcome>>,
    writes: Mutex<VecDeque<WriteScript>>,
    receipts: Mutex<HashMap<H256, bool>>,
    sent: Mutex<Vec<RawCall>>,
    single_reads: AtomicUsize,
    batch_reads: AtomicUsize,
    nonce: AtomicUsize,
    fail_batches: Mutex<Option<String>>,
}

impl FakeChainClient {
    /// Create a fake with a connected account
    pub fn new(account: Address) -> Self {
        Self {
            account: Some(account),
            responses: Mutex::new(HashMap::new()),
            writes: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            single_reads: AtomicUsize::new(0),
            batch_reads: AtomicUsize::new(0),
            nonce: AtomicUsize::new(0),
            fail_batches: Mutex::new(None),
        }
    }

    /// Create a fake with no signer
    pub fn read_only() -> Self {
        let mut fake = Self::new(Address::zero());
        fake.account = None;
        fake
    }

    /// Answer `call` with ABI-encoded `outputs`
    pub fn respond(&self, call: &ContractCall, outputs: Vec<Token>) {
        let raw = call.encode().expect("encodable call");
        self.responses
            .lock()
            .insert(raw, CallOutcome::Success(Bytes::from(ethers::abi::encode(&outputs))));
    }

    /// Make `call` revert
    pub fn fail(&self, call: &ContractCall, reason: &str) {
        let raw = call.encode().expect("encodable call");
        self.responses.lock().insert(raw, CallOutcome::Failure(reason.to_string()));
    }

    /// Make every batched request fail at the transport level
    pub fn fail_batches(&self, message: &str) {
        *self.fail_batches.lock() = Some(message.to_string());
    }

    /// Queue the behaviour of the next write
    pub fn script_write(&self, script: WriteScript) {
        self.writes.lock().push_back(script);
    }

    /// Number of single `eth_call`s served
    pub fn single_reads(&self) -> usize {
        self.single_reads.load(Ordering::SeqCst)
    }

    /// Number of batched requests served
    pub fn batch_reads(&self) -> usize {
        self.batch_reads.load(Ordering::SeqCst)
    }

    /// Writes broadcast so far
    pub fn sent(&self) -> Vec<RawCall> {
        self.sent.lock().clone()
    }

    fn lookup(&self, call: &RawCall) -> CallOutcome {
        self.responses
            .lock()
            .get(call)
            .cloned()
            .unwrap_or_else(|| CallOutcome::Failure("no response scripted".to_string()))
    }

    fn peek_write(&self) -> WriteScript {
        self.writes.lock().front().cloned().unwrap_or(WriteScript::Succeed)
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn read_contract(&self, call: &RawCall) -> Result<Bytes> {
        self.single_reads.fetch_add(1, Ordering::SeqCst);
        match self.lookup(call) {
            CallOutcome::Success(data) => Ok(data),
            CallOutcome::Failure(reason) => Err(ClientError::rpc(reason, Some(3), None)),
        }
    }

    async fn read_contracts(&self, calls: &[RawCall]) -> Result<Vec<CallOutcome>> {
        self.batch_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_batches.lock().clone() {
            return Err(ClientError::rpc(message, None, None));
        }
        Ok(calls.iter().map(|call| self.lookup(call)).collect())
    }

    async fn simulate_write(&self, _call: &RawCall) -> Result<()> {
        if self.account.is_none() {
            return Err(ClientError::NoSigner);
        }
        match self.peek_write() {
            WriteScript::RevertOnSimulate(data) => {
                self.writes.lock().pop_front();
                Err(ClientError::rpc("execution reverted", Some(3), Some(data)))
            }
            _ => Ok(()),
        }
    }

    async fn send_transaction(&self, call: &RawCall) -> Result<H256> {
        if self.account.is_none() {
            return Err(ClientError::NoSigner);
        }
        let script = self.writes.lock().pop_front().unwrap_or(WriteScript::Succeed);
        match script {
            WriteScript::Reject => Err(ClientError::rpc("User rejected the request.", Some(4001), None)),
            WriteScript::NetworkError(message) => Err(ClientError::rpc(message, None, None)),
            WriteScript::RevertOnSimulate(data) => {
                Err(ClientError::rpc("execution reverted", Some(3), Some(data)))
            }
            script => {
                let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
                let mut preimage = call.calldata.to_vec();
                preimage.extend_from_slice(&nonce.to_be_bytes());
                let tx_hash = H256::from(keccak256(preimage));

                self.receipts
                    .lock()
                    .insert(tx_hash, !matches!(script, WriteScript::RevertOnChain));
                self.sent.lock().push(call.clone());
                Ok(tx_hash)
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256, _confirmations: usize) -> Result<ReceiptSummary> {
        let success = self
            .receipts
            .lock()
            .get(&tx_hash)
            .copied()
            .ok_or(ClientError::Dropped { tx_hash })?;
        Ok(ReceiptSummary {
            tx_hash,
            block_number: Some(100),
            success,
        })
    }
}
