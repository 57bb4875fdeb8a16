//! `ChainClient` backed by an ethers HTTP provider
//!
//! Batched reads go through Multicall3 `aggregate3` with `allowFailure`
//! set, so one reverting call never sinks the rest of the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider, ProviderError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U64};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use love20_protocol::abi::MULTICALL3_ABI;
use love20_protocol::config::NetworkConfig;

use super::{CallOutcome, ChainClient, RawCall, ReceiptSummary};
use crate::{ClientError, Result};

type SignerClient = SignerMiddleware<Arc<Provider<Http>>, LocalWallet>;

/// Receipt polling interval
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Ethers-backed chain client
#[derive(Clone)]
pub struct EthersChainClient {
    /// Read provider
    provider: Arc<Provider<Http>>,

    /// Signing client for writes
    signer: Option<Arc<SignerClient>>,

    /// Multicall3 deployment
    multicall: Address,

    /// Use Multicall3 for `read_contracts`
    batching_enabled: bool,

    chain_id: u64,
}

impl EthersChainClient {
    /// Create a read-only client
    pub fn new(network: &NetworkConfig, multicall: Address, batching_enabled: bool) -> Result<Self> {
        info!(rpc_url = %network.rpc_url, chain_id = network.chain_id, "Initializing chain client");

        let http_client = Client::builder()
            .timeout(Duration::from_secs(network.request_timeout_seconds))
            .build()
            .map_err(|e| ClientError::internal(format!("Failed to create HTTP client: {}", e)))?;

        let url = Url::parse(&network.rpc_url)
            .map_err(|e| ClientError::invalid_input(format!("Invalid RPC URL {}: {}", network.rpc_url, e)))?;

        let provider = Provider::new(Http::new_with_client(url, http_client))
            .interval(RECEIPT_POLL_INTERVAL);

        Ok(Self {
            provider: Arc::new(provider),
            signer: None,
            multicall,
            batching_enabled,
            chain_id: network.chain_id,
        })
    }

    /// Attach a signer from a hex private key
    pub fn with_private_key(mut self, private_key: &str) -> Result<Self> {
        let wallet: LocalWallet = private_key
            .trim()
            .parse()
            .map_err(|_| ClientError::invalid_input("Invalid private key"))?;
        let wallet = wallet.with_chain_id(self.chain_id);

        info!(account = ?wallet.address(), "Signer attached");
        self.signer = Some(Arc::new(SignerMiddleware::new(self.provider.clone(), wallet)));
        Ok(self)
    }

    /// Check that the node serves the configured chain
    pub async fn verify_chain_id(&self) -> Result<()> {
        let remote = self.provider.get_chainid().await.map_err(map_provider_error)?;
        if remote.as_u64() != self.chain_id {
            return Err(ClientError::invalid_input(format!(
                "RPC chain id {} does not match configured {}",
                remote, self.chain_id
            )));
        }
        Ok(())
    }

    fn call_request(&self, call: &RawCall) -> TypedTransaction {
        let mut request = TransactionRequest::new()
            .to(call.target)
            .data(call.calldata.clone());
        if let Some(account) = self.account() {
            request = request.from(account);
        }
        request.into()
    }

    async fn aggregate3(&self, calls: &[RawCall]) -> Result<Vec<CallOutcome>> {
        let function = MULTICALL3_ABI.function("aggregate3")?;
        let encoded_calls = calls
            .iter()
            .map(|call| {
                Token::Tuple(vec![
                    Token::Address(call.target),
                    Token::Bool(true),
                    Token::Bytes(call.calldata.to_vec()),
                ])
            })
            .collect();
        let calldata = function.encode_input(&[Token::Array(encoded_calls)])?;

        let raw = self
            .read_contract(&RawCall {
                target: self.multicall,
                calldata: Bytes::from(calldata),
            })
            .await?;

        let mut decoded = function
            .decode_output(&raw)
            .map_err(|e| ClientError::decode("aggregate3".to_string(), e.to_string()))?;

        let results = match decoded.pop().and_then(Token::into_array) {
            Some(results) if results.len() == calls.len() => results,
            _ => {
                return Err(ClientError::decode(
                    "aggregate3",
                    "result count does not match call count",
                ))
            }
        };

        results
            .into_iter()
            .map(|entry| {
                let mut fields = entry
                    .into_tuple()
                    .ok_or_else(|| ClientError::decode("aggregate3", "result is not a tuple"))?;
                let data = fields.pop().and_then(Token::into_bytes);
                let success = fields.pop().and_then(Token::into_bool);
                match (success, data) {
                    (Some(true), Some(data)) => Ok(CallOutcome::Success(Bytes::from(data))),
                    (Some(false), Some(data)) => Ok(CallOutcome::Failure(format!(
                        "call reverted: 0x{}",
                        hex::encode(data)
                    ))),
                    _ => Err(ClientError::decode("aggregate3", "malformed result tuple")),
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    async fn read_contract(&self, call: &RawCall) -> Result<Bytes> {
        metrics::counter!("love20_rpc_requests_total", 1, "method" => "eth_call");
        let tx = self.call_request(call);
        self.provider.call(&tx, None).await.map_err(map_provider_error)
    }

    async fn read_contracts(&self, calls: &[RawCall]) -> Result<Vec<CallOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let outcomes = if self.batching_enabled {
            self.aggregate3(calls).await?
        } else {
            let reads = calls.iter().map(|call| self.read_contract(call));
            futures::future::join_all(reads)
                .await
                .into_iter()
                .map(|result| match result {
                    Ok(data) => CallOutcome::Success(data),
                    Err(e) => CallOutcome::Failure(e.to_string()),
                })
                .collect()
        };

        debug!(
            calls = calls.len(),
            failed = outcomes.iter().filter(|o| !o.is_success()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            batched = self.batching_enabled,
            "Batched read completed"
        );
        Ok(outcomes)
    }

    async fn simulate_write(&self, call: &RawCall) -> Result<()> {
        if self.signer.is_none() {
            return Err(ClientError::NoSigner);
        }
        let tx = self.call_request(call);
        self.provider
            .call(&tx, None)
            .await
            .map(|_| ())
            .map_err(map_provider_error)
    }

    async fn send_transaction(&self, call: &RawCall) -> Result<H256> {
        let signer = self.signer.as_ref().ok_or(ClientError::NoSigner)?;
        let tx = self.call_request(call);

        let pending = signer.send_transaction(tx, None).await.map_err(|e| {
            let response = ethers::providers::MiddlewareError::as_error_response(&e);
            ClientError::rpc(
                e.to_string(),
                response.map(|r| r.code),
                response.and_then(|r| r.as_revert_data()),
            )
        })?;

        let tx_hash = pending.tx_hash();
        metrics::counter!("love20_transactions_sent_total", 1);
        info!(tx_hash = ?tx_hash, target = ?call.target, "Transaction broadcast");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256, confirmations: usize) -> Result<ReceiptSummary> {
        let receipt = PendingTransaction::new(tx_hash, self.provider.as_ref())
            .interval(RECEIPT_POLL_INTERVAL)
            .confirmations(confirmations)
            .await
            .map_err(map_provider_error)?;

        let Some(receipt) = receipt else {
            warn!(tx_hash = ?tx_hash, "Transaction dropped from mempool");
            return Err(ClientError::Dropped { tx_hash });
        };

        Ok(ReceiptSummary {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            success: receipt.status == Some(U64::one()),
        })
    }
}

fn map_provider_error(e: ProviderError) -> ClientError {
    let response = ethers::providers::RpcError::as_error_response(&e);
    ClientError::rpc(
        e.to_string(),
        response.map(|r| r.code),
        response.and_then(|r| r.as_revert_data()),
    )
}
