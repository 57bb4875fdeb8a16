//! Batched contract reads
//!
//! Collects logically related reads, sends them as as few round-trips as the
//! batch size allows, and hands results back by slot. A slot whose call was
//! skipped, reverted or could not be decoded yields the accessor's fallback
//! instead of failing the whole batch.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ethers::abi::Token;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::{CallOutcome, ChainClient, ContractCall};
use crate::Result;

/// Handle to one call's position in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

/// Status of one slot after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Prerequisite was missing; no call was made
    Skipped,
    Success,
    Failure,
}

/// Builder for a batched read
#[derive(Debug, Default)]
pub struct ReadBatch {
    calls: Vec<ContractCall>,

    /// Slot index → position in `calls`
    slots: Vec<Option<usize>>,
}

impl ReadBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a call
    pub fn push(&mut self, call: ContractCall) -> Slot {
        self.calls.push(call);
        self.slots.push(Some(self.calls.len() - 1));
        Slot(self.slots.len() - 1)
    }

    /// Add a call whose prerequisites may not be known yet
    pub fn push_if(&mut self, call: Option<ContractCall>) -> Slot {
        match call {
            Some(call) => self.push(call),
            None => {
                self.slots.push(None);
                Slot(self.slots.len() - 1)
            }
        }
    }

    /// Number of calls that will actually be sent
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Execute the batch in chunks of at most `max_batch_size` calls.
    ///
    /// An empty batch makes no request.
    pub async fn execute(self, client: &dyn ChainClient, max_batch_size: usize) -> Result<BatchResults> {
        if self.calls.is_empty() {
            debug!(slots = self.slots.len(), "Batch has no calls, skipping request");
            return Ok(BatchResults {
                calls: self.calls,
                slots: self.slots,
                outcomes: Vec::new(),
            });
        }

        let raw = self
            .calls
            .iter()
            .map(ContractCall::encode)
            .collect::<Result<Vec<_>>>()?;

        let chunk_size = max_batch_size.max(1);
        let mut outcomes = Vec::with_capacity(raw.len());
        for chunk in raw.chunks(chunk_size) {
            let mut chunk_outcomes = client.read_contracts(chunk).await?;
            // Missing outcomes count as failures so slots stay aligned
            chunk_outcomes.resize(chunk.len(), CallOutcome::Failure("missing outcome".to_string()));
            outcomes.extend(chunk_outcomes);
        }

        metrics::counter!("love20_batched_calls_total", raw.len() as u64);

        Ok(BatchResults {
            calls: self.calls,
            slots: self.slots,
            outcomes,
        })
    }
}

/// Outcomes of an executed batch, addressed by [`Slot`]
#[derive(Debug, Clone)]
pub struct BatchResults {
    calls: Vec<ContractCall>,
    slots: Vec<Option<usize>>,
    outcomes: Vec<CallOutcome>,
}

impl BatchResults {
    fn position(&self, slot: Slot) -> Option<usize> {
        self.slots.get(slot.0).copied().flatten()
    }

    /// Status of a slot
    pub fn status(&self, slot: Slot) -> SlotStatus {
        match self.position(slot).and_then(|i| self.outcomes.get(i)) {
            None => SlotStatus::Skipped,
            Some(CallOutcome::Success(_)) => SlotStatus::Success,
            Some(CallOutcome::Failure(_)) => SlotStatus::Failure,
        }
    }

    /// Decoded output tokens, or `None` for skipped, failed or undecodable slots
    pub fn tokens(&self, slot: Slot) -> Option<Vec<Token>> {
        let index = self.position(slot)?;
        let call = &self.calls[index];
        match self.outcomes.get(index)? {
            CallOutcome::Success(data) => match call.decode(data) {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!(function = call.function, address = ?call.address, error = %e, "Undecodable batch result");
                    None
                }
            },
            CallOutcome::Failure(reason) => {
                debug!(function = call.function, address = ?call.address, reason = reason, "Batch call failed");
                None
            }
        }
    }

    fn first(&self, slot: Slot) -> Option<Token> {
        self.tokens(slot).and_then(|tokens| tokens.into_iter().next())
    }

    pub fn uint(&self, slot: Slot) -> Option<U256> {
        self.first(slot).and_then(Token::into_uint)
    }

    /// First output as a uint, zero on any failure
    pub fn uint_or_zero(&self, slot: Slot) -> U256 {
        self.uint(slot).unwrap_or_default()
    }

    pub fn address(&self, slot: Slot) -> Option<Address> {
        self.first(slot).and_then(Token::into_address)
    }

    pub fn boolean(&self, slot: Slot) -> Option<bool> {
        self.first(slot).and_then(Token::into_bool)
    }

    pub fn string(&self, slot: Slot) -> Option<String> {
        self.first(slot).and_then(Token::into_string)
    }

    /// Number of failed calls
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// Stable fingerprint of the raw outcomes, used for memoization
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.slots.hash(&mut hasher);
        self.outcomes.hash(&mut hasher);
        hasher.finish()
    }
}

/// Batch statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Total batches executed
    pub total_batches: u64,

    /// Total calls sent
    pub total_calls: u64,

    /// Calls that failed individually
    pub failed_calls: u64,

    /// Round-trips saved compared to one request per call
    pub requests_saved: u64,

    /// Average batch latency (ms), exponential moving average
    pub avg_latency_ms: f64,
}

impl BatchStats {
    /// Record an executed batch
    fn record(&mut self, calls: usize, round_trips: usize, failed: usize, latency: Duration) {
        self.total_batches += 1;
        self.total_calls += calls as u64;
        self.failed_calls += failed as u64;
        self.requests_saved += calls.saturating_sub(round_trips) as u64;

        let alpha = 0.1;
        self.avg_latency_ms = alpha * latency.as_millis() as f64 + (1.0 - alpha) * self.avg_latency_ms;
    }
}

/// Executes batches against one client with a fixed chunk size and keeps stats
#[derive(Clone)]
pub struct BatchExecutor {
    client: Arc<dyn ChainClient>,
    max_batch_size: usize,
    stats: Arc<RwLock<BatchStats>>,
}

impl BatchExecutor {
    /// Create a new executor
    pub fn new(client: Arc<dyn ChainClient>, max_batch_size: usize) -> Self {
        Self {
            client,
            max_batch_size: max_batch_size.max(1),
            stats: Arc::new(RwLock::new(BatchStats::default())),
        }
    }

    /// Underlying chain client
    pub fn client(&self) -> &dyn ChainClient {
        self.client.as_ref()
    }

    /// Shared handle to the underlying chain client
    pub fn client_arc(&self) -> Arc<dyn ChainClient> {
        Arc::clone(&self.client)
    }

    /// Execute a batch and record statistics
    pub async fn execute(&self, batch: ReadBatch) -> Result<BatchResults> {
        let calls = batch.len();
        let start = Instant::now();
        let results = batch.execute(self.client.as_ref(), self.max_batch_size).await?;

        if calls > 0 {
            let round_trips = (calls + self.max_batch_size - 1) / self.max_batch_size;
            self.stats
                .write()
                .record(calls, round_trips, results.failures(), start.elapsed());
        }
        Ok(results)
    }

    /// Get batch statistics
    pub fn stats(&self) -> BatchStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChainClient;
    use love20_protocol::abi::ERC20_ABI;

    fn balance_call(token: u8, holder: Address) -> ContractCall {
        ContractCall::new(
            Address::repeat_byte(token),
            &ERC20_ABI,
            "balanceOf",
            vec![Token::Address(holder)],
        )
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let fake = FakeChainClient::read_only();
        let mut batch = ReadBatch::new();
        let skipped = batch.push_if(None);

        let results = batch.execute(&fake, 10).await.unwrap();

        assert_eq!(fake.batch_reads(), 0);
        assert_eq!(results.status(skipped), SlotStatus::Skipped);
        assert_eq!(results.uint_or_zero(skipped), U256::zero());
    }

    #[tokio::test]
    async fn test_chunks_by_max_batch_size() {
        let fake = FakeChainClient::read_only();
        let holder = Address::repeat_byte(0xee);
        let mut batch = ReadBatch::new();
        let mut slots = Vec::new();
        for token in 1..=5u8 {
            let call = balance_call(token, holder);
            fake.respond(&call, vec![Token::Uint(U256::from(token))]);
            slots.push(batch.push(call));
        }

        let executor = BatchExecutor::new(Arc::new(fake), 2);
        let results = executor.execute(batch).await.unwrap();

        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(results.uint(*slot), Some(U256::from(i + 1)));
        }
        let stats = executor.stats();
        assert_eq!(stats.total_calls, 5);
        // ceil(5 / 2) round-trips
        assert_eq!(stats.requests_saved, 2);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let fake = FakeChainClient::read_only();
        fake.fail_batches("connection refused");
        let mut batch = ReadBatch::new();
        batch.push(balance_call(1, Address::zero()));

        assert!(batch.execute(&fake, 10).await.is_err());
    }
}
