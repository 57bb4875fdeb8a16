//! Multi-step transaction sequencing
//!
//! A [`TxSequence`] holds ordered steps such as approve → stake. Each step
//! moves through `Idle → Pending → Confirming → Confirmed`, or ends in
//! `Failed`. Step *i* > 0 unlocks once step *i − 1* is confirmed, and stays
//! unlocked afterwards even if the earlier step is reset. Snapshots are
//! published on a watch channel for whoever renders the steps.

pub mod plans;

pub use plans::{join_plan, mint_reward_plan, plan_approve_then, stake_token_plan};

use ethers::types::H256;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{ChainClient, ContractCall};
use crate::errors::ErrorReporter;
use crate::{ClientError, Result};

/// Lifecycle of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TxState {
    Idle,

    /// Broadcast, not yet mined
    Pending { tx_hash: H256 },

    /// Mined, waiting for the configured confirmations
    Confirming { tx_hash: H256, block_number: Option<u64> },

    Confirmed { tx_hash: H256, block_number: Option<u64> },

    /// Decoded, user-facing failure message
    Failed { message: String },
}

impl TxState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TxState::Pending { .. } | TxState::Confirming { .. })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxState::Confirmed { .. })
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            TxState::Pending { tx_hash }
            | TxState::Confirming { tx_hash, .. }
            | TxState::Confirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// One write in a sequence
#[derive(Debug, Clone)]
pub struct TxStep {
    /// Short label, also used as the error-report context
    pub label: String,

    pub call: ContractCall,
}

impl TxStep {
    /// Create a new step
    pub fn new<S: Into<String>>(label: S, call: ContractCall) -> Self {
        Self {
            label: label.into(),
            call,
        }
    }
}

/// Rendered state of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub label: String,
    pub state: TxState,
    pub enabled: bool,
}

#[derive(Debug)]
struct Progress {
    states: Vec<TxState>,

    /// Latched "previous step confirmed" flags
    unlocked: Vec<bool>,

    /// Steps with a write in progress, including the simulation phase
    busy: Vec<bool>,
}

impl Progress {
    fn enabled(&self, index: usize) -> bool {
        let prerequisite_met = index == 0 || self.unlocked[index];
        prerequisite_met && !self.busy[index] && !self.states[index].is_in_flight() && !self.states[index].is_confirmed()
    }
}

/// Ordered set of dependent writes
pub struct TxSequence {
    id: Uuid,
    steps: Vec<TxStep>,
    confirmations: usize,
    progress: Mutex<Progress>,
    updates: watch::Sender<Vec<StepSnapshot>>,
}

impl TxSequence {
    /// Create a new sequence waiting for `confirmations` confirmations per step
    pub fn new(steps: Vec<TxStep>, confirmations: usize) -> Self {
        let progress = Progress {
            states: vec![TxState::Idle; steps.len()],
            unlocked: vec![false; steps.len()],
            busy: vec![false; steps.len()],
        };
        let (updates, _) = watch::channel(Self::render(&steps, &progress));
        Self {
            id: Uuid::new_v4(),
            steps,
            confirmations: confirmations.max(1),
            progress: Mutex::new(progress),
            updates,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[TxStep] {
        &self.steps
    }

    pub fn state(&self, index: usize) -> Option<TxState> {
        self.progress.lock().states.get(index).cloned()
    }

    /// Whether step `index` may be executed now
    pub fn is_enabled(&self, index: usize) -> bool {
        let progress = self.progress.lock();
        index < self.steps.len() && progress.enabled(index)
    }

    /// Whether every step has been confirmed
    pub fn is_complete(&self) -> bool {
        self.progress.lock().states.iter().all(TxState::is_confirmed)
    }

    /// Current snapshot of every step
    pub fn snapshot(&self) -> Vec<StepSnapshot> {
        Self::render(&self.steps, &self.progress.lock())
    }

    /// Receive a snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<Vec<StepSnapshot>> {
        self.updates.subscribe()
    }

    /// Return a step to `Idle`. Later steps keep their unlock.
    pub fn reset(&self, index: usize) -> Result<()> {
        if index >= self.steps.len() {
            return Err(ClientError::invalid_input(format!("No step {}", index)));
        }
        {
            let mut progress = self.progress.lock();
            if progress.busy[index] {
                return Err(ClientError::invalid_input(format!("Step {} is in progress", index)));
            }
            progress.states[index] = TxState::Idle;
        }
        self.publish();
        Ok(())
    }

    /// Run step `index`: simulate, send, wait for inclusion, then for the
    /// configured confirmations.
    ///
    /// Returns the step's final state. Only a locked or unknown step is an
    /// error; transaction failures end in [`TxState::Failed`] and are reported.
    pub async fn execute(&self, index: usize, client: &dyn ChainClient, reporter: &ErrorReporter) -> Result<TxState> {
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| ClientError::invalid_input(format!("No step {}", index)))?;

        {
            let mut progress = self.progress.lock();
            if !progress.enabled(index) {
                debug!(sequence = %self.id, step = index, "Step is locked");
                return Err(ClientError::StepLocked { step: index });
            }
            progress.busy[index] = true;
        }

        let outcome = self.run(index, step, client).await;

        let state = match outcome {
            Ok(state) => state,
            Err(e) if e.is_user_rejection() => {
                info!(sequence = %self.id, step = %step.label, "Signature rejected, step back to idle");
                TxState::Idle
            }
            Err(e) => {
                warn!(sequence = %self.id, step = %step.label, error = %e, "Step failed");
                let message = reporter
                    .report(&step.label, &e)
                    .unwrap_or_else(|| reporter.decoder().message(&e));
                TxState::Failed { message }
            }
        };

        metrics::counter!("love20_transactions_total", 1, "outcome" => outcome_label(&state));
        {
            let mut progress = self.progress.lock();
            progress.busy[index] = false;
            if state.is_confirmed() && index + 1 < self.steps.len() {
                progress.unlocked[index + 1] = true;
            }
        }
        self.set_state(index, state.clone());
        Ok(state)
    }

    /// Execute every remaining step in order, stopping at the first one that
    /// does not confirm.
    pub async fn execute_all(&self, client: &dyn ChainClient, reporter: &ErrorReporter) -> Result<TxState> {
        let mut last = TxState::Idle;
        for index in 0..self.steps.len() {
            if self.state(index).map_or(false, |state| state.is_confirmed()) {
                continue;
            }
            last = self.execute(index, client, reporter).await?;
            if !last.is_confirmed() {
                break;
            }
        }
        Ok(last)
    }

    async fn run(&self, index: usize, step: &TxStep, client: &dyn ChainClient) -> Result<TxState> {
        let raw = step.call.encode()?;

        client.simulate_write(&raw).await?;

        let tx_hash = client.send_transaction(&raw).await?;
        self.set_state(index, TxState::Pending { tx_hash });

        let included = client.wait_for_receipt(tx_hash, 1).await?;
        if !included.success {
            return Err(ClientError::Reverted { tx_hash });
        }
        self.set_state(
            index,
            TxState::Confirming {
                tx_hash,
                block_number: included.block_number,
            },
        );

        let block_number = if self.confirmations > 1 {
            let confirmed = client.wait_for_receipt(tx_hash, self.confirmations).await?;
            if !confirmed.success {
                return Err(ClientError::Reverted { tx_hash });
            }
            confirmed.block_number
        } else {
            included.block_number
        };

        info!(sequence = %self.id, step = %step.label, tx_hash = ?tx_hash, "Step confirmed");
        Ok(TxState::Confirmed { tx_hash, block_number })
    }

    fn set_state(&self, index: usize, state: TxState) {
        self.progress.lock().states[index] = state;
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.updates.send_replace(snapshot);
    }

    fn render(steps: &[TxStep], progress: &Progress) -> Vec<StepSnapshot> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepSnapshot {
                label: step.label.clone(),
                state: progress.states[index].clone(),
                enabled: progress.enabled(index),
            })
            .collect()
    }
}

fn outcome_label(state: &TxState) -> &'static str {
    match state {
        TxState::Confirmed { .. } => "confirmed",
        TxState::Failed { .. } => "failed",
        TxState::Idle => "rejected",
        _ => "in_flight",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeChainClient, WriteScript};
    use ethers::abi::Token;
    use ethers::types::{Address, U256};
    use love20_protocol::abi::ERC20_ABI;

    fn approve_step(label: &str) -> TxStep {
        TxStep::new(
            label,
            ContractCall::new(
                Address::repeat_byte(0xaa),
                &ERC20_ABI,
                "approve",
                vec![Token::Address(Address::repeat_byte(0x05)), Token::Uint(U256::from(10))],
            ),
        )
    }

    #[tokio::test]
    async fn test_second_step_waits_for_first() {
        let fake = FakeChainClient::new(Address::repeat_byte(0x01));
        let reporter = ErrorReporter::tracing();
        let sequence = TxSequence::new(vec![approve_step("approve"), approve_step("stake")], 1);

        assert!(sequence.is_enabled(0));
        assert!(!sequence.is_enabled(1));
        assert!(matches!(
            sequence.execute(1, &fake, &reporter).await,
            Err(ClientError::StepLocked { step: 1 })
        ));

        let state = sequence.execute(0, &fake, &reporter).await.unwrap();
        assert!(state.is_confirmed());
        assert!(!sequence.is_enabled(0));
        assert!(sequence.is_enabled(1));
    }

    #[tokio::test]
    async fn test_unlock_is_latched_across_reset() {
        let fake = FakeChainClient::new(Address::repeat_byte(0x01));
        let reporter = ErrorReporter::tracing();
        let sequence = TxSequence::new(vec![approve_step("approve"), approve_step("stake")], 1);

        sequence.execute(0, &fake, &reporter).await.unwrap();
        sequence.reset(0).unwrap();

        assert_eq!(sequence.state(0), Some(TxState::Idle));
        assert!(sequence.is_enabled(1));
    }

    #[tokio::test]
    async fn test_rejection_returns_to_idle_silently() {
        let fake = FakeChainClient::new(Address::repeat_byte(0x01));
        fake.script_write(WriteScript::Reject);
        let reporter = ErrorReporter::tracing();
        let sequence = TxSequence::new(vec![approve_step("approve")], 1);

        let state = sequence.execute(0, &fake, &reporter).await.unwrap();

        assert_eq!(state, TxState::Idle);
        assert!(sequence.is_enabled(0));
        assert_eq!(reporter.banner().message(), None);
    }

    #[tokio::test]
    async fn test_on_chain_revert_fails_step() {
        let fake = FakeChainClient::new(Address::repeat_byte(0x01));
        fake.script_write(WriteScript::RevertOnChain);
        let reporter = ErrorReporter::tracing();
        let sequence = TxSequence::new(vec![approve_step("approve"), approve_step("stake")], 2);

        let state = sequence.execute(0, &fake, &reporter).await.unwrap();

        assert_eq!(state, TxState::Failed { message: "Transaction reverted on chain".to_string() });
        assert_eq!(reporter.banner().message().as_deref(), Some("Transaction reverted on chain"));
        assert!(!sequence.is_enabled(1));
        // Failed steps can be retried by hand
        assert!(sequence.is_enabled(0));
    }

    #[tokio::test]
    async fn test_snapshots_are_published() {
        let fake = FakeChainClient::new(Address::repeat_byte(0x01));
        let reporter = ErrorReporter::tracing();
        let sequence = TxSequence::new(vec![approve_step("approve"), approve_step("stake")], 1);
        let mut updates = sequence.subscribe();

        sequence.execute_all(&fake, &reporter).await.unwrap();

        assert!(updates.has_changed().unwrap());
        let latest = updates.borrow_and_update().clone();
        assert!(latest.iter().all(|step| step.state.is_confirmed() && !step.enabled));
        assert!(sequence.is_complete());
        assert_eq!(fake.sent().len(), 2);
    }
}
