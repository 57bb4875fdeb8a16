//! Optimistic write log
//!
//! After a write confirms, the authoritative read may still lag behind. The
//! log remembers confirmed writes by an idempotent [`OperationId`] so views
//! can overlay them until a read shows the same fact, or until the entry is
//! older than the configured maximum age.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{duration_ms, Clock, SystemClock};

/// Stable identity of a write; recording the same operation twice is a no-op
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Reward minting for one action, round and account
    pub fn mint_action_reward(token: Address, round: u64, action_id: U256, account: Address) -> Self {
        Self(format!("mint_action_reward:{:#x}:{}:{}:{:#x}", token, round, action_id, account))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    recorded_at_ms: i64,
    tx_hash: Option<H256>,
}

/// Confirmed writes not yet visible to reads
pub struct PendingWriteLog<C: Clock = SystemClock> {
    entries: Mutex<HashMap<OperationId, PendingEntry>>,
    max_age: Duration,
    clock: C,
}

impl PendingWriteLog<SystemClock> {
    /// Create a new log using the system clock
    pub fn new(max_age: Duration) -> Self {
        Self::with_clock(max_age, SystemClock)
    }
}

impl<C: Clock> PendingWriteLog<C> {
    pub fn with_clock(max_age: Duration, clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
            clock,
        }
    }

    /// Remember a confirmed write. The first record of an operation wins.
    pub fn record(&self, operation: OperationId, tx_hash: Option<H256>) {
        let now = self.clock.now_ms();
        self.entries.lock().entry(operation).or_insert_with_key(|operation| {
            debug!(operation = %operation, "Recorded pending write");
            PendingEntry {
                recorded_at_ms: now,
                tx_hash,
            }
        });
    }

    /// Whether `operation` is still pending; stale entries are dropped here
    pub fn contains(&self, operation: &OperationId) -> bool {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        match entries.get(operation) {
            Some(entry) if self.is_stale(entry, now) => {
                debug!(operation = %operation, "Dropping stale pending write");
                entries.remove(operation);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Transaction hash recorded for `operation`
    pub fn tx_hash(&self, operation: &OperationId) -> Option<H256> {
        self.entries.lock().get(operation).and_then(|entry| entry.tx_hash)
    }

    /// Feed an authoritative read. The entry is cleared only when the read
    /// confirms the write; returns whether the operation is still pending.
    pub fn reconcile(&self, operation: &OperationId, confirmed_by_read: bool) -> bool {
        if confirmed_by_read {
            if self.entries.lock().remove(operation).is_some() {
                debug!(operation = %operation, "Pending write reconciled");
            }
            return false;
        }
        self.contains(operation)
    }

    /// Drop every entry older than the maximum age
    pub fn prune(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_stale(entry, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn is_stale(&self, entry: &PendingEntry, now_ms: i64) -> bool {
        now_ms.saturating_sub(entry.recorded_at_ms) >= duration_ms(self.max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::Arc;

    fn op(round: u64) -> OperationId {
        OperationId::mint_action_reward(Address::repeat_byte(0xaa), round, U256::from(7), Address::repeat_byte(0x01))
    }

    #[test]
    fn test_cleared_only_when_read_confirms() {
        let log = PendingWriteLog::new(Duration::from_secs(600));
        log.record(op(10), None);

        assert!(log.reconcile(&op(10), false));
        assert!(log.contains(&op(10)));

        assert!(!log.reconcile(&op(10), true));
        assert!(log.is_empty());
    }

    #[test]
    fn test_unbounded_max_age_keeps_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let log = PendingWriteLog::with_clock(Duration::MAX, clock.clone());
        log.record(op(10), None);

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(log.reconcile(&op(10), false));
    }

    #[test]
    fn test_record_is_idempotent() {
        let clock = Arc::new(ManualClock::new(0));
        let log = PendingWriteLog::with_clock(Duration::from_secs(10), clock.clone());
        let first = H256::repeat_byte(0x01);

        log.record(op(10), Some(first));
        clock.advance(Duration::from_secs(5));
        log.record(op(10), Some(H256::repeat_byte(0x02)));

        assert_eq!(log.len(), 1);
        assert_eq!(log.tx_hash(&op(10)), Some(first));

        // Age counts from the first record
        clock.advance(Duration::from_secs(5));
        assert!(!log.contains(&op(10)));
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let log = PendingWriteLog::with_clock(Duration::from_secs(10), clock.clone());
        log.record(op(10), None);
        clock.advance(Duration::from_secs(8));
        log.record(op(11), None);
        clock.advance(Duration::from_secs(3));

        assert_eq!(log.prune(), 1);
        assert!(log.contains(&op(11)));
    }
}
