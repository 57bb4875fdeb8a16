//! Local TTL cache
//!
//! Values are stored as JSON envelopes `{"value": ..., "expiry": ms|null}`
//! in a string key/value store. `expiry` is absolute Unix time in
//! milliseconds, computed when the value is written; `null` never expires.
//! Expired entries are removed on the read that discovers them.
//!
//! `U256` values must go through [`love20_protocol::serde_u256`] (or a type
//! that uses it) so large integers survive as decimal strings.

pub mod clock;
pub mod storage;

pub use clock::{duration_ms, Clock, ManualClock, SystemClock};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};

use std::time::Duration;

use ethers::types::{Address, U256};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;

/// Options for [`LocalCache::set`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Lifetime from now; `None` never expires
    pub expires_in: Option<Duration>,
}

impl CacheOptions {
    pub fn never() -> Self {
        Self { expires_in: None }
    }

    pub fn expires_in(ttl: Duration) -> Self {
        Self { expires_in: Some(ttl) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    value: T,
    expiry: Option<i64>,
}

/// Cache key builders shared by every reader
pub mod keys {
    use super::*;

    fn hex(address: &Address) -> String {
        format!("{:#x}", address)
    }

    /// Immutable action metadata
    pub fn action_base_info(token: &Address, action_id: U256) -> String {
        format!("action_base_info_{}_{}", hex(token), action_id)
    }

    /// Display name of a group
    pub fn group_name(group_id: U256) -> String {
        format!("group_name_{}", group_id)
    }

    /// Derived governor status of an account for one token
    pub fn governor_status(token: &Address, account: &Address) -> String {
        format!("governor_status_{}_{}", hex(token), hex(account))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total reads
    pub total_requests: u64,

    /// Reads that returned a value
    pub cache_hits: u64,

    /// Reads that found nothing usable
    pub cache_misses: u64,

    /// Entries removed because they had expired
    pub expired_removals: u64,

    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    fn update_hit_rate(&mut self) {
        if self.total_requests > 0 {
            self.hit_rate = self.cache_hits as f64 / self.total_requests as f64;
        }
    }

    fn record_hit(&mut self) {
        self.total_requests += 1;
        self.cache_hits += 1;
        self.update_hit_rate();
    }

    fn record_miss(&mut self) {
        self.total_requests += 1;
        self.cache_misses += 1;
        self.update_hit_rate();
    }
}

/// TTL cache over a [`StorageBackend`]
pub struct LocalCache<S: StorageBackend, C: Clock = SystemClock> {
    storage: S,
    clock: C,
    stats: Mutex<CacheStats>,
}

impl<S: StorageBackend> LocalCache<S, SystemClock> {
    /// Create a cache using the system clock
    pub fn new(storage: S) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<S: StorageBackend, C: Clock> LocalCache<S, C> {
    /// Create a cache with an explicit clock
    pub fn with_clock(storage: S, clock: C) -> Self {
        Self {
            storage,
            clock,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Read a value; absent, expired, corrupt or unreadable entries are a miss
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.miss(key),
            Err(e) => {
                warn!(key = key, error = %e, "Cache read failed");
                return self.miss(key);
            }
        };

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = key, error = %e, "Dropping corrupt cache entry");
                self.remove_quietly(key);
                return self.miss(key);
            }
        };

        if let Some(expiry) = envelope.expiry {
            if self.clock.now_ms() >= expiry {
                debug!(key = key, expiry = expiry, "Cache entry expired");
                self.remove_quietly(key);
                self.stats.lock().expired_removals += 1;
                return self.miss(key);
            }
        }

        self.stats.lock().record_hit();
        metrics::counter!("love20_cache_hits_total", 1);
        Some(envelope.value)
    }

    /// Write a value
    pub fn set<T: Serialize>(&self, key: &str, value: &T, options: CacheOptions) -> Result<()> {
        let expiry = options
            .expires_in
            .map(|ttl| self.clock.now_ms().saturating_add(duration_ms(ttl)));
        let raw = serde_json::to_string(&Envelope { value, expiry })?;
        self.storage.set_item(key, raw)?;
        debug!(key = key, expiry = ?expiry, "Cache entry written");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove_item(key)
    }

    /// Whether a raw entry exists, regardless of expiry
    pub fn contains_raw(&self, key: &str) -> bool {
        matches!(self.storage.get_item(key), Ok(Some(_)))
    }

    /// Remove every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut removed = 0;
        for key in self.storage.keys()? {
            let Some(raw) = self.storage.get_item(&key)? else {
                continue;
            };
            let expired = match serde_json::from_str::<Envelope<serde_json::Value>>(&raw) {
                Ok(envelope) => envelope.expiry.map_or(false, |expiry| now >= expiry),
                Err(_) => true,
            };
            if expired {
                self.storage.remove_item(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn miss<T>(&self, key: &str) -> Option<T> {
        debug!(key = key, "Cache miss");
        self.stats.lock().record_miss();
        metrics::counter!("love20_cache_misses_total", 1);
        None
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            warn!(key = key, error = %e, "Failed to remove cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use love20_protocol::ActionInfo;
    use proptest::prelude::*;

    fn cache() -> (LocalCache<Arc<MemoryStorage>, Arc<ManualClock>>, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (
            LocalCache::with_clock(storage.clone(), clock.clone()),
            storage,
            clock,
        )
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let (cache, storage, clock) = cache();
        cache
            .set("group_name_1", &"alpha", CacheOptions::expires_in(Duration::from_secs(60)))
            .unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get::<String>("group_name_1").as_deref(), Some("alpha"));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get::<String>("group_name_1"), None);
        assert_eq!(storage.get_item("group_name_1").unwrap(), None);
        assert_eq!(cache.stats().expired_removals, 1);
    }

    #[test]
    fn test_huge_ttl_does_not_wrap() {
        let (cache, _, clock) = cache();
        cache
            .set("k", &7u64, CacheOptions::expires_in(Duration::from_secs(u64::MAX)))
            .unwrap();
        assert_eq!(cache.get::<u64>("k"), Some(7));

        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(cache.get::<u64>("k"), Some(7));
        assert_eq!(duration_ms(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_no_expiry_lives_forever() {
        let (cache, _, clock) = cache();
        cache.set("k", &42u64, CacheOptions::never()).unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert_eq!(cache.get::<u64>("k"), Some(42));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (cache, storage, _) = cache();
        storage.set_item("k", "garbage".to_string()).unwrap();

        assert_eq!(cache.get::<u64>("k"), None);
        assert!(!cache.contains_raw("k"));
    }

    #[test]
    fn test_action_info_keeps_big_integers() {
        let (cache, storage, _) = cache();
        let big = U256::from_dec_str("123456789012345678901234567890").unwrap();
        let info = ActionInfo {
            id: U256::from(7),
            author: Address::repeat_byte(0x11),
            create_at_block: U256::from(1234),
            min_stake: big,
            max_random_accounts: U256::from(3),
            white_list_address: Address::zero(),
            title: "plant trees".to_string(),
            verification_rule: "photo".to_string(),
        };
        let key = keys::action_base_info(&Address::repeat_byte(0xaa), info.id);

        cache.set(&key, &info, CacheOptions::never()).unwrap();

        let raw = storage.get_item(&key).unwrap().unwrap();
        assert!(raw.contains("\"123456789012345678901234567890\""));
        assert_eq!(cache.get::<ActionInfo>(&key), Some(info));
    }

    #[test]
    fn test_purge_expired() {
        let (cache, _, clock) = cache();
        cache.set("a", &1u8, CacheOptions::expires_in(Duration::from_secs(1))).unwrap();
        cache.set("b", &2u8, CacheOptions::never()).unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(cache.contains_raw("b"));
    }

    #[test]
    fn test_key_formats() {
        let token = Address::repeat_byte(0xaa);
        let account = Address::repeat_byte(0x01);
        assert_eq!(
            keys::action_base_info(&token, U256::from(7)),
            format!("action_base_info_0x{}_7", "aa".repeat(20))
        );
        assert_eq!(keys::group_name(U256::from(12)), "group_name_12");
        assert!(keys::governor_status(&token, &account).starts_with("governor_status_0xaaaa"));
    }

    proptest! {
        #[test]
        fn prop_ttl_boundary(ttl_ms in 1u64..10_000_000, elapsed_ms in 0u64..20_000_000) {
            let (cache, _, clock) = cache();
            cache.set("k", &"v", CacheOptions::expires_in(Duration::from_millis(ttl_ms))).unwrap();
            clock.advance(Duration::from_millis(elapsed_ms));

            let hit = cache.get::<String>("k").is_some();
            prop_assert_eq!(hit, elapsed_ms < ttl_ms);
        }
    }
}
