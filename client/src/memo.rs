//! Memoized derived views
//!
//! A derived view is recomputed only when its raw inputs change. Callers pass
//! a key naming the view and a fingerprint of the raw batch outcomes it was
//! derived from (see `BatchResults::fingerprint`); identical inputs give back
//! the very same `Arc`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

/// Per-view memo table
#[derive(Debug)]
pub struct ViewMemo<V> {
    entries: DashMap<String, (u64, Arc<V>)>,
}

impl<V> Default for ViewMemo<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> ViewMemo<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized value for `key` if its fingerprint matches,
    /// otherwise derive, store and return a fresh one.
    pub fn get_or_derive<F>(&self, key: &str, fingerprint: u64, derive: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(entry) = self.entries.get(key) {
            let (stored, value) = entry.value();
            if *stored == fingerprint {
                trace!(key = key, "Memo hit");
                return Arc::clone(value);
            }
        }

        let value = Arc::new(derive());
        self.entries
            .insert(key.to_string(), (fingerprint, Arc::clone(&value)));
        value
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
