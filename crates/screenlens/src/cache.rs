//! Process-wide two-tier cache.
//!
//! Tier one is always populated: the full `ScreenState` (OCR, elements,
//! descriptions) of recent captures. Tier two, the embeddings, is computed
//! on demand, and only while the entry is younger than the stale limit.
//! Only the orchestrator mutates the cache; the sweeper evicts by age.

use crate::errors::PipelineError;
use crate::types::ScreenState;
use std::collections::HashMap;
use std::sync::Mutex;

/// One cached capture.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub screen_state: ScreenState,
    /// Insertion time, epoch milliseconds.
    pub timestamp: i64,
    pub has_embeddings: bool,
}

#[derive(Default)]
pub struct TwoTierCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TwoTierCache {
    pub fn insert(&self, screen_state: ScreenState, timestamp: i64, has_embeddings: bool) {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.insert(
            screen_state.id.clone(),
            CacheEntry {
                screen_state,
                timestamp,
                has_embeddings,
            },
        );
    }

    /// Fetch an entry for on-demand embedding. Entries past `stale_ms` are
    /// evicted on the spot and reported as stale; missing ids are invalid
    /// input.
    pub fn take_fresh(
        &self,
        screen_id: &str,
        stale_ms: i64,
        now_ms: i64,
    ) -> Result<CacheEntry, PipelineError> {
        let mut entries = self.entries.lock().expect("cache lock");
        let Some(entry) = entries.get(screen_id) else {
            return Err(PipelineError::InvalidInput(format!(
                "screen {screen_id} is not cached"
            )));
        };
        let age_ms = now_ms - entry.timestamp;
        if age_ms > stale_ms {
            entries.remove(screen_id);
            return Err(PipelineError::Stale {
                screen_id: screen_id.to_string(),
                age_ms,
            });
        }
        Ok(entry.clone())
    }

    pub fn mark_embedded(&self, screen_id: &str) {
        let mut entries = self.entries.lock().expect("cache lock");
        if let Some(entry) = entries.get_mut(screen_id) {
            entry.has_embeddings = true;
        }
    }

    pub fn get(&self, screen_id: &str) -> Option<CacheEntry> {
        self.entries.lock().expect("cache lock").get(screen_id).cloned()
    }

    /// Drop entries older than `stale_ms`. Returns how many were evicted.
    pub fn sweep_stale(&self, stale_ms: i64, now_ms: i64) -> usize {
        let mut entries = self.entries.lock().expect("cache lock");
        let before = entries.len();
        entries.retain(|_, entry| now_ms - entry.timestamp <= stale_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
