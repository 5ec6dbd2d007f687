use std::collections::HashMap;
use std::time::Duration;

use ember_types::models::{Mode, UserProfile};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cell::CellId;

/// Default entry lifetime. Freshness is deliberately sacrificed for read-cost
/// reduction; a hit never reflects swipes recorded after it was populated.
pub const DEFAULT_TTL_SECS: u64 = 600;

struct Entry {
    candidates: Vec<UserProfile>,
    inserted_at: Instant,
}

/// Shared TTL-bounded cache of raw candidate lists keyed by (cell, mode).
///
/// Entries are immutable once written and expire lazily on read; there is no
/// explicit invalidation on write. Requester-specific filtering happens in
/// the feed assembler, so one entry serves every requester in the cell.
pub struct FeedCache {
    entries: RwLock<HashMap<(CellId, Mode), Entry>>,
    ttl: Duration,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, cell: &CellId, mode: Mode) -> Option<Vec<UserProfile>> {
        let entries = self.entries.read().await;
        let entry = entries.get(&(cell.clone(), mode))?;
        if entry.inserted_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.candidates.clone())
    }

    pub async fn put(&self, cell: CellId, mode: Mode, candidates: Vec<UserProfile>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            (cell, mode),
            Entry {
                candidates,
                inserted_at: Instant::now(),
            },
        );
        // Expired entries are only ever read through get(), which treats them
        // as misses; sweep them here so the map does not grow unbounded.
        entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
    }
}
