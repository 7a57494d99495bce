//! Per-connection cache of rendered pane views.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use peaky_protocol::payloads::{ColorProfile, PaneViewMode, PaneViewResponse};

use super::{CACHE_CAPACITY, CACHE_TTL};
use crate::manager::RenderOptions;

/// Identity of a cached render: the pane plus every option that changes
/// the rendered frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Rendered pane.
    pub pane_id: String,
    /// Normalised columns.
    pub cols: u16,
    /// Normalised rows.
    pub rows: u16,
    /// Render mode.
    pub mode: PaneViewMode,
    /// Cursor visibility.
    pub show_cursor: bool,
    /// Colour profile.
    pub color_profile: ColorProfile,
}

impl CacheKey {
    /// Key for rendering `pane_id` with `options`.
    #[must_use]
    pub fn new(pane_id: &str, options: &RenderOptions) -> Self {
        Self {
            pane_id: pane_id.to_owned(),
            cols: options.cols,
            rows: options.rows,
            mode: options.mode,
            show_cursor: options.show_cursor,
            color_profile: options.color_profile,
        }
    }
}

/// A cached response and the content sequence it was rendered at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response as last sent.
    pub response: PaneViewResponse,
    /// Pane content sequence at render time.
    pub update_seq: u64,
    rendered_at: Instant,
}

/// TTL- and capacity-bounded render cache owned by one connection.
#[derive(Debug)]
pub struct PaneViewCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for PaneViewCache {
    fn default() -> Self {
        Self::with_limits(CACHE_TTL, CACHE_CAPACITY)
    }
}

impl PaneViewCache {
    /// Cache with an explicit TTL and capacity.
    #[must_use]
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.rendered_at) > self.ttl
    }

    /// Returns the live entry for `key`, refreshing its timestamp. Expired
    /// entries are removed and reported as misses.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = self.expired(entries.get(key)?, now);
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.rendered_at = now;
        Some(entry.clone())
    }

    /// Stores `response`, then prunes expired entries and evicts the
    /// oldest until the cache is within capacity.
    pub fn put(&self, key: CacheKey, response: PaneViewResponse) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.insert(
            key,
            CacheEntry {
                update_seq: response.update_seq,
                response,
                rendered_at: now,
            },
        );
        entries.retain(|_, entry| !self.expired(entry, now));
        let extra = entries.len().saturating_sub(self.capacity);
        if extra == 0 {
            return;
        }
        let mut by_age: Vec<(Instant, CacheKey)> = entries
            .iter()
            .map(|(key, entry)| (entry.rendered_at, key.clone()))
            .collect();
        by_age.sort_by_key(|(rendered_at, _)| *rendered_at);
        for (_, key) in by_age.into_iter().take(extra) {
            entries.remove(&key);
        }
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
