//! In-memory nonce tracking for one-shot tokens.
//!
//! An LRU+TTL cache keyed by the nonce rendered as hex. Eviction order
//! is insertion order: reads go through `peek` and never promote, so the
//! underlying LRU's least-recently-used slot is always the
//! oldest-inserted entry.
//!
//! `mark_used` is the consume-or-reject primitive. It performs a single
//! atomic transition under the cache lock:
//! absent or expired -> present-used (accepted), present-unused ->
//! present-used (accepted), present-used and unexpired -> rejected
//! (replay). Under concurrent validation of the same nonce exactly one
//! caller wins.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Default capacity bound.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default entry TTL (5 minutes), matching the one-shot token TTL.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

/// Nonce cache configuration.
#[derive(Debug, Clone)]
pub struct NonceCacheConfig {
    /// Hard capacity bound; the oldest-inserted entry is evicted when
    /// an insert would exceed it.
    pub max_entries: usize,

    /// TTL applied on `mark_used`'s insertion path.
    pub default_ttl_ms: i64,
}

impl Default for NonceCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    expires_at_ms: i64,
    used: bool,
}

impl NonceEntry {
    fn live(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// LRU+TTL nonce cache.
///
/// All operations take the same mutex, so mutations serialize against
/// each other and reads are consistent with the most recent mutation.
/// The size invariant `len() <= max_entries` holds after every
/// operation.
pub struct NonceCache {
    entries: Mutex<LruCache<String, NonceEntry>>,
    default_ttl_ms: i64,
}

impl NonceCache {
    /// Create a cache with the given bounds.
    #[must_use]
    pub fn new(config: NonceCacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl_ms: config.default_ttl_ms,
        }
    }

    /// Insert `nonce` as unused with the given TTL.
    ///
    /// Expired entries are swept first; if the cache is still full, the
    /// oldest-inserted entry is evicted.
    pub fn add(&self, nonce: &str, ttl_ms: i64) {
        self.add_at(nonce, ttl_ms, now_ms());
    }

    /// Deterministic [`NonceCache::add`] against an explicit clock.
    pub fn add_at(&self, nonce: &str, ttl_ms: i64, now_ms: i64) {
        let mut entries = self.entries.lock();
        Self::sweep_expired(&mut entries, now_ms);
        // At capacity, the LRU slot (oldest-inserted, since reads never
        // promote) is dropped by the insert itself.
        entries.put(
            nonce.to_string(),
            NonceEntry {
                expires_at_ms: now_ms.saturating_add(ttl_ms),
                used: false,
            },
        );
    }

    /// True iff `nonce` is present and unexpired. Expired entries are
    /// purged on read.
    #[must_use]
    pub fn has(&self, nonce: &str) -> bool {
        self.has_at(nonce, now_ms())
    }

    /// Deterministic [`NonceCache::has`] against an explicit clock.
    #[must_use]
    pub fn has_at(&self, nonce: &str, now_ms: i64) -> bool {
        let mut entries = self.entries.lock();
        let live = entries.peek(nonce).is_some_and(|entry| entry.live(now_ms));
        if !live {
            entries.pop(nonce);
        }
        live
    }

    /// Atomically consume `nonce`. Returns `true` when this caller spent
    /// it (first use, or first use after expiry) and `false` on replay.
    #[must_use]
    pub fn mark_used(&self, nonce: &str) -> bool {
        self.mark_used_at(nonce, now_ms())
    }

    /// Deterministic [`NonceCache::mark_used`] against an explicit clock.
    #[must_use]
    pub fn mark_used_at(&self, nonce: &str, now_ms: i64) -> bool {
        let mut entries = self.entries.lock();

        let live = entries
            .peek(nonce)
            .filter(|entry| entry.live(now_ms))
            .copied();
        match live {
            Some(entry) if entry.used => false,
            Some(_) => {
                if let Some(entry) = entries.peek_mut(nonce) {
                    entry.used = true;
                }
                true
            }
            None => {
                // Absent or expired: insert as already-used so a replay
                // within the TTL is still caught.
                Self::sweep_expired(&mut entries, now_ms);
                entries.put(
                    nonce.to_string(),
                    NonceEntry {
                        expires_at_ms: now_ms.saturating_add(self.default_ttl_ms),
                        used: true,
                    },
                );
                true
            }
        }
    }

    /// Number of entries currently held (including expired entries not
    /// yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn sweep_expired(entries: &mut LruCache<String, NonceEntry>, now_ms: i64) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.live(now_ms))
            .map(|(nonce, _)| nonce.clone())
            .collect();
        for nonce in expired {
            entries.pop(&nonce);
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
