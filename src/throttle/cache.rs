use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};

/// Counter store used for rate limiting.
///
/// Implementations must make [`increment`](Self::increment) a single atomic
/// operation: two concurrent requests from one consumer race only here.
/// All TTLs are in seconds.
pub trait RateLimitCache: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<u64>>;

    /// Store `value` unless a live entry exists. Returns whether it was stored.
    fn put_if_absent(&self, key: &str, value: u64, ttl_secs: u64) -> anyhow::Result<bool>;

    /// Atomically add one and return the new value. A missing entry starts
    /// at zero and expires after `ttl_secs`; an existing entry keeps its TTL.
    fn increment(&self, key: &str, ttl_secs: u64) -> anyhow::Result<u64>;

    fn forget(&self, key: &str) -> anyhow::Result<()>;

    /// Count one request in the window at `keys`, restarting the window
    /// when it has closed or was opened with a different length. Returns the
    /// new count and the epoch second the window closes.
    ///
    /// The default composes the primitives above and is not atomic across
    /// keys: concurrent requests racing a policy change can lose counts.
    /// Stores with a native compare-and-reset should override it.
    fn increment_window(&self, keys: &WindowKeys, window_secs: u64, now: u64) -> anyhow::Result<(u64, u64)> {
        let stale_policy = matches!(self.get(&keys.expires)?, Some(stored) if stored != window_secs);
        let stale_window = matches!(self.get(&keys.reset)?, Some(reset) if reset <= now);
        if stale_policy || stale_window {
            self.forget(&keys.requests)?;
            self.forget(&keys.reset)?;
            self.forget(&keys.expires)?;
        }
        self.put_if_absent(&keys.requests, 0, window_secs)?;
        self.put_if_absent(&keys.expires, window_secs, window_secs)?;
        self.put_if_absent(&keys.reset, now + window_secs, window_secs)?;
        let count = self.increment(&keys.requests, window_secs)?;
        let reset_at = self.get(&keys.reset)?.unwrap_or(now + window_secs);
        Ok((count, reset_at))
    }
}

/// Cache keys of one consumer's window under one throttle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowKeys {
    pub requests: String,
    pub reset: String,
    /// Window length the counters were opened with.
    pub expires: String,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: u64,
    /// Window length for counters opened by `increment_window`, else 0.
    window: u64,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`RateLimitCache`] backed by a sharded concurrent map.
///
/// Expired entries are treated as absent and replaced lazily.
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet replaced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

impl RateLimitCache for InMemoryCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<u64>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    fn put_if_absent(&self, key: &str, value: u64, ttl_secs: u64) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let mut stored = false;
        self.entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if !entry.is_live(now) {
                    *entry = Entry {
                        value,
                        expires_at: now + ttl_secs,
                        window: 0,
                    };
                    stored = true;
                }
            })
            .or_insert_with(|| {
                stored = true;
                Entry {
                    value,
                    expires_at: now + ttl_secs,
                    window: 0,
                }
            });
        Ok(stored)
    }

    fn increment(&self, key: &str, ttl_secs: u64) -> anyhow::Result<u64> {
        let now = self.clock.now();
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: now + ttl_secs,
            window: 0,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: 0,
                expires_at: now + ttl_secs,
                window: 0,
            };
        }
        entry.value += 1;
        Ok(entry.value)
    }

    fn forget(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn increment_window(&self, keys: &WindowKeys, window_secs: u64, now: u64) -> anyhow::Result<(u64, u64)> {
        let fresh = Entry {
            value: 0,
            expires_at: now + window_secs,
            window: window_secs,
        };
        let (count, reset_at) = {
            // Check, reset and count under one shard lock.
            let mut entry = self.entries.entry(keys.requests.clone()).or_insert(fresh);
            if !entry.is_live(now) || entry.window != window_secs {
                *entry = fresh;
            }
            entry.value += 1;
            (entry.value, entry.expires_at)
        };
        let mirror = |value| Entry {
            value,
            expires_at: reset_at,
            window: 0,
        };
        self.entries.insert(keys.reset.clone(), mirror(reset_at));
        self.entries.insert(keys.expires.clone(), mirror(window_secs));
        Ok((count, reset_at))
    }
}
