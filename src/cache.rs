//! In-process caching with expiry
//!
//! Branch listings can be reused for a few seconds but must not live forever.
//! A cache is an ordinary value passed to whoever needs it. Its notion of
//! "now" comes from an injected [`Clock`].

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Instant::now())
    }
}

/// Cache whose entries expire `ttl` after insertion.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<Mutex<HashMap<K, (Instant, V)>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// Branch names per repository root.
pub type BranchCache = TtlCache<PathBuf, Vec<String>>;

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new empty cache using the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<K, (Instant, V)>>> {
        self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "TTL cache".to_string(),
        })
    }

    fn fresh(&self, stored_at: Instant) -> bool {
        self.clock.now().saturating_duration_since(stored_at) < self.ttl
    }

    /// Get a live value, or compute and cache it if absent or expired.
    ///
    /// A failed computation is not cached.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.get(&key)? {
            return Ok(value);
        }

        // Computed outside the lock; concurrent misses may both compute.
        let value = compute()?;
        self.insert(key, value.clone())?;
        Ok(value)
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((stored_at, value)) if self.fresh(*stored_at) => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let now = self.clock.now();
        self.lock()?.insert(key, (now, value));
        Ok(())
    }

    /// Drop one entry, e.g. after a transaction changed the repository.
    pub fn invalidate(&self, key: &K) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize> {
        let entries = self.lock()?;
        Ok(entries
            .values()
            .filter(|(stored_at, _)| self.fresh(*stored_at))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
