//! Thread-Safe Cache Engine
//!
//! This module implements the core key-value store for embercache: a
//! thread-safe, sharded map from opaque keys to entries, executing the three
//! mutation commands (`add`, `set`, `delete`) as atomic check-and-update
//! steps.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Atomic Mutations**: Each mutation holds its shard's write lock for the
//!    whole check-and-update, so two mutations on the same key always
//!    serialize - exactly one of a concurrent `add`/`delete` pair wins.
//! 3. **Lazy Expiry**: Expired entries count as absent and are reclaimed on
//!    access, plus by the background sweeper.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CacheEngine                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function. Mutations on
//! different keys proceed concurrently; mutations on the same key hit the
//! same shard and serialize on its write lock. No cross-key ordering is
//! promised.

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Number of shards for the cache engine.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// `exptime` values up to this many seconds are relative offsets; larger
/// values are absolute unix timestamps. 30 days, the memcached convention.
const EXPTIME_RELATIVE_LIMIT: i64 = 60 * 60 * 24 * 30;

/// The result of a single mutation against the cache.
///
/// All four variants are ordinary results of the state machine. `NotStored`
/// and `NotFound` are not errors; the connection loop reports them as plain
/// response lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The payload was stored (`set` always, `add` on an absent key).
    Stored,
    /// `add` declined because the key is already bound.
    NotStored,
    /// `delete` removed the entry.
    Deleted,
    /// `delete` found no entry for the key.
    NotFound,
}

/// One stored value together with its client-supplied metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The payload bytes.
    pub data: Bytes,
    /// Opaque client metadata, handed back verbatim on `get`.
    pub flags: u32,
    /// When this entry expires (None = never expires).
    pub expires_at: Option<Instant>,
    /// When this entry was stored.
    pub stored_at: Instant,
}

impl Entry {
    /// Creates an entry from the wire-level `exptime` field.
    ///
    /// memcached convention: `0` never expires, a negative value is already
    /// expired, values up to 30 days are relative seconds, anything larger
    /// is an absolute unix timestamp.
    pub fn new(data: Bytes, flags: u32, exptime: i64) -> Self {
        let now = Instant::now();
        let expires_at = match exptime {
            0 => None,
            t if t < 0 => Some(now),
            t if t <= EXPTIME_RELATIVE_LIMIT => Some(now + Duration::from_secs(t as u64)),
            t => {
                let unix_now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                if t <= unix_now {
                    Some(now)
                } else {
                    Some(now + Duration::from_secs((t - unix_now) as u64))
                }
            }
        };

        Self {
            data,
            flags,
            expires_at,
            stored_at: now,
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// A single shard containing a portion of the key space.
#[derive(Debug)]
struct Shard {
    entries: RwLock<HashMap<Bytes, Entry>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

/// Counters exported by [`CacheEngine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub set_ops: u64,
    pub add_ops: u64,
    pub delete_ops: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub expired: u64,
}

/// The authoritative key-to-entry mapping.
///
/// This struct is designed to be wrapped in an `Arc` and shared across all
/// client handler tasks. Every operation is thread-safe, and each mutation
/// is atomic with respect to its key: the check and the update happen under
/// one shard write lock, so no two concurrent mutations on the same key can
/// both observe the pre-mutation state.
///
/// # Example
///
/// ```
/// use embercache::storage::{CacheEngine, Entry, MutationOutcome};
/// use bytes::Bytes;
///
/// let cache = CacheEngine::new();
///
/// let entry = Entry::new(Bytes::from("ember"), 0, 0);
/// assert_eq!(cache.add(Bytes::from("name"), entry), MutationOutcome::Stored);
///
/// // A second add on the same key is refused.
/// let entry = Entry::new(Bytes::from("other"), 0, 0);
/// assert_eq!(cache.add(Bytes::from("name"), entry), MutationOutcome::NotStored);
///
/// assert_eq!(cache.delete(&Bytes::from("name")), MutationOutcome::Deleted);
/// assert_eq!(cache.delete(&Bytes::from("name")), MutationOutcome::NotFound);
/// ```
pub struct CacheEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: live entries (approximate)
    entry_count: AtomicU64,

    /// Statistics: total set operations
    set_count: AtomicU64,

    /// Statistics: total add operations
    add_count: AtomicU64,

    /// Statistics: total delete operations
    delete_count: AtomicU64,

    /// Statistics: get lookups that found a live entry
    hit_count: AtomicU64,

    /// Statistics: get lookups that found nothing
    miss_count: AtomicU64,

    /// Statistics: entries reclaimed after expiring
    expired_count: AtomicU64,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("shards", &self.shards.len())
            .field("entries", &self.entry_count.load(Ordering::Relaxed))
            .field("set_ops", &self.set_count.load(Ordering::Relaxed))
            .field("add_ops", &self.add_count.load(Ordering::Relaxed))
            .field("delete_ops", &self.delete_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheEngine {
    /// Creates a new, empty cache engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            entry_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            add_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard_for(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Unconditionally stores `entry` under `key`, overwriting any previous
    /// binding. Always returns [`MutationOutcome::Stored`].
    pub fn set(&self, key: Bytes, entry: Entry) -> MutationOutcome {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(&key);
        let mut entries = shard.entries.write().unwrap();

        if entries.insert(key, entry).is_none() {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }

        MutationOutcome::Stored
    }

    /// Stores `entry` under `key` only if the key is currently absent.
    ///
    /// An expired entry counts as absent: it is replaced and the add
    /// succeeds. The presence check and the insert happen under one write
    /// lock, so of N racing adds on the same key exactly one observes the
    /// key as absent.
    pub fn add(&self, key: Bytes, entry: Entry) -> MutationOutcome {
        self.add_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(&key);
        let mut entries = shard.entries.write().unwrap();

        match entries.get(&key) {
            Some(existing) if !existing.is_expired() => MutationOutcome::NotStored,
            Some(_) => {
                // Replacing a dead entry; the live count is unchanged.
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                entries.insert(key, entry);
                MutationOutcome::Stored
            }
            None => {
                entries.insert(key, entry);
                self.entry_count.fetch_add(1, Ordering::Relaxed);
                MutationOutcome::Stored
            }
        }
    }

    /// Removes the entry for `key`.
    ///
    /// Returns [`MutationOutcome::Deleted`] if a live entry was removed and
    /// [`MutationOutcome::NotFound`] otherwise. Deleting an absent key any
    /// number of times keeps returning `NotFound`.
    pub fn delete(&self, key: &Bytes) -> MutationOutcome {
        self.delete_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(key);
        let mut entries = shard.entries.write().unwrap();

        match entries.remove(key) {
            Some(entry) if !entry.is_expired() => {
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                MutationOutcome::Deleted
            }
            Some(_) => {
                // The entry was already dead; to the client the key was absent.
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                MutationOutcome::NotFound
            }
            None => MutationOutcome::NotFound,
        }
    }

    /// Looks up the entry for `key`.
    ///
    /// Returns `None` if the key is absent or the entry has expired. Expired
    /// entries are reclaimed on access (lazy expiry): the fast path takes a
    /// read lock, and only an expired hit upgrades to a write lock to remove
    /// the corpse.
    pub fn get(&self, key: &Bytes) -> Option<Entry> {
        {
            let entries = self.shard_for(key).entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.clone());
                }
                Some(_) => {} // fall through to reclaim under the write lock
                None => {
                    self.miss_count.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let mut entries = self.shard_for(key).entries.write().unwrap();
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Raced with a concurrent store that revived the key.
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Some(entry.clone());
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Checks whether a live entry exists for `key`.
    pub fn contains(&self, key: &Bytes) -> bool {
        let entries = self.shard_for(key).entries.read().unwrap();
        entries.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    /// Returns the approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry.
    ///
    /// Called by the background expiry sweeper.
    ///
    /// # Returns
    ///
    /// The number of entries reclaimed.
    pub fn reclaim_expired(&self) -> u64 {
        let mut reclaimed = 0u64;

        for shard in &self.shards {
            let mut entries = shard.entries.write().unwrap();
            let before = entries.len();

            entries.retain(|_, entry| !entry.is_expired());

            reclaimed += (before - entries.len()) as u64;
        }

        if reclaimed > 0 {
            self.entry_count.fetch_sub(reclaimed, Ordering::Relaxed);
            self.expired_count.fetch_add(reclaimed, Ordering::Relaxed);
        }

        reclaimed
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entry_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            add_ops: self.add_count.load(Ordering::Relaxed),
            delete_ops: self.delete_count.load(Ordering::Relaxed),
            get_hits: self.hit_count.load(Ordering::Relaxed),
            get_misses: self.miss_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entry(data: &str) -> Entry {
        Entry::new(Bytes::from(data.to_string()), 0, 0)
    }

    #[test]
    fn test_set_and_get() {
        let cache = CacheEngine::new();

        assert_eq!(
            cache.set(Bytes::from("key"), entry("value")),
            MutationOutcome::Stored
        );
        let found = cache.get(&Bytes::from("key")).unwrap();
        assert_eq!(found.data, Bytes::from("value"));
    }

    #[test]
    fn test_set_always_overwrites() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), entry("first"));
        assert_eq!(
            cache.set(Bytes::from("key"), entry("second")),
            MutationOutcome::Stored
        );
        assert_eq!(
            cache.get(&Bytes::from("key")).unwrap().data,
            Bytes::from("second")
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_then_add_keeps_first_value() {
        let cache = CacheEngine::new();

        assert_eq!(
            cache.add(Bytes::from("key"), entry("first")),
            MutationOutcome::Stored
        );
        assert_eq!(
            cache.add(Bytes::from("key"), entry("second")),
            MutationOutcome::NotStored
        );
        assert_eq!(
            cache.get(&Bytes::from("key")).unwrap().data,
            Bytes::from("first")
        );
    }

    #[test]
    fn test_delete_present() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), entry("value"));
        assert_eq!(cache.delete(&Bytes::from("key")), MutationOutcome::Deleted);
        assert!(cache.get(&Bytes::from("key")).is_none());
    }

    #[test]
    fn test_delete_absent_is_idempotent() {
        let cache = CacheEngine::new();

        assert_eq!(cache.delete(&Bytes::from("ghost")), MutationOutcome::NotFound);
        assert_eq!(cache.delete(&Bytes::from("ghost")), MutationOutcome::NotFound);
        assert_eq!(cache.delete(&Bytes::from("ghost")), MutationOutcome::NotFound);
    }

    #[test]
    fn test_add_after_delete() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), entry("value"));
        cache.delete(&Bytes::from("key"));
        assert_eq!(
            cache.add(Bytes::from("key"), entry("again")),
            MutationOutcome::Stored
        );
    }

    #[test]
    fn test_entry_flags_round_trip() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), Entry::new(Bytes::from("v"), 42, 0));
        assert_eq!(cache.get(&Bytes::from("key")).unwrap().flags, 42);
    }

    #[test]
    fn test_negative_exptime_is_already_expired() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), Entry::new(Bytes::from("v"), 0, -1));
        assert!(cache.get(&Bytes::from("key")).is_none());
    }

    #[test]
    fn test_absolute_exptime_in_the_future() {
        let unix_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let e = Entry::new(Bytes::from("v"), 0, unix_now + 3600);
        assert!(!e.is_expired());

        // A timestamp in the past is dead on arrival.
        let e = Entry::new(Bytes::from("v"), 0, EXPTIME_RELATIVE_LIMIT + 1);
        assert!(e.is_expired());
    }

    #[test]
    fn test_add_over_expired_entry_succeeds() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), Entry::new(Bytes::from("old"), 0, -1));
        assert_eq!(
            cache.add(Bytes::from("key"), entry("new")),
            MutationOutcome::Stored
        );
        assert_eq!(
            cache.get(&Bytes::from("key")).unwrap().data,
            Bytes::from("new")
        );
    }

    #[test]
    fn test_delete_expired_entry_reports_not_found() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), Entry::new(Bytes::from("v"), 0, -1));
        assert_eq!(cache.delete(&Bytes::from("key")), MutationOutcome::NotFound);
    }

    #[test]
    fn test_lazy_expiry_reclaims_on_get() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("key"), Entry::new(Bytes::from("v"), 0, -1));
        assert_eq!(cache.len(), 1);

        assert!(cache.get(&Bytes::from("key")).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_reclaim_expired() {
        let cache = CacheEngine::new();

        for i in 0..10 {
            cache.set(
                Bytes::from(format!("dead{}", i)),
                Entry::new(Bytes::from("v"), 0, -1),
            );
        }
        cache.set(Bytes::from("alive"), entry("v"));

        assert_eq!(cache.reclaim_expired(), 10);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&Bytes::from("alive")));
    }

    #[test]
    fn test_stats_counters() {
        let cache = CacheEngine::new();

        cache.set(Bytes::from("a"), entry("1"));
        cache.add(Bytes::from("b"), entry("2"));
        cache.get(&Bytes::from("a"));
        cache.get(&Bytes::from("missing"));
        cache.delete(&Bytes::from("a"));

        let stats = cache.stats();
        assert_eq!(stats.set_ops, 1);
        assert_eq!(stats.add_ops, 1);
        assert_eq!(stats.delete_ops, 1);
        assert_eq!(stats.get_hits, 1);
        assert_eq!(stats.get_misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_concurrent_adds_have_exactly_one_winner() {
        let cache = Arc::new(CacheEngine::new());
        let threads = 16;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.add(
                        Bytes::from("contested"),
                        Entry::new(Bytes::from(format!("writer{}", t)), 0, 0),
                    )
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let stored = outcomes
            .iter()
            .filter(|o| **o == MutationOutcome::Stored)
            .count();
        let not_stored = outcomes
            .iter()
            .filter(|o| **o == MutationOutcome::NotStored)
            .count();

        assert_eq!(stored, 1);
        assert_eq!(not_stored, threads - 1);
        assert!(cache.contains(&Bytes::from("contested")));
    }

    #[test]
    fn test_concurrent_deletes_have_exactly_one_winner() {
        let cache = Arc::new(CacheEngine::new());
        cache.set(Bytes::from("contested"), entry("v"));
        let threads = 16;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.delete(&Bytes::from("contested")))
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let deleted = outcomes
            .iter()
            .filter(|o| **o == MutationOutcome::Deleted)
            .count();

        assert_eq!(deleted, 1);
        assert!(!cache.contains(&Bytes::from("contested")));
    }

    #[test]
    fn test_mutations_on_distinct_keys_do_not_interfere() {
        let cache = Arc::new(CacheEngine::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = Bytes::from(format!("key:{}:{}", t, i));
                        assert_eq!(
                            cache.add(key.clone(), Entry::new(Bytes::from("v"), 0, 0)),
                            MutationOutcome::Stored
                        );
                        assert_eq!(cache.delete(&key), MutationOutcome::Deleted);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.is_empty());
    }
}
