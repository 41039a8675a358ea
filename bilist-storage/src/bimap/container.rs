//! The bi-indexed container
//!
//! Entries are owned by a slot arena and woven into three structures at
//! once: the insertion ring (`prev`/`next` ids, newest first) and the two
//! skip-list indices. Every mutation keeps all three in step; the sweep
//! cursor is re-pointed whenever its target is unlinked.

use std::rc::Rc;

use log::debug;

use bilist_core::{EntryRecord, Key, TimestampMs, Value, TTL_NONE};

use super::skiplist::SkipList;
use super::EntryId;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::prng::Prng;

/// Exclusive upper bound for the counter stride drawn at creation
const MAX_COUNTER_INCREMENT: u32 = 0x4C;

/// Synthesized-key alphabet; the order is an on-the-wire format
const KEY_CHARS: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";

/// One stored record, linked into the ring by entry id
pub(crate) struct Entry {
    pub(crate) key1: Key,
    pub(crate) key2: Key,
    pub(crate) value: Value,
    /// Absolute expiration in milliseconds; 0 = never
    pub(crate) expire_at: TimestampMs,
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

impl Entry {
    fn is_expired(&self, now: TimestampMs) -> bool {
        self.expire_at != 0 && self.expire_at < now
    }
}

/// An in-memory map indexed by a pair of byte-string keys
///
/// Lookup works in both directions: exact `(k1, k2)` retrieval, and range
/// retrieval of every entry sharing either key position. Entries may carry
/// a TTL; expired entries are evicted lazily on access and in batches by
/// [`BiMap::sweep_tick`].
///
/// The container is single-threaded: the host serializes commands and
/// timer callbacks, and every operation runs to completion.
///
/// # Example
///
/// ```
/// use bilist_storage::BiMap;
///
/// let mut map = BiMap::new();
/// map.set(b"user:1", b"laptop", b"online", 0);
/// map.set(b"user:1", b"phone", b"idle", 0);
///
/// assert_eq!(map.get(b"user:1", b"phone"), Some(b"idle".to_vec()));
/// assert_eq!(map.scan_by_primary(b"user:1").len(), 2);
/// assert_eq!(map.scan_by_secondary(b"phone").len(), 1);
/// ```
pub struct BiMap {
    /// Index keyed `(k1, k2)`
    primary: SkipList,
    /// Index keyed `(k2, k1)`
    secondary: SkipList,

    entries: Vec<Option<Entry>>,
    free: Vec<EntryId>,
    /// Newest entry in the ring
    head: Option<EntryId>,
    /// Next ring slot the sweeper will inspect
    sweep_cursor: Option<EntryId>,
    len: usize,

    /// Key-synthesis state; persisted
    counter: u32,
    stride: u8,
    prng: Prng,

    timer_armed: bool,
    config: Config,
    clock: Rc<dyn Clock>,
}

impl BiMap {
    /// Creates an empty container on the system clock
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    /// Creates an empty container on the given clock
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self::with_config(clock, Config::default())
    }

    /// Creates an empty container with explicit sweep tunables
    ///
    /// All generator streams are seeded from the clock. The key-synthesis
    /// counter starts at a random draw and advances by a random stride in
    /// `1..=0x4C`.
    pub fn with_config(clock: Rc<dyn Clock>, config: Config) -> Self {
        let seed = clock.now_ms() as u64;
        let mut prng = Prng::new(seed);
        let counter = prng.next32();
        let stride = (prng.next32() % MAX_COUNTER_INCREMENT).max(1) as u8;

        Self {
            primary: SkipList::new(seed),
            secondary: SkipList::new(seed),
            entries: Vec::new(),
            free: Vec::new(),
            head: None,
            sweep_cursor: None,
            len: 0,
            counter,
            stride,
            prng,
            timer_armed: false,
            config,
            clock,
        }
    }

    /// Returns the live entry count
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the container holds no entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the sweep tunables this container runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn entry(&self, id: EntryId) -> &Entry {
        self.entries[id].as_ref().expect("vacant entry slot")
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        self.entries[id].as_mut().expect("vacant entry slot")
    }

    fn alloc_entry(&mut self, entry: Entry) -> EntryId {
        match self.free.pop() {
            Some(id) => {
                self.entries[id] = Some(entry);
                id
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        }
    }

    fn link_front(&mut self, id: EntryId) {
        match self.head {
            Some(head) => {
                self.entry_mut(head).prev = Some(id);
                self.entry_mut(id).next = Some(head);
            }
            None => self.sweep_cursor = Some(id),
        }
        self.head = Some(id);
    }

    /// Detaches an entry from the ring and returns it
    ///
    /// The sweep cursor is moved off the victim: to the successor when one
    /// exists, otherwise back to the (already updated) head.
    fn unlink(&mut self, id: EntryId) -> Entry {
        let entry = self.entries[id].take().expect("vacant entry slot");
        if let Some(prev) = entry.prev {
            self.entry_mut(prev).next = entry.next;
        }
        if let Some(next) = entry.next {
            self.entry_mut(next).prev = entry.prev;
        }
        if self.head == Some(id) {
            self.head = entry.next;
        }
        if self.sweep_cursor == Some(id) {
            self.sweep_cursor = entry.next.or(self.head);
        }
        self.free.push(id);
        self.len -= 1;
        entry
    }

    /// Removes an entry from both indices and the ring and destroys it
    fn evict(&mut self, id: EntryId) {
        let entry = self.unlink(id);
        self.primary.remove(&entry.key1, &entry.key2);
        self.secondary.remove(&entry.key2, &entry.key1);
    }

    /// Stores a value under the pair `(key1, key2)`
    ///
    /// `ttl_seconds == 0` means the entry never expires; otherwise the
    /// entry expires `ttl_seconds` from now. Any previous entry under the
    /// same pair is evicted before the new one is linked, so the net count
    /// does not change on replacement.
    pub fn set(&mut self, key1: &[u8], key2: &[u8], value: &[u8], ttl_seconds: i64) {
        let now = self.clock.now_ms();

        if let Some(old) = self.primary.find(key1, key2) {
            self.evict(old);
        }

        let expire_at = if ttl_seconds == 0 {
            0
        } else {
            now.saturating_add(ttl_seconds.saturating_mul(1000))
        };

        let id = self.alloc_entry(Entry {
            key1: key1.to_vec(),
            key2: key2.to_vec(),
            value: value.to_vec(),
            expire_at,
            prev: None,
            next: None,
        });
        self.link_front(id);
        self.primary.insert(key1, key2, id);
        self.secondary.insert(key2, key1, id);
        self.len += 1;
    }

    /// Returns the value stored under the exact pair `(key1, key2)`
    ///
    /// An expired entry is evicted and reported as missing.
    pub fn get(&mut self, key1: &[u8], key2: &[u8]) -> Option<Value> {
        let now = self.clock.now_ms();
        let id = self.primary.find(key1, key2)?;
        if self.entry(id).is_expired(now) {
            self.evict(id);
            return None;
        }
        Some(self.entry(id).value.clone())
    }

    /// Returns `(k2, value)` for every live entry whose first key is
    /// `key1`, ascending by `k2`
    ///
    /// Expired entries encountered along the way are evicted.
    pub fn scan_by_primary(&mut self, key1: &[u8]) -> Vec<(Key, Value)> {
        let now = self.clock.now_ms();
        let ids = self.primary.collect_class(key1);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if self.entry(id).is_expired(now) {
                self.evict(id);
            } else {
                let entry = self.entry(id);
                out.push((entry.key2.clone(), entry.value.clone()));
            }
        }
        out
    }

    /// Returns `(k1, value)` for every live entry whose second key is
    /// `key2`, ascending by `k1`
    pub fn scan_by_secondary(&mut self, key2: &[u8]) -> Vec<(Key, Value)> {
        let now = self.clock.now_ms();
        let ids = self.secondary.collect_class(key2);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if self.entry(id).is_expired(now) {
                self.evict(id);
            } else {
                let entry = self.entry(id);
                out.push((entry.key1.clone(), entry.value.clone()));
            }
        }
        out
    }

    /// Deletes the pair `(key1, key2)`, returning whether it was present
    ///
    /// Expiration is not consulted: a present-but-expired entry still
    /// reports as deleted.
    pub fn remove(&mut self, key1: &[u8], key2: &[u8]) -> bool {
        match self.primary.remove(key1, key2) {
            Some(id) => {
                self.secondary.remove(key2, key1);
                self.unlink(id);
                true
            }
            None => false,
        }
    }

    /// Dumps every live entry in ring order (most recently inserted first)
    ///
    /// Expired entries are evicted during the walk. `ttl_remaining` is the
    /// remaining lifetime in whole seconds rounded up, or [`TTL_NONE`] for
    /// entries without an expiration.
    pub fn entries(&mut self) -> Vec<EntryRecord> {
        let now = self.clock.now_ms();

        let mut ids = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(id) = cur {
            ids.push(id);
            cur = self.entry(id).next;
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if self.entry(id).is_expired(now) {
                self.evict(id);
                continue;
            }
            let entry = self.entry(id);
            let ttl_remaining = if entry.expire_at == 0 {
                TTL_NONE
            } else {
                (entry.expire_at - now + 999) / 1000
            };
            out.push(EntryRecord {
                key1: entry.key1.clone(),
                key2: entry.key2.clone(),
                value: entry.value.clone(),
                ttl_remaining,
            });
        }
        out
    }

    /// Synthesizes a fresh identifier: `count` random alphabet characters
    /// followed by the counter as eight lowercase hex digits
    ///
    /// Afterwards the counter advances by a draw in `1..=stride`, so
    /// consecutive identifiers are distinct but not sequential.
    pub fn ckey(&mut self, count: usize) -> String {
        let mut out = String::with_capacity(count + 8);
        for _ in 0..count {
            let idx = (self.prng.next() % KEY_CHARS.len() as u64) as usize;
            out.push(KEY_CHARS[idx] as char);
        }
        out.push_str(&format!("{:08x}", self.counter));

        let step = (self.prng.next() % u64::from(self.stride)) as u32 + 1;
        self.counter = self.counter.wrapping_add(step);
        out
    }

    /// Approximates the memory consumed by the container, its entries,
    /// and both indices, in bytes
    pub fn memory_usage(&self) -> usize {
        let mut bytes = std::mem::size_of::<Self>();
        for entry in self.ring() {
            bytes += std::mem::size_of::<Entry>()
                + entry.key1.len()
                + entry.key2.len()
                + entry.value.len();
        }
        bytes + self.primary.approximate_bytes() + self.secondary.approximate_bytes()
    }

    /// Marks the sweeper as scheduled, returning `true` if it was not
    ///
    /// The caller owns the actual timer; a `true` return means a tick must
    /// be scheduled `config.sweep_period` from now.
    pub fn arm_sweeper(&mut self) -> bool {
        !std::mem::replace(&mut self.timer_armed, true)
    }

    /// Returns whether a sweep tick is currently scheduled
    pub fn sweeper_armed(&self) -> bool {
        self.timer_armed
    }

    /// Runs one sweep tick, returning the number of entries evicted
    ///
    /// Batches of `config.sweep_batch` ring slots are inspected from the
    /// sweep cursor; the tick keeps batching while a batch evicts more
    /// than `config.sweep_threshold` entries, amortizing expiry bursts.
    /// Running off the tail resets the cursor to the ring head.
    pub fn sweep_tick(&mut self) -> usize {
        let mut total = 0;
        loop {
            let pruned = self.sweep_batch();
            total += pruned;
            if pruned <= self.config.sweep_threshold {
                break;
            }
        }
        if total > 0 {
            debug!("sweep evicted {} expired entries, {} remain", total, self.len);
        }
        total
    }

    fn sweep_batch(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut cur = self.sweep_cursor;
        let mut pruned = 0;
        for _ in 0..self.config.sweep_batch {
            let id = match cur {
                Some(id) => id,
                None => {
                    self.sweep_cursor = self.head;
                    return pruned;
                }
            };
            let next = self.entry(id).next;
            if self.entry(id).is_expired(now) {
                self.evict(id);
                pruned += 1;
            }
            cur = next;
        }
        self.sweep_cursor = cur;
        pruned
    }

    // Snapshot support. The marshaller reads the key-synthesis state and
    // the ring, and rebuilds a container by appending survivors in saved
    // order; see the snapshot module for the byte format.

    pub(crate) fn keygen_state(&self) -> (u32, u8, u64) {
        (self.counter, self.stride, self.prng.state())
    }

    pub(crate) fn restore_keygen(&mut self, counter: u32, stride: u8, prng_state: u64) {
        self.counter = counter;
        self.stride = stride.max(1);
        self.prng.restore(prng_state);
    }

    pub(crate) fn ring(&self) -> RingIter<'_> {
        RingIter {
            map: self,
            cur: self.head,
        }
    }

    /// Appends a reloaded entry after `after` (`None` = becomes the head)
    /// and indexes it, returning its id for the next append
    pub(crate) fn load_entry(
        &mut self,
        after: Option<EntryId>,
        key1: &[u8],
        key2: &[u8],
        value: &[u8],
        expire_at: TimestampMs,
    ) -> EntryId {
        let id = self.alloc_entry(Entry {
            key1: key1.to_vec(),
            key2: key2.to_vec(),
            value: value.to_vec(),
            expire_at,
            prev: after,
            next: None,
        });
        match after {
            Some(prev) => self.entry_mut(prev).next = Some(id),
            None => {
                self.head = Some(id);
                self.sweep_cursor = Some(id);
            }
        }
        self.primary.insert(key1, key2, id);
        self.secondary.insert(key2, key1, id);
        self.len += 1;
        id
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut ring_len = 0;
        let mut prev = None;
        let mut cur = self.head;
        while let Some(id) = cur {
            let entry = self.entry(id);
            assert_eq!(entry.prev, prev, "ring back-link mismatch");
            assert_eq!(self.primary.find(&entry.key1, &entry.key2), Some(id));
            assert_eq!(self.secondary.find(&entry.key2, &entry.key1), Some(id));
            ring_len += 1;
            prev = cur;
            cur = entry.next;
        }
        assert_eq!(ring_len, self.len, "ring length != count");
        assert_eq!(self.primary.len(), self.len, "primary index count");
        assert_eq!(self.secondary.len(), self.len, "secondary index count");
        if let Some(cursor) = self.sweep_cursor {
            assert!(
                self.entries[cursor].is_some(),
                "sweep cursor points at a vacant slot"
            );
        }
    }
}

impl Default for BiMap {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct RingIter<'a> {
    map: &'a BiMap,
    cur: Option<EntryId>,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let entry = self.map.entry(id);
        self.cur = entry.next;
        Some(entry)
    }
}
