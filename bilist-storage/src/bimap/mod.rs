//! Bi-indexed in-memory storage
//!
//! A [`BiMap`] stores `(k1, k2) -> value` entries with optional TTLs and
//! answers lookups from either direction:
//!
//! - exact: the pair `(k1, k2)`
//! - by first key: every entry whose `k1` matches, ordered by `k2`
//! - by second key: every entry whose `k2` matches, ordered by `k1`
//!
//! Internally one entry is shared by three structures: two composite-key
//! [`SkipList`] indices (keyed `(k1, k2)` and `(k2, k1)`) and a
//! doubly-linked ring in reverse insertion order. Entries live in an arena
//! and the structures reference them by [`EntryId`], so unlinking an entry
//! clears three ids and returns a slot, with no dangling references to
//! reason about.
//!
//! # Example
//!
//! ```
//! use bilist_storage::BiMap;
//!
//! let mut map = BiMap::new();
//! map.set(b"order:7", b"eu-west", b"pending", 0);
//!
//! let per_region = map.scan_by_secondary(b"eu-west");
//! assert_eq!(per_region[0].0, b"order:7");
//! ```

mod container;
mod skiplist;

/// Arena slot of an entry; stable for the entry's lifetime
pub type EntryId = usize;

pub use container::BiMap;
pub use skiplist::{SkipList, S_HEIGHT};
