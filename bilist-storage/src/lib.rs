//! Storage engine for bilist
//!
//! This crate implements a bi-indexed expiring map with the following
//! components:
//!
//! - **BiMap**: in-memory container indexed by a pair of string keys,
//!   backed by two composite-key skip lists and an insertion ring
//! - **Sweeper**: bounded batches of TTL eviction driven by a host timer,
//!   cooperating with the lazy eviction done on every access
//! - **Snapshot**: a checksummed byte format that persists entries and
//!   the key-synthesis generator state across restarts
//! - **Commands**: the `ckey`/`set`/`get`/`get1`/`get2`/`del`/`count`/`all`
//!   surface over a namespace of host keys
//!
//! # Architecture
//!
//! ```text
//! Write path:
//! dispatch(set ...) → BiMap::set → ring head + primary + secondary index
//!
//! Expiry path:
//! any access   → evict expired entry it touched
//! sweep tick   → batches from the rotating ring cursor
//! ```
//!
//! # Example
//!
//! ```
//! use bilist_storage::BiMap;
//!
//! let mut map = BiMap::new();
//! map.set(b"user:1", b"cart", b"3 items", 120);
//! assert_eq!(map.len(), 1);
//! ```

pub mod bimap;
pub mod clock;
pub mod commands;
pub mod config;
pub mod prng;
pub mod snapshot;

pub use bimap::{BiMap, SkipList};
pub use commands::{Keyspace, Reply, TimerHost};
pub use config::Config;
