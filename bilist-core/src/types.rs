//! Core types used throughout bilist
//!
//! This module contains the fundamental data types shared by the container,
//! the snapshot marshaller, and the command surface.

/// A key in the container, represented as a byte vector
pub type Key = Vec<u8>;

/// A value in the container, represented as a byte vector
pub type Value = Vec<u8>;

/// An absolute wall-clock timestamp in milliseconds
///
/// The sentinel value `0` means "never expires" wherever a timestamp
/// describes an expiration.
pub type TimestampMs = i64;

/// TTL placeholder reported for entries that never expire
pub const TTL_NONE: i64 = -1;

/// One live entry as reported by a full container dump
///
/// `ttl_remaining` is [`TTL_NONE`] for entries without an expiration, and
/// otherwise the remaining lifetime in whole seconds, rounded up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// The first key of the pair
    pub key1: Key,
    /// The second key of the pair
    pub key2: Key,
    /// The stored value
    pub value: Value,
    /// Remaining lifetime in seconds, or [`TTL_NONE`]
    pub ttl_remaining: i64,
}
