//! Core types and errors for bilist
//!
//! This crate contains the fundamental types and error handling used
//! throughout the bilist project. It provides:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - Basic data types like [`Key`], [`Value`], and [`EntryRecord`]
//!
//! # Example
//!
//! ```
//! use bilist_core::{Key, Value};
//!
//! let key1: Key = b"user:123".to_vec();
//! let key2: Key = b"session:9".to_vec();
//! let value: Value = b"active".to_vec();
//! # let _ = (key1, key2, value);
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
