//! Error types for bilist
//!
//! This module defines the error types used throughout bilist. Variants that
//! surface to clients carry their exact reply text, so a dispatcher can
//! forward `Error::to_string()` as the error reply verbatim.

use thiserror::Error;

/// The main error type for bilist operations
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The key exists in the host namespace but holds a different type
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A command was invoked with the wrong number of arguments
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// The TTL argument of `set` did not parse as an integer
    #[error("ERR Invalid expire time")]
    InvalidExpireTime,

    /// The count argument of `ckey` was negative or not an integer
    #[error("ERR invalid count parameter")]
    InvalidCount,

    /// The command name is not registered
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Snapshot data failed framing, bounds, or checksum validation
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Snapshot data was written by an unknown encoding version
    #[error("Unsupported snapshot encoding version {0}")]
    UnsupportedVersion(u8),
}

/// A specialized Result type for bilist operations
pub type Result<T> = std::result::Result<T, Error>;
