//! Snapshot marshalling for containers
//!
//! A snapshot is the sole durable form of a container (there is no
//! operation log). The byte layout, after the `bilist-jt` magic and the
//! encoding version:
//!
//! ```text
//! +------------+-----------+-----------+--------------+
//! | counter    | stride    | items     | prng state   |
//! +------------+-----------+-----------+--------------+
//! | per item, in ring order from the newest entry:    |
//! |   k1, k2, value (length-prefixed), expire_at      |
//! +---------------------------------------------------+
//! ```
//!
//! Loading drops entries that expired while the snapshot was at rest,
//! relinks the survivors in saved order, and indexes every survivor in
//! both skip lists. Index shapes are freshly randomized on load; only the
//! key-synthesis generator state survives, so `ckey` resumes its exact
//! stream across a restart.

mod codec;

use std::rc::Rc;

use log::debug;

use bilist_core::{Error, Result};

use crate::bimap::BiMap;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;

pub use codec::{SnapshotReader, SnapshotWriter};

/// Registered module type name, stored as the snapshot magic
pub const MODULE_TYPE_NAME: &str = "bilist-jt";

/// Current snapshot encoding version
pub const ENCODING_VERSION: u8 = 0;

/// Serializes a container
pub fn save(map: &BiMap) -> Vec<u8> {
    let (counter, stride, prng_state) = map.keygen_state();

    let mut writer = SnapshotWriter::new();
    writer.put_raw(MODULE_TYPE_NAME.as_bytes());
    writer.put_raw(&[ENCODING_VERSION]);

    writer.put_unsigned(u64::from(counter));
    writer.put_unsigned(u64::from(stride));
    writer.put_unsigned(map.len() as u64);
    writer.put_unsigned(prng_state);

    for entry in map.ring() {
        writer.put_bytes(&entry.key1);
        writer.put_bytes(&entry.key2);
        writer.put_bytes(&entry.value);
        writer.put_signed(entry.expire_at);
    }

    writer.finish()
}

/// Rebuilds a container from snapshot bytes, on the system clock
///
/// # Errors
///
/// Returns `Error::Corruption` for framing, bounds, or checksum
/// violations and `Error::UnsupportedVersion` for an unknown encoding
/// version.
pub fn load(data: &[u8]) -> Result<BiMap> {
    load_with(data, Rc::new(SystemClock), Config::default())
}

/// Rebuilds a container from snapshot bytes with an explicit clock and
/// sweep configuration
///
/// Entries whose expiration already passed are dropped. The sweeper is
/// left disarmed; the first mutation arms it.
pub fn load_with(data: &[u8], clock: Rc<dyn Clock>, config: Config) -> Result<BiMap> {
    let mut reader = SnapshotReader::new(data)?;

    let magic = reader.get_raw(MODULE_TYPE_NAME.len())?;
    if magic != MODULE_TYPE_NAME.as_bytes() {
        return Err(Error::Corruption("not a bilist snapshot".to_string()));
    }
    let version = reader.get_raw(1)?[0];
    if version != ENCODING_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let counter = reader.get_unsigned()? as u32;
    let stride = reader.get_unsigned()? as u8;
    let items = reader.get_unsigned()?;
    let prng_state = reader.get_unsigned()?;

    let now = clock.now_ms();
    let mut map = BiMap::with_config(clock, config);
    map.restore_keygen(counter, stride, prng_state);

    let mut tail = None;
    let mut dropped = 0u64;
    for _ in 0..items {
        let key1 = reader.get_bytes()?;
        let key2 = reader.get_bytes()?;
        let value = reader.get_bytes()?;
        let expire_at = reader.get_signed()?;

        if expire_at != 0 && expire_at < now {
            dropped += 1;
            continue;
        }
        tail = Some(map.load_entry(tail, key1, key2, value, expire_at));
    }

    if dropped > 0 {
        debug!(
            "snapshot load dropped {} expired entries, kept {}",
            dropped,
            map.len()
        );
    }
    Ok(map)
}
