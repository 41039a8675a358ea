//! Command surface and host-namespace shim
//!
//! The host event loop hands [`Keyspace::dispatch`] a parsed argument
//! vector and forwards the returned [`Reply`] to the client. Checks run in
//! a fixed order: arity, then key resolution (which materializes an
//! unbound key and rejects one of another type), then numeric argument
//! parsing. A failing command leaves behind at most the materialized
//! empty container, never an entry.
//!
//! Timers stay on the host side of the seam: when a `set` arms a
//! container's sweeper, the dispatcher asks the [`TimerHost`] to schedule
//! a tick, and every delivered tick re-arms itself the same way.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use log::trace;

use bilist_core::{Error, Result};

use crate::bimap::BiMap;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::snapshot;

/// Host key whose plain counter is bumped by every successful `set`
const GUARDIAN_KEY: &[u8] = b"::bilist-guardian::";

/// A reply value as the host wire layer understands it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A status line, e.g. `OK`
    Simple(String),
    /// A binary-safe string
    Bulk(Vec<u8>),
    /// A signed integer
    Int(i64),
    /// A nested array
    Array(Vec<Reply>),
    /// The null reply
    Nil,
    /// An error line, sent verbatim
    Error(String),
}

/// The host's timer primitive
///
/// `schedule(key, after)` must deliver a [`Keyspace::sweep_tick`] for
/// `key` once `after` has elapsed, unless the keyspace was dropped first.
pub trait TimerHost {
    /// Schedules a single sweep tick for `key`
    fn schedule(&mut self, key: &[u8], after: Duration);
}

/// What a host key is currently bound to
enum Binding {
    Container(BiMap),
    Counter(i64),
}

/// A namespace of host keys and the command dispatcher over it
///
/// Any command addressing an unbound key materializes an empty container
/// there; a key bound to another type fails with the wrong-type error
/// instead.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bilist_storage::{Keyspace, Reply, TimerHost};
///
/// struct NoTimers;
/// impl TimerHost for NoTimers {
///     fn schedule(&mut self, _key: &[u8], _after: Duration) {}
/// }
///
/// let mut ks = Keyspace::new();
/// let mut timers = NoTimers;
///
/// let reply = ks.dispatch(&[b"set", b"C", b"a", b"b", b"v", b"0"], &mut timers);
/// assert_eq!(reply, Reply::Simple("OK".into()));
///
/// let reply = ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers);
/// assert_eq!(reply, Reply::Bulk(b"v".to_vec()));
/// ```
pub struct Keyspace {
    bindings: HashMap<Vec<u8>, Binding>,
    clock: Rc<dyn Clock>,
    config: Config,
}

impl Keyspace {
    /// Creates an empty keyspace on the system clock
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    /// Creates an empty keyspace on the given clock
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self::with_config(clock, Config::default())
    }

    /// Creates an empty keyspace; new containers inherit `config`
    pub fn with_config(clock: Rc<dyn Clock>, config: Config) -> Self {
        Self {
            bindings: HashMap::new(),
            clock,
            config,
        }
    }

    /// Executes one command, turning errors into error replies
    pub fn dispatch(&mut self, argv: &[&[u8]], timers: &mut dyn TimerHost) -> Reply {
        match self.run(argv, timers) {
            Ok(reply) => reply,
            Err(err) => Reply::Error(err.to_string()),
        }
    }

    fn run(&mut self, argv: &[&[u8]], timers: &mut dyn TimerHost) -> Result<Reply> {
        let name = argv
            .first()
            .ok_or_else(|| Error::UnknownCommand(String::new()))?;
        let name = String::from_utf8_lossy(name).to_ascii_lowercase();

        match name.as_str() {
            "ckey" => self.cmd_ckey(argv),
            "set" => self.cmd_set(argv, timers),
            "get" => self.cmd_get(argv),
            "get1" => self.cmd_get1(argv),
            "get2" => self.cmd_get2(argv),
            "del" => self.cmd_del(argv),
            "count" => self.cmd_count(argv),
            "all" => self.cmd_all(argv),
            _ => Err(Error::UnknownCommand(name)),
        }
    }

    /// Delivers a due sweep tick for `key` and re-arms it
    ///
    /// A key that no longer holds a container lets its tick chain lapse.
    pub fn sweep_tick(&mut self, key: &[u8], timers: &mut dyn TimerHost) {
        if let Some(Binding::Container(map)) = self.bindings.get_mut(key) {
            let evicted = map.sweep_tick();
            trace!("sweep tick on {:?}: {} evicted", key, evicted);
            timers.schedule(key, map.config().sweep_period);
        }
    }

    /// Serializes the container at `key`, if the key holds one
    pub fn snapshot(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.bindings.get(key)? {
            Binding::Container(map) => Some(snapshot::save(map)),
            Binding::Counter(_) => None,
        }
    }

    /// Rebuilds the container at `key` from snapshot bytes
    ///
    /// The reloaded sweeper is disarmed until the next `set`.
    pub fn restore(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        let map = snapshot::load_with(data, self.clock.clone(), self.config.clone())?;
        self.bindings.insert(key.to_vec(), Binding::Container(map));
        Ok(())
    }

    /// Returns the plain counter bound to `key`, if any
    pub fn counter(&self, key: &[u8]) -> Option<i64> {
        match self.bindings.get(key)? {
            Binding::Counter(n) => Some(*n),
            Binding::Container(_) => None,
        }
    }

    /// Resolves `key` to its container, creating an empty one on an
    /// unbound key
    fn container_mut(&mut self, key: &[u8]) -> Result<&mut BiMap> {
        let clock = self.clock.clone();
        let config = self.config.clone();
        let binding = self
            .bindings
            .entry(key.to_vec())
            .or_insert_with(|| Binding::Container(BiMap::with_config(clock, config)));
        match binding {
            Binding::Container(map) => Ok(map),
            Binding::Counter(_) => Err(Error::WrongType),
        }
    }

    fn bump_guardian(&mut self) {
        let binding = self
            .bindings
            .entry(GUARDIAN_KEY.to_vec())
            .or_insert(Binding::Counter(0));
        if let Binding::Counter(n) = binding {
            *n += 1;
        }
    }

    fn cmd_ckey(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 3 {
            return Err(Error::WrongArity("ckey".into()));
        }
        // Key resolution outranks argument validation: a wrong-type key
        // reports as such even when the count is also malformed.
        let map = self.container_mut(argv[1])?;
        let count = parse_i64(argv[2])
            .filter(|count| *count >= 0)
            .ok_or(Error::InvalidCount)?;

        Ok(Reply::Simple(map.ckey(count as usize)))
    }

    fn cmd_set(&mut self, argv: &[&[u8]], timers: &mut dyn TimerHost) -> Result<Reply> {
        if argv.len() != 6 {
            return Err(Error::WrongArity("set".into()));
        }
        let key = argv[1];
        let map = self.container_mut(key)?;
        let ttl = parse_i64(argv[5]).ok_or(Error::InvalidExpireTime)?;

        map.set(argv[2], argv[3], argv[4], ttl);
        if map.arm_sweeper() {
            let period = map.config().sweep_period;
            timers.schedule(key, period);
        }

        self.bump_guardian();
        Ok(Reply::Simple("OK".into()))
    }

    fn cmd_get(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 4 {
            return Err(Error::WrongArity("get".into()));
        }
        let map = self.container_mut(argv[1])?;
        Ok(match map.get(argv[2], argv[3]) {
            Some(value) => Reply::Bulk(value),
            None => Reply::Nil,
        })
    }

    fn cmd_get1(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 3 {
            return Err(Error::WrongArity("get1".into()));
        }
        let map = self.container_mut(argv[1])?;
        Ok(pair_array(map.scan_by_primary(argv[2])))
    }

    fn cmd_get2(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 3 {
            return Err(Error::WrongArity("get2".into()));
        }
        let map = self.container_mut(argv[1])?;
        Ok(pair_array(map.scan_by_secondary(argv[2])))
    }

    fn cmd_del(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 4 {
            return Err(Error::WrongArity("del".into()));
        }
        let map = self.container_mut(argv[1])?;
        Ok(Reply::Int(i64::from(map.remove(argv[2], argv[3]))))
    }

    fn cmd_count(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 2 {
            return Err(Error::WrongArity("count".into()));
        }
        let map = self.container_mut(argv[1])?;
        Ok(Reply::Int(map.len() as i64))
    }

    fn cmd_all(&mut self, argv: &[&[u8]]) -> Result<Reply> {
        if argv.len() != 2 {
            return Err(Error::WrongArity("all".into()));
        }
        let map = self.container_mut(argv[1])?;
        let rows = map
            .entries()
            .into_iter()
            .map(|record| {
                Reply::Array(vec![
                    Reply::Bulk(record.key1),
                    Reply::Bulk(record.key2),
                    Reply::Bulk(record.value),
                    Reply::Int(record.ttl_remaining),
                ])
            })
            .collect();
        Ok(Reply::Array(rows))
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

fn pair_array(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Reply {
    Reply::Array(
        pairs
            .into_iter()
            .map(|(key, value)| Reply::Array(vec![Reply::Bulk(key), Reply::Bulk(value)]))
            .collect(),
    )
}

/// Strict integer parse: the whole argument, no surrounding whitespace
fn parse_i64(data: &[u8]) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse().ok()
}
