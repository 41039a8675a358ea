//! End-to-end scenarios through the command dispatcher

use std::rc::Rc;
use std::time::Duration;

use bilist_storage::clock::ManualClock;
use bilist_storage::{Keyspace, Reply, TimerHost};

#[derive(Default)]
struct RecordingTimer {
    scheduled: Vec<(Vec<u8>, Duration)>,
}

impl TimerHost for RecordingTimer {
    fn schedule(&mut self, key: &[u8], after: Duration) {
        self.scheduled.push((key.to_vec(), after));
    }
}

fn keyspace() -> (Keyspace, ManualClock, RecordingTimer) {
    // Surfaces sweep/load debug records under RUST_LOG.
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = ManualClock::new(1_000_000);
    let ks = Keyspace::with_clock(Rc::new(clock.clone()));
    (ks, clock, RecordingTimer::default())
}

fn bulk(data: &[u8]) -> Reply {
    Reply::Bulk(data.to_vec())
}

fn pair(a: &[u8], b: &[u8]) -> Reply {
    Reply::Array(vec![bulk(a), bulk(b)])
}

#[test]
fn set_get_del_lifecycle() {
    let (mut ks, _clock, mut timers) = keyspace();

    assert_eq!(
        ks.dispatch(&[b"set", b"C", b"a", b"b", b"v1", b"0"], &mut timers),
        Reply::Simple("OK".into())
    );
    assert_eq!(
        ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers),
        bulk(b"v1")
    );
    assert_eq!(ks.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(1));
    assert_eq!(
        ks.dispatch(&[b"del", b"C", b"a", b"b"], &mut timers),
        Reply::Int(1)
    );
    assert_eq!(
        ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers),
        Reply::Nil
    );
    assert_eq!(ks.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(0));
    assert_eq!(
        ks.dispatch(&[b"del", b"C", b"a", b"b"], &mut timers),
        Reply::Int(0)
    );
}

#[test]
fn set_replaces_value_under_same_pair() {
    let (mut ks, _clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"b", b"v1", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"a", b"b", b"v2", b"0"], &mut timers);

    assert_eq!(ks.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(1));
    assert_eq!(
        ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers),
        bulk(b"v2")
    );
}

#[test]
fn range_queries_in_both_directions() {
    let (mut ks, _clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"x", b"v1", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"a", b"y", b"v2", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"b", b"x", b"v3", b"0"], &mut timers);

    assert_eq!(
        ks.dispatch(&[b"get1", b"C", b"a"], &mut timers),
        Reply::Array(vec![pair(b"x", b"v1"), pair(b"y", b"v2")])
    );
    assert_eq!(
        ks.dispatch(&[b"get2", b"C", b"x"], &mut timers),
        Reply::Array(vec![pair(b"a", b"v1"), pair(b"b", b"v3")])
    );
    assert_eq!(
        ks.dispatch(&[b"get1", b"C", b"nope"], &mut timers),
        Reply::Array(vec![])
    );
}

#[test]
fn ttl_expiry_is_observed_on_access() {
    let (mut ks, clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"b", b"v", b"1"], &mut timers);
    assert_eq!(
        ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers),
        bulk(b"v")
    );

    clock.advance(1_100);
    assert_eq!(
        ks.dispatch(&[b"get", b"C", b"a", b"b"], &mut timers),
        Reply::Nil
    );
    assert_eq!(ks.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(0));
}

#[test]
fn sweeper_evicts_in_the_background() {
    let (mut ks, clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"x", b"v", b"1"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"b", b"x", b"v", b"1"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"c", b"x", b"v", b"0"], &mut timers);
    assert_eq!(timers.scheduled.len(), 1);

    clock.advance(5_000);
    // Deliver due ticks the way a host loop would, until the cursor has
    // visited the whole ring.
    for _ in 0..4 {
        ks.sweep_tick(b"C", &mut timers);
    }

    // No accesses happened, yet only the non-expiring entry remains.
    assert_eq!(ks.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(1));
    assert_eq!(
        ks.dispatch(&[b"all", b"C"], &mut timers),
        Reply::Array(vec![Reply::Array(vec![
            bulk(b"c"),
            bulk(b"x"),
            bulk(b"v"),
            Reply::Int(-1),
        ])])
    );
    // Every delivered tick re-armed itself.
    assert_eq!(timers.scheduled.len(), 5);
}

#[test]
fn all_reports_ring_order_and_ttls() {
    let (mut ks, _clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"x", b"v1", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"b", b"y", b"v2", b"30"], &mut timers);

    assert_eq!(
        ks.dispatch(&[b"all", b"C"], &mut timers),
        Reply::Array(vec![
            Reply::Array(vec![bulk(b"b"), bulk(b"y"), bulk(b"v2"), Reply::Int(30)]),
            Reply::Array(vec![bulk(b"a"), bulk(b"x"), bulk(b"v1"), Reply::Int(-1)]),
        ])
    );
}

#[test]
fn ckey_shape_and_snapshot_determinism() {
    let (mut ks, _clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"b", b"v", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"c", b"d", b"w", b"0"], &mut timers);

    // Snapshot now, so the restored container replays the same generator
    // stream the live one is about to consume.
    let snapshot = ks.snapshot(b"C").unwrap();

    let live = match ks.dispatch(&[b"ckey", b"C", b"4"], &mut timers) {
        Reply::Simple(key) => key,
        other => panic!("expected simple string, got {other:?}"),
    };
    assert_eq!(live.len(), 12);

    let mut restored = Keyspace::with_clock(Rc::new(ManualClock::new(1_000_000)));
    restored.restore(b"C", &snapshot).unwrap();
    let replayed = match restored.dispatch(&[b"ckey", b"C", b"4"], &mut timers) {
        Reply::Simple(key) => key,
        other => panic!("expected simple string, got {other:?}"),
    };
    assert_eq!(live, replayed);
}

#[test]
fn snapshot_round_trip_preserves_queries() {
    let (mut ks, clock, mut timers) = keyspace();

    ks.dispatch(&[b"set", b"C", b"a", b"x", b"v1", b"60"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"a", b"y", b"v2", b"0"], &mut timers);
    ks.dispatch(&[b"set", b"C", b"b", b"x", b"v3", b"0"], &mut timers);

    let snapshot = ks.snapshot(b"C").unwrap();
    let before = ks.dispatch(&[b"get1", b"C", b"a"], &mut timers);

    let mut restored = Keyspace::with_clock(Rc::new(clock.clone()));
    restored.restore(b"C", &snapshot).unwrap();

    assert_eq!(
        restored.dispatch(&[b"count", b"C"], &mut timers),
        Reply::Int(3)
    );
    assert_eq!(
        restored.dispatch(&[b"get1", b"C", b"a"], &mut timers),
        before
    );

    // Reload after the short TTL has lapsed: the expired entry is dropped.
    clock.advance(120_000);
    let mut late = Keyspace::with_clock(Rc::new(clock.clone()));
    late.restore(b"C", &snapshot).unwrap();
    assert_eq!(late.dispatch(&[b"count", b"C"], &mut timers), Reply::Int(2));
    assert_eq!(
        late.dispatch(&[b"get", b"C", b"a", b"x"], &mut timers),
        Reply::Nil
    );
}

#[test]
fn restored_sweeper_arms_on_next_mutation() {
    let (mut ks, _clock, mut timers) = keyspace();
    ks.dispatch(&[b"set", b"C", b"a", b"b", b"v", b"0"], &mut timers);
    let snapshot = ks.snapshot(b"C").unwrap();

    let mut restored = Keyspace::with_clock(Rc::new(ManualClock::new(1_000_000)));
    let mut fresh_timers = RecordingTimer::default();
    restored.restore(b"C", &snapshot).unwrap();
    assert!(fresh_timers.scheduled.is_empty());

    restored.dispatch(&[b"set", b"C", b"c", b"d", b"v", b"0"], &mut fresh_timers);
    assert_eq!(fresh_timers.scheduled.len(), 1);
}
