//! Integration tests for probes.
//!
//! These tests verify that:
//! - Blocking probes park the streaming thread until removed
//! - Flushing releases a parked thread with `WrongState`
//! - Idle probes fire once the pad stops handing data to its peer
//! - Dropping probes turn a push or pull into a silent success

use padflow::buffer::Buffer;
use padflow::event::Event;
use padflow::flow::{FlowError, FlowSuccess};
use padflow::observability::{TracingConfig, init_tracing};
use padflow::pad::{Pad, PadDirection, ProbeReturn, ProbeType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

fn init() {
    init_tracing(&TracingConfig::test());
}

fn counting_pair() -> (Pad, Pad, Arc<AtomicUsize>) {
    let chained = Arc::new(AtomicUsize::new(0));
    let c = chained.clone();
    let src = Pad::new("src", PadDirection::Src);
    let sink = Pad::builder("sink", PadDirection::Sink)
        .chain_function(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(FlowSuccess::Ok)
        })
        .build();
    src.link(&sink).unwrap();
    src.set_active(true).unwrap();
    sink.set_active(true).unwrap();
    (src, sink, chained)
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_blocking_probe_holds_push_until_removed() {
    init();
    let (src, _sink, chained) = counting_pair();
    let id = src.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);

    let pusher = src.clone();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        tx.send(pusher.push(Buffer::from_static(b"held"))).unwrap();
    });

    wait_until("pad to block", || src.is_blocking());
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(chained.load(Ordering::SeqCst), 0);

    assert!(src.remove_probe(id));
    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
    assert_eq!(result, Ok(FlowSuccess::Ok));
    assert_eq!(chained.load(Ordering::SeqCst), 1);
    assert!(!src.is_blocked());
}

#[test]
fn test_flush_releases_blocked_push() {
    init();
    let (src, _sink, chained) = counting_pair();
    src.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);

    let pusher = src.clone();
    let handle = thread::spawn(move || pusher.push(Buffer::from_static(b"held")));

    wait_until("pad to block", || src.is_blocking());
    // Not forwarded to the peer while blocked.
    assert!(!src.push_event(Event::flush_start()));
    let result = handle.join().unwrap();
    assert_eq!(result, Err(FlowError::WrongState));
    assert_eq!(chained.load(Ordering::SeqCst), 0);
    assert!(!src.is_blocking());
}

#[test]
fn test_deactivation_releases_blocked_push() {
    init();
    let (src, _sink, _chained) = counting_pair();
    src.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);

    let pusher = src.clone();
    let handle = thread::spawn(move || pusher.push(Buffer::from_static(b"held")));

    wait_until("pad to block", || src.is_blocking());
    src.set_active(false).unwrap();
    assert_eq!(handle.join().unwrap(), Err(FlowError::WrongState));
}

#[test]
fn test_blocking_probe_on_sink_released_by_flush_event() {
    init();
    let (src, sink, chained) = counting_pair();
    sink.add_probe(ProbeType::BLOCK_DOWNSTREAM | ProbeType::BUFFER, |_, _| ProbeReturn::Ok);

    let pusher = src.clone();
    let handle = thread::spawn(move || pusher.push(Buffer::from_static(b"held")));

    wait_until("sink to block", || sink.is_blocking());
    assert!(sink.send_event(Event::flush_start()));
    assert_eq!(handle.join().unwrap(), Err(FlowError::WrongState));
    assert_eq!(chained.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pass_lets_data_through_blocking_probe() {
    init();
    let (src, _sink, chained) = counting_pair();
    let id = src.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, info| {
        if info.buffer().is_some_and(|b| b.as_bytes() == b"vip") {
            ProbeReturn::Pass
        } else {
            ProbeReturn::Ok
        }
    });
    assert_eq!(src.push(Buffer::from_static(b"vip")), Ok(FlowSuccess::Ok));
    assert_eq!(chained.load(Ordering::SeqCst), 1);
    src.remove_probe(id);
}

#[test]
fn test_idle_probe_waits_for_push_to_finish() {
    init();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let release_rx = parking_lot::Mutex::new(release_rx);

    let src = Pad::new("src", PadDirection::Src);
    let sink = Pad::builder("sink", PadDirection::Sink)
        .chain_function(move |_, _| {
            entered_tx.send(()).unwrap();
            release_rx.lock().recv().unwrap();
            Ok(FlowSuccess::Ok)
        })
        .build();
    src.link(&sink).unwrap();
    src.set_active(true).unwrap();
    sink.set_active(true).unwrap();

    let pusher = src.clone();
    let handle = thread::spawn(move || pusher.push(Buffer::from_static(b"slow")));
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let idle_calls = Arc::new(AtomicUsize::new(0));
    let ic = idle_calls.clone();
    src.add_probe(ProbeType::IDLE, move |_, info| {
        assert_eq!(info.flow_result, Some(Ok(FlowSuccess::Ok)));
        ic.fetch_add(1, Ordering::SeqCst);
        ProbeReturn::Remove
    });
    assert_eq!(idle_calls.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    assert_eq!(handle.join().unwrap(), Ok(FlowSuccess::Ok));
    assert_eq!(idle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(src.probe_count(), 0);
    assert!(!src.is_blocked());
}

#[test]
fn test_drop_probe_reports_ok() {
    init();
    let (src, _sink, chained) = counting_pair();
    let dropped = Arc::new(AtomicUsize::new(0));
    let d = dropped.clone();
    src.add_probe(ProbeType::BUFFER, move |_, _| {
        d.fetch_add(1, Ordering::SeqCst);
        ProbeReturn::Drop
    });

    let buffer = Buffer::from_static(b"gone");
    let watch = buffer.clone();
    assert_eq!(src.push(buffer), Ok(FlowSuccess::Ok));
    assert_eq!(chained.load(Ordering::SeqCst), 0);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert_eq!(watch.ref_count(), 1);
}

#[test]
fn test_drop_probe_on_pull() {
    init();
    let produced = Arc::new(AtomicUsize::new(0));
    let p = produced.clone();
    let src = Pad::builder("src", PadDirection::Src)
        .getrange_function(move |_, _, _| {
            p.fetch_add(1, Ordering::SeqCst);
            Ok(Buffer::from_static(b"data"))
        })
        .build();
    let sink = Pad::new("sink", PadDirection::Sink);
    src.link(&sink).unwrap();
    sink.activate_pull(true).unwrap();

    let id = sink.add_probe(ProbeType::PULL | ProbeType::BUFFER, |_, info| {
        if info.data.is_some() {
            ProbeReturn::Drop
        } else {
            ProbeReturn::Ok
        }
    });
    assert_eq!(sink.pull_range(0, 4), Ok(None));
    assert_eq!(produced.load(Ordering::SeqCst), 1);

    sink.remove_probe(id);
    let buffer = sink.pull_range(0, 4).unwrap().unwrap();
    assert_eq!(buffer.as_bytes(), b"data");
}

#[test]
fn test_probe_removed_from_callback() {
    init();
    let (src, _sink, chained) = counting_pair();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    src.add_probe(ProbeType::BUFFER, move |_, _| {
        c.fetch_add(1, Ordering::SeqCst);
        ProbeReturn::Remove
    });
    src.push(Buffer::from_static(b"1")).unwrap();
    src.push(Buffer::from_static(b"2")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(chained.load(Ordering::SeqCst), 2);
    assert_eq!(src.probe_count(), 0);
}
