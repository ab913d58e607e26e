//! Integration tests for event propagation and the sticky event cache.
//!
//! These tests verify that:
//! - Sticky events reach the sink before the data that follows them
//! - Refused caps stay pending and fail the next push with `NotNegotiated`
//! - Offset changes re-queue the segment with the summed offsets
//! - Flushing pads discard events until flush-stop

use padflow::buffer::Buffer;
use padflow::caps::Caps;
use padflow::event::{Event, EventType, Segment, TagList};
use padflow::flow::{FlowError, FlowSuccess};
use padflow::observability::{TracingConfig, init_tracing};
use padflow::pad::{Pad, PadDirection, PadFlags, PadTemplate};
use parking_lot::Mutex;
use std::sync::Arc;

fn init() {
    init_tracing(&TracingConfig::test());
}

type Log = Arc<Mutex<Vec<String>>>;

/// Sink logging events and buffers in arrival order.
fn logging_sink(template: Option<Arc<PadTemplate>>) -> (Pad, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (events, buffers) = (log.clone(), log.clone());
    let builder = match template {
        Some(template) => Pad::builder_from_template(template, "sink"),
        None => Pad::builder("sink", PadDirection::Sink),
    };
    let pad = builder
        .event_function(move |_, event| {
            events.lock().push(event.event_type().name().to_string());
            true
        })
        .chain_function(move |_, buffer| {
            buffers.lock().push(format!("buffer:{}", buffer.len()));
            Ok(FlowSuccess::Ok)
        })
        .build();
    (pad, log)
}

fn linked(template: Option<Arc<PadTemplate>>) -> (Pad, Pad, Log) {
    let src = Pad::new("src", PadDirection::Src);
    let (sink, log) = logging_sink(template);
    src.link(&sink).unwrap();
    src.set_active(true).unwrap();
    sink.set_active(true).unwrap();
    (src, sink, log)
}

#[test]
fn test_events_precede_buffers() {
    init();
    let (src, sink, log) = linked(None);
    assert!(src.push_event(Event::stream_start("s")));
    assert!(src.set_caps(Caps::new("audio/x-raw")));
    assert!(src.push_event(Event::segment(Segment::new_time(0, None))));
    assert_eq!(src.push(Buffer::from_static(b"abc")), Ok(FlowSuccess::Ok));
    assert!(src.push_event(Event::eos()));

    let stream_start = EventType::StreamStart.name();
    let caps = EventType::Caps.name();
    let segment = EventType::Segment.name();
    let eos = EventType::Eos.name();
    assert_eq!(
        *log.lock(),
        vec![stream_start, caps, segment, "buffer:3", eos]
    );
    assert!(sink.sticky_event(EventType::Eos).is_some());
}

#[test]
fn test_sticky_replay_after_reactivation() {
    init();
    let (src, sink, log) = linked(None);
    src.push_event(Event::stream_start("s"));
    src.push_event(Event::tag(TagList::new()));
    sink.set_active(false).unwrap();
    assert!(sink.sticky_event(EventType::StreamStart).is_none());
    log.lock().clear();

    sink.set_active(true).unwrap();
    assert!(sink.flags().contains(PadFlags::NEED_EVENTS));
    src.push(Buffer::from_static(b"x")).unwrap();
    assert_eq!(
        *log.lock(),
        vec![
            EventType::StreamStart.name(),
            EventType::Tag.name(),
            "buffer:1"
        ]
    );
}

#[test]
fn test_caps_outside_template_not_negotiated() {
    init();
    let template = Arc::new(PadTemplate::sink("sink", Caps::new("audio/x-raw")));
    let (src, sink, log) = linked(Some(template));

    // Stored on the source even though the sink refuses.
    assert!(src.set_caps(Caps::new("video/x-raw")));
    assert_eq!(src.current_caps(), Some(Caps::new("video/x-raw")));
    assert_eq!(sink.current_caps(), None);
    assert!(log.lock().is_empty());

    assert_eq!(src.push(Buffer::from_static(b"x")), Err(FlowError::NotNegotiated));
    assert!(log.lock().is_empty());

    assert!(src.set_caps(Caps::new("audio/x-raw")));
    assert_eq!(sink.current_caps(), Some(Caps::new("audio/x-raw")));
    assert_eq!(src.push(Buffer::from_static(b"x")), Ok(FlowSuccess::Ok));
}

#[test]
fn test_caps_notify_on_sink() {
    init();
    let (src, sink, _log) = linked(None);
    let notified = Arc::new(Mutex::new(Vec::new()));
    let n = notified.clone();
    sink.connect_caps_notify(move |pad, caps| n.lock().push((pad.name().to_string(), caps.clone())));

    src.set_caps(Caps::new("audio/x-raw"));
    src.set_caps(Caps::new("audio/x-raw"));
    src.set_caps(Caps::new("video/x-raw"));
    assert_eq!(
        *notified.lock(),
        vec![
            ("sink".to_string(), Caps::new("audio/x-raw")),
            ("sink".to_string(), Caps::new("video/x-raw")),
        ]
    );
}

#[test]
fn test_offset_change_requeues_segment() {
    init();
    let (src, sink, _log) = linked(None);
    src.push_event(Event::segment(Segment::new_time(0, None)));
    assert_eq!(
        sink.sticky_event(EventType::Segment).unwrap().parse_segment().unwrap().base,
        0
    );

    sink.set_offset(250);
    assert!(sink.flags().contains(PadFlags::NEED_EVENTS));
    src.push(Buffer::from_static(b"x")).unwrap();
    assert_eq!(
        sink.sticky_event(EventType::Segment).unwrap().parse_segment().unwrap().base,
        250
    );

    src.set_offset(1_000);
    src.push(Buffer::from_static(b"x")).unwrap();
    assert_eq!(
        sink.sticky_event(EventType::Segment).unwrap().parse_segment().unwrap().base,
        1_250
    );
}

#[test]
fn test_sticky_events_foreach_in_slot_order() {
    init();
    let src = Pad::new("src", PadDirection::Src);
    src.set_active(true).unwrap();
    src.push_event(Event::segment(Segment::new_time(0, None)));
    src.push_event(Event::stream_start("s"));
    src.set_caps(Caps::new("text/plain"));

    let mut seen = Vec::new();
    src.sticky_events_foreach(|_, event| {
        seen.push(event.event_type());
        Ok(())
    })
    .unwrap();
    assert_eq!(
        seen,
        vec![EventType::StreamStart, EventType::Caps, EventType::Segment]
    );

    let mut visited = 0;
    let result = src.sticky_events_foreach(|_, _| {
        visited += 1;
        Err(FlowError::Error)
    });
    assert_eq!(result, Err(FlowError::Error));
    assert_eq!(visited, 1);
}

#[test]
fn test_flushing_discards_events() {
    init();
    let (src, sink, log) = linked(None);
    assert!(sink.send_event(Event::flush_start()));
    assert!(!sink.send_event(Event::gap(0, None)));
    assert_eq!(src.push(Buffer::from_static(b"x")), Err(FlowError::WrongState));

    assert!(sink.send_event(Event::flush_stop(true)));
    assert!(sink.send_event(Event::gap(0, None)));
    assert_eq!(
        *log.lock(),
        vec![
            EventType::FlushStart.name(),
            EventType::FlushStop.name(),
            EventType::Gap.name()
        ]
    );
}

#[test]
fn test_upstream_events_reach_source() {
    init();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let src = Pad::builder("src", PadDirection::Src)
        .event_function(move |_, event| {
            s.lock().push(event.event_type());
            true
        })
        .build();
    let sink = Pad::new("sink", PadDirection::Sink);
    src.link(&sink).unwrap();
    src.set_active(true).unwrap();
    sink.set_active(true).unwrap();
    src.check_reconfigure();

    assert!(sink.push_event(Event::latency(20)));
    assert!(sink.push_event(Event::reconfigure()));
    assert_eq!(*seen.lock(), vec![EventType::Latency, EventType::Reconfigure]);
    assert!(src.check_reconfigure());
    assert!(sink.check_reconfigure());
}
