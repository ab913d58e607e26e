//! Event propagation between pads.
//!
//! [`Pad::push_event`] sends an event out of a pad to its peer,
//! [`Pad::send_event`] delivers one into a pad. Downstream events go
//! src → peer sink, upstream events sink → peer src. On the way:
//!
//! - flush-start sets `FLUSHING` and wakes threads parked on blocking
//!   probes; flush-stop clears it and drops the EOS slot
//! - sticky events are cached: active right away on source pads, pending
//!   on sink pads until the next buffer or serialized event
//! - serialized events are delivered under the receiving pad's stream lock
//! - segments are shifted by the pad offset

use super::probe::Checkpoint;
use super::{ObjectGuard, Pad, PadFlags, PadMode, ProbeData, ProbeType};
use crate::caps::Caps;
use crate::event::{Event, EventType};
use crate::flow::FlowSuccess;
use crate::observability::metrics;
use parking_lot::MutexGuard;

impl Pad {
    /// Send `event` to the peer of this pad.
    ///
    /// Downstream events belong on source pads and upstream events on sink
    /// pads. Returns whether the peer handled the event. A sticky event
    /// pushed on a source pad is stored there even when the peer is missing
    /// or refuses it, and the call then still reports success.
    pub fn push_event(&self, event: Event) -> bool {
        let span = self.span();
        let _entered = span.enter();

        let event_type = event.event_type();
        let probe_type = if event.is_downstream() {
            ProbeType::EVENT_DOWNSTREAM
        } else {
            ProbeType::EVENT_UPSTREAM
        };
        let mut stored = false;
        let mut event = event;

        let mut state = self.lock();
        match event_type {
            EventType::FlushStart => {
                state.flags.insert(PadFlags::FLUSHING);
                if state.flags.contains(PadFlags::BLOCKED) {
                    tracing::debug!(target: "padflow::events", pad = %self.name(), "pad is blocked, not forwarding flush-start");
                    self.block_broadcast();
                    return false;
                }
            }
            EventType::FlushStop => {
                if state.mode != PadMode::None {
                    state.flags.remove(PadFlags::FLUSHING);
                }
                state.events.clear_slot(EventType::Eos);
                if state.flags.contains(PadFlags::BLOCKED) {
                    tracing::debug!(target: "padflow::events", pad = %self.name(), "pad is blocked, not forwarding flush-stop");
                    return false;
                }
            }
            _ => {
                if state.is_flushing() {
                    tracing::debug!(target: "padflow::events", pad = %self.name(), event = event_type.name(), "pad is flushing");
                    return false;
                }

                let mut caps_changed = None;
                if self.is_src() && event.is_sticky() {
                    if let Some(idx) = event_type.sticky_index() {
                        if let Some(caps) = event.parse_caps() {
                            let old = state.events.active(EventType::Caps).and_then(Event::parse_caps);
                            if old != Some(caps) {
                                caps_changed = Some(caps.clone());
                            }
                        }
                        tracing::trace!(target: "padflow::events", pad = %self.name(), event = event_type.name(), idx, "storing sticky event");
                        state.events.store_active(idx, event.clone());
                        stored = true;
                    }
                }

                match event_type {
                    EventType::Caps => {
                        if let Some(caps) = caps_changed {
                            MutexGuard::unlocked(&mut state, || self.emit_caps_notify(&caps));
                        }
                    }
                    EventType::Segment => {
                        if state.offset != 0 && state.peer.is_some() {
                            event = event.with_segment_offset(state.offset);
                        }
                    }
                    EventType::Reconfigure => {
                        if self.is_sink() {
                            state.flags.insert(PadFlags::NEED_RECONFIGURE);
                        }
                    }
                    _ => {}
                }

                event = match self.event_checkpoint(
                    &mut state,
                    probe_type | ProbeType::PUSH | ProbeType::BLOCK,
                    event,
                ) {
                    Some(event) => event,
                    None => return stored,
                };
            }
        }

        event = match self.event_checkpoint(&mut state, probe_type | ProbeType::PUSH, event) {
            Some(event) => event,
            None => return stored,
        };

        let Some(peer) = state.peer() else {
            tracing::debug!(target: "padflow::events", pad = %self.name(), event = event_type.name(), "dropping event because pad is not linked");
            return stored;
        };

        state.num_using += 1;
        let result = MutexGuard::unlocked(&mut state, move || {
            tracing::trace!(target: "padflow::events", pad = %self.name(), peer = %peer.name(), event = event_type.name(), "sending event to peer");
            let result = peer.send_event(event);
            drop(peer);
            result
        });
        state.num_using -= 1;
        if state.num_using == 0 {
            self.run_idle_probes(&mut state, ProbeType::PUSH, Ok(FlowSuccess::Ok));
        }
        drop(state);

        tracing::trace!(target: "padflow::events", pad = %self.name(), event = event_type.name(), result, "sent event to peer");
        if result {
            metrics::record_event_forwarded(self.name(), event_type.name());
        }
        result || stored
    }

    /// Deliver `event` into this pad.
    ///
    /// Sink pads take downstream events and source pads upstream events;
    /// anything else is refused. Serialized events wait for the stream
    /// lock. Sticky events are queued and handed to the event function
    /// through the sticky cache, together with anything else pending.
    pub fn send_event(&self, event: Event) -> bool {
        let event_type = event.event_type();
        let (serialized, sticky, probe_type) = if self.is_sink() {
            if !event.is_downstream() {
                tracing::warn!(target: "padflow::events", pad = %self.debug_name(), event = event_type.name(), "sending event in wrong direction");
                return false;
            }
            (event.is_serialized(), event.is_sticky(), ProbeType::EVENT_DOWNSTREAM)
        } else {
            if !event.is_upstream() {
                tracing::warn!(target: "padflow::events", pad = %self.debug_name(), event = event_type.name(), "sending event in wrong direction");
                return false;
            }
            // Upstream events are never serialized nor sticky.
            (false, false, ProbeType::EVENT_UPSTREAM)
        };

        let mut event = event;
        let mut _stream = None;
        let mut state = self.lock();
        let mut needs_events = state.flags.contains(PadFlags::NEED_EVENTS);

        match event_type {
            EventType::FlushStart => {
                if state.is_flushing() {
                    tracing::debug!(target: "padflow::events", pad = %self.name(), "already flushing, refusing flush-start");
                    return false;
                }
                state.flags.insert(PadFlags::FLUSHING);
                self.block_broadcast();
                tracing::debug!(target: "padflow::events", pad = %self.name(), "set flush flag");
                needs_events = false;
            }
            EventType::FlushStop => {
                if state.mode != PadMode::None {
                    state.flags.remove(PadFlags::FLUSHING);
                    tracing::debug!(target: "padflow::events", pad = %self.name(), "cleared flush flag");
                }
                state.events.clear_slot(EventType::Eos);

                drop(state);
                _stream = Some(self.stream_lock());
                state = self.lock();
                needs_events = false;
            }
            _ => {
                if event_type == EventType::Reconfigure && self.is_src() {
                    state.flags.insert(PadFlags::NEED_RECONFIGURE);
                }
                if state.is_flushing() {
                    tracing::info!(target: "padflow::events", pad = %self.name(), event = event_type.name(), "received event on flushing pad, discarding");
                    return false;
                }

                if serialized {
                    drop(state);
                    _stream = Some(self.stream_lock());
                    state = self.lock();
                    if state.is_flushing() {
                        tracing::info!(target: "padflow::events", pad = %self.name(), event = event_type.name(), "pad started flushing, discarding");
                        return false;
                    }
                } else {
                    needs_events = false;
                }

                if sticky {
                    event = event.with_segment_offset(state.offset);
                    if let Some(idx) = event_type.sticky_index() {
                        if state.events.store_pending(idx, event.clone()) {
                            tracing::trace!(target: "padflow::events", pad = %self.name(), event = event_type.name(), idx, "storing pending sticky event");
                            state.flags.insert(PadFlags::NEED_EVENTS);
                            needs_events = true;
                        }
                    }
                }

                for checkpoint in [
                    probe_type | ProbeType::PUSH | ProbeType::BLOCK,
                    probe_type | ProbeType::PUSH,
                ] {
                    event = match self.event_checkpoint(&mut state, checkpoint, event) {
                        Some(event) => event,
                        None => return false,
                    };
                }
            }
        }

        if needs_events {
            state.flags.remove(PadFlags::NEED_EVENTS);
            tracing::debug!(target: "padflow::events", pad = %self.name(), "need to update all events");
            if let Err(err) = self.update_events(&mut state) {
                tracing::debug!(target: "padflow::events", pad = %self.name(), event = event_type.name(), %err, "updating events failed");
                return false;
            }
            if sticky {
                // Delivered through the sticky cache.
                return true;
            }
        }
        drop(state);

        let result = self.call_event_function(event);
        tracing::debug!(target: "padflow::events", pad = %self.name(), event = event_type.name(), result, "sent event");
        result
    }

    /// Run one event checkpoint. `None` when a probe dropped the event or
    /// the pad flushed while blocked.
    fn event_checkpoint(
        &self,
        state: &mut ObjectGuard<'_>,
        probe_type: ProbeType,
        event: Event,
    ) -> Option<Event> {
        match self.run_checkpoint(state, probe_type, ProbeData::Event(event)) {
            Ok(Checkpoint::Pass(ProbeData::Event(event))) => Some(event),
            Ok(Checkpoint::Pass(other)) => {
                tracing::error!(target: "padflow::probes", pad = %self.name(), item = ?other, "probe replaced event with a non-event item");
                None
            }
            Ok(Checkpoint::Dropped) => {
                tracing::debug!(target: "padflow::events", pad = %self.name(), "event dropped by probe");
                None
            }
            Err(err) => {
                tracing::debug!(target: "padflow::events", pad = %self.name(), %err, "probe stopped event");
                None
            }
        }
    }

    /// Hand `event` to the pad's event function, or to
    /// [`Pad::event_default`] when none is installed.
    pub(crate) fn call_event_function(&self, event: Event) -> bool {
        match self.functions().event.clone() {
            Some(event_fn) => event_fn(self, event),
            None => self.event_default(event),
        }
    }

    /// Default event handling.
    ///
    /// EOS pauses the pad task before it is forwarded. Caps are only
    /// forwarded by pads with `PROXY_CAPS` and are otherwise accepted
    /// as-is. Everything else is pushed out of every internally linked pad.
    /// Returns `true` if some pad took the event, or if there was no pad to
    /// forward to.
    pub fn event_default(&self, event: Event) -> bool {
        tracing::trace!(target: "padflow::events", pad = %self.name(), event = event.event_type().name(), "default event handler");
        match event.event_type() {
            EventType::Eos => {
                if self.task_state().is_some() {
                    tracing::debug!(target: "padflow::events", pad = %self.name(), "pausing task because of eos");
                    if let Err(err) = self.pause_task() {
                        tracing::warn!(target: "padflow::events", pad = %self.name(), %err, "could not pause task");
                    }
                }
            }
            EventType::Caps => {
                if !self.flags().contains(PadFlags::PROXY_CAPS) {
                    return true;
                }
            }
            _ => {}
        }

        let mut dispatched = false;
        let mut result = false;
        self.forward(|internal| {
            tracing::trace!(target: "padflow::events", pad = %self.name(), to = %internal.name(), "pushing event to internal link");
            result |= internal.push_event(event.clone());
            dispatched = true;
            false
        });
        if !dispatched {
            tracing::debug!(target: "padflow::events", pad = %self.name(), "no internal links, event handled");
            return true;
        }
        result
    }

    /// Announce fixed `caps`: pushed downstream from a source pad, sent into
    /// a sink pad. Unfixed caps are refused.
    pub fn set_caps(&self, caps: Caps) -> bool {
        if !caps.is_fixed() {
            tracing::warn!(target: "padflow::caps", pad = %self.name(), %caps, "refusing unfixed caps");
            return false;
        }
        let event = Event::caps(caps);
        if self.is_src() {
            self.push_event(event)
        } else {
            self.send_event(event)
        }
    }

    /// Pads internally linked to this one inside its node.
    ///
    /// Uses the internal-links function if installed; otherwise every pad
    /// of the opposite direction on the parent node, or none without a
    /// parent.
    pub fn iterate_internal_links(&self) -> Vec<Pad> {
        if let Some(internal_links) = self.functions().internal_links.clone() {
            return internal_links(self);
        }
        match self.parent() {
            Some(node) => node.pads_with_direction(self.direction().opposite()),
            None => Vec::new(),
        }
    }

    /// Call `f` on every internally linked pad, each at most once, until it
    /// returns `true`. Returns whether some call returned `true`.
    pub fn forward<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&Pad) -> bool,
    {
        let mut visited: Vec<Pad> = Vec::new();
        for internal in self.iterate_internal_links() {
            if visited.contains(&internal) {
                continue;
            }
            tracing::trace!(target: "padflow::pad", pad = %self.name(), to = %internal.name(), "calling forward function");
            if f(&internal) {
                return true;
            }
            visited.push(internal);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Segment;
    use crate::node::Node;
    use crate::pad::{PadDirection, ProbeReturn};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_sink(name: &str) -> (Pad, Arc<Mutex<Vec<EventType>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let pad = Pad::builder(name, PadDirection::Sink)
            .event_function(move |_, event| {
                s.lock().push(event.event_type());
                true
            })
            .build();
        (pad, seen)
    }

    fn active_pair() -> (Pad, Pad, Arc<Mutex<Vec<EventType>>>) {
        let src = Pad::new("src", PadDirection::Src);
        let (sink, seen) = recording_sink("sink");
        src.link(&sink).unwrap();
        src.set_active(true).unwrap();
        sink.set_active(true).unwrap();
        (src, sink, seen)
    }

    #[test]
    fn test_sticky_event_reaches_sink() {
        let (src, sink, seen) = active_pair();
        assert!(src.push_event(Event::stream_start("s1")));
        assert_eq!(*seen.lock(), vec![EventType::StreamStart]);
        assert!(src.sticky_event(EventType::StreamStart).is_some());
        assert!(sink.sticky_event(EventType::StreamStart).is_some());
    }

    #[test]
    fn test_sticky_stored_on_unlinked_src() {
        let src = Pad::new("src", PadDirection::Src);
        src.set_active(true).unwrap();
        assert!(src.push_event(Event::segment(Segment::new_time(0, None))));
        assert!(src.sticky_event(EventType::Segment).is_some());
        assert!(!src.push_event(Event::gap(0, None)));
    }

    #[test]
    fn test_push_event_on_flushing_pad() {
        let src = Pad::new("src", PadDirection::Src);
        assert!(!src.push_event(Event::stream_start("s")));
        assert!(src.sticky_event(EventType::StreamStart).is_none());
    }

    #[test]
    fn test_wrong_direction_refused() {
        let (sink, seen) = recording_sink("sink");
        sink.set_active(true).unwrap();
        assert!(!sink.send_event(Event::reconfigure()));
        let src = Pad::new("src", PadDirection::Src);
        src.set_active(true).unwrap();
        assert!(!src.send_event(Event::eos()));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_flush_start_then_stop() {
        let (src, sink, seen) = active_pair();
        assert!(src.push_event(Event::flush_start()));
        assert!(src.is_flushing());
        assert!(sink.is_flushing());
        assert!(!sink.send_event(Event::flush_start()));

        assert!(src.push_event(Event::flush_stop(true)));
        assert!(!src.is_flushing());
        assert!(!sink.is_flushing());
        assert_eq!(
            *seen.lock(),
            vec![EventType::FlushStart, EventType::FlushStop]
        );
    }

    #[test]
    fn test_flush_stop_clears_eos() {
        let (src, sink, _seen) = active_pair();
        assert!(src.push_event(Event::eos()));
        assert!(sink.sticky_event(EventType::Eos).is_some());
        src.push_event(Event::flush_start());
        src.push_event(Event::flush_stop(false));
        assert!(src.sticky_event(EventType::Eos).is_none());
        assert!(sink.sticky_event(EventType::Eos).is_none());
    }

    #[test]
    fn test_flush_start_on_blocked_pad_not_forwarded() {
        let (src, sink, seen) = active_pair();
        let id = src.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);
        assert!(!src.push_event(Event::flush_start()));
        assert!(src.is_flushing());
        assert!(!sink.is_flushing());
        assert!(seen.lock().is_empty());
        src.remove_probe(id);
    }

    #[test]
    fn test_segment_offset_on_push() {
        let (src, sink, _seen) = active_pair();
        src.set_offset(500);
        assert!(src.push_event(Event::segment(Segment::new_time(0, None))));
        let stored = src.sticky_event(EventType::Segment).unwrap();
        assert_eq!(stored.parse_segment().unwrap().base, 0);
        let received = sink.sticky_event(EventType::Segment).unwrap();
        assert_eq!(received.parse_segment().unwrap().base, 500);
    }

    #[test]
    fn test_reconfigure_marks_both_ends() {
        let (src, sink, _seen) = active_pair();
        src.check_reconfigure();
        sink.check_reconfigure();
        assert!(sink.push_event(Event::reconfigure()));
        assert!(sink.needs_reconfigure());
        assert!(src.needs_reconfigure());
    }

    #[test]
    fn test_probe_drops_event() {
        let (src, _sink, seen) = active_pair();
        src.add_probe(ProbeType::EVENT_DOWNSTREAM, |_, info| {
            if info.event().is_some_and(|e| e.event_type() == EventType::Gap) {
                ProbeReturn::Drop
            } else {
                ProbeReturn::Ok
            }
        });
        assert!(!src.push_event(Event::gap(0, Some(10))));
        assert!(src.push_event(Event::stream_start("s")));
        assert_eq!(*seen.lock(), vec![EventType::StreamStart]);
    }

    #[test]
    fn test_pending_events_flushed_before_serialized_event() {
        let (src, sink, seen) = active_pair();
        sink.set_active(false).unwrap();
        src.push_event(Event::stream_start("s"));
        sink.set_active(true).unwrap();
        assert!(sink.flags().contains(PadFlags::NEED_EVENTS));
        assert!(sink.send_event(Event::gap(0, None)));
        assert_eq!(*seen.lock(), vec![EventType::StreamStart, EventType::Gap]);
        assert!(!sink.flags().contains(PadFlags::NEED_EVENTS));
    }

    #[test]
    fn test_set_caps_requires_fixed_caps() {
        let (src, sink, _seen) = active_pair();
        assert!(!src.set_caps(Caps::any()));
        let caps = Caps::new("audio/x-raw");
        assert!(src.set_caps(caps.clone()));
        assert_eq!(src.current_caps(), Some(caps.clone()));
        assert_eq!(sink.current_caps(), Some(caps));
    }

    #[test]
    fn test_caps_notify_on_change_only() {
        let src = Pad::new("src", PadDirection::Src);
        src.set_active(true).unwrap();
        let notified = Arc::new(Mutex::new(0));
        let n = notified.clone();
        src.connect_caps_notify(move |_, _| *n.lock() += 1);
        src.set_caps(Caps::new("video/x-raw"));
        src.set_caps(Caps::new("video/x-raw"));
        assert_eq!(*notified.lock(), 1);
        src.set_caps(Caps::new("audio/x-raw"));
        assert_eq!(*notified.lock(), 2);
    }

    #[test]
    fn test_default_handler_forwards_through_node() {
        let node = Node::new("identity");
        let node_sink = Pad::new("sink", PadDirection::Sink);
        let node_src = Pad::new("src", PadDirection::Src);
        node.add_pad(&node_sink).unwrap();
        node.add_pad(&node_src).unwrap();

        let upstream = Pad::new("up", PadDirection::Src);
        let (downstream, seen) = recording_sink("down");
        upstream.link(&node_sink).unwrap();
        node_src.link(&downstream).unwrap();
        for pad in [&upstream, &node_sink, &node_src, &downstream] {
            pad.set_active(true).unwrap();
        }

        assert!(upstream.push_event(Event::stream_start("s")));
        assert_eq!(*seen.lock(), vec![EventType::StreamStart]);
        assert!(node_src.sticky_event(EventType::StreamStart).is_some());

        // Caps stop at a pad without PROXY_CAPS.
        assert!(upstream.set_caps(Caps::new("audio/x-raw")));
        assert_eq!(seen.lock().len(), 1);
        assert!(node_sink.has_current_caps());
        assert!(!node_src.has_current_caps());
    }

    #[test]
    fn test_default_handler_without_links() {
        let pad = Pad::new("sink", PadDirection::Sink);
        assert!(pad.event_default(Event::gap(0, None)));
    }

    #[test]
    fn test_forward_visits_each_pad_once() {
        let a = Pad::new("a", PadDirection::Src);
        let b = Pad::new("b", PadDirection::Src);
        let (a2, b2) = (a.clone(), b.clone());
        let pad = Pad::builder("sink", PadDirection::Sink)
            .internal_links_function(move |_| vec![a2.clone(), b2.clone(), a2.clone()])
            .build();

        let mut names = Vec::new();
        assert!(!pad.forward(|p| {
            names.push(p.name().to_string());
            false
        }));
        assert_eq!(names, ["a", "b"]);

        let mut calls = 0;
        assert!(pad.forward(|_| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 1);
    }
}
