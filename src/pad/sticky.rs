//! Sticky event cache.
//!
//! Every pad keeps one slot per sticky event type. A slot holds the
//! *active* event, which the pad has already handled, and optionally a
//! *pending* one that still has to go through the pad's event function.
//! Pending events are delivered, in slot order, before the next buffer is
//! admitted; only a successful delivery makes an event active.

use super::{ObjectGuard, Pad, PadFlags, PadState};
use crate::caps::Caps;
use crate::event::{Event, EventType, STICKY_SLOTS};
use crate::flow::FlowError;
use parking_lot::MutexGuard;

#[derive(Debug, Clone, Default)]
pub(crate) struct PadEvent {
    pub(crate) pending: Option<Event>,
    pub(crate) active: Option<Event>,
}

#[derive(Debug, Default)]
pub(crate) struct StickyEvents {
    slots: [PadEvent; STICKY_SLOTS],
}

/// Same event, or a rebuilt copy of it carrying the same payload.
fn same_event(a: Option<&Event>, b: &Event) -> bool {
    a.is_some_and(|a| a.ptr_eq(b) || (a.seqnum() == b.seqnum() && a.kind() == b.kind()))
}

impl StickyEvents {
    pub(crate) fn slot(&self, idx: usize) -> &PadEvent {
        &self.slots[idx]
    }

    pub(crate) fn active(&self, event_type: EventType) -> Option<&Event> {
        event_type
            .sticky_index()
            .and_then(|idx| self.slots[idx].active.as_ref())
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.slots.iter().any(|s| s.pending.is_some())
    }

    /// Queue `event` unless it is already the active one.
    ///
    /// Returns whether the event was queued.
    pub(crate) fn store_pending(&mut self, idx: usize, event: Event) -> bool {
        let slot = &mut self.slots[idx];
        if same_event(slot.active.as_ref(), &event) {
            return false;
        }
        slot.pending = Some(event);
        true
    }

    /// Make `event` active right away, dropping anything pending.
    pub(crate) fn store_active(&mut self, idx: usize, event: Event) {
        let slot = &mut self.slots[idx];
        slot.pending = None;
        slot.active = Some(event);
    }

    pub(crate) fn clear_slot(&mut self, event_type: EventType) {
        if let Some(idx) = event_type.sticky_index() {
            self.slots[idx] = PadEvent::default();
        }
    }

    pub(crate) fn clear_pending(&mut self) {
        for slot in &mut self.slots {
            slot.pending = None;
        }
    }

    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = PadEvent::default();
        }
    }
}

/// Copy the active event of `src` slot `idx` into `sink`'s pending slot.
///
/// Segments are rebuilt with the sum of both pads' offsets added to their
/// base. Returns whether `sink` got a new pending event.
fn replace_event(src: &PadState, sink: &mut PadState, idx: usize) -> bool {
    let Some(event) = src.events.slot(idx).active.clone() else {
        return false;
    };
    let event = if event.event_type() == EventType::Segment {
        event.with_segment_offset(src.offset.saturating_add(sink.offset))
    } else {
        event
    };
    let sink_slot = &sink.events.slots[idx];
    if same_event(sink_slot.active.as_ref(), &event)
        || same_event(sink_slot.pending.as_ref(), &event)
    {
        return false;
    }
    sink.events.slots[idx].pending = Some(event);
    true
}

/// Hand every active sticky event of `src` to `sink` as pending.
pub(crate) fn prepare_event_update(src: &PadState, sink: &mut PadState) {
    let mut pending = false;
    for idx in 0..STICKY_SLOTS {
        pending |= replace_event(src, sink, idx);
    }
    if pending {
        sink.flags.insert(PadFlags::NEED_EVENTS);
    }
}

/// Re-apply only the segment slot, after an offset change.
pub(crate) fn replace_segment(src: &PadState, sink: &mut PadState) {
    let Some(idx) = EventType::Segment.sticky_index() else {
        return;
    };
    if replace_event(src, sink, idx) {
        sink.flags.insert(PadFlags::NEED_EVENTS);
    }
}

impl Pad {
    /// Deliver pending sticky events to the event function, in slot order.
    ///
    /// The object lock is released around every delivery. A failed
    /// delivery leaves its event pending, keeps `NEED_EVENTS` set and stops.
    pub(crate) fn update_events(&self, state: &mut ObjectGuard<'_>) -> Result<(), FlowError> {
        for idx in 0..STICKY_SLOTS {
            let Some(event) = state.events.slots[idx].pending.take() else {
                continue;
            };
            tracing::debug!(
                target: "padflow::events",
                pad = %self.name(),
                event = event.event_type().name(),
                "delivering pending sticky event"
            );
            let delivered = MutexGuard::unlocked(state, || self.deliver_sticky(event.clone()));

            let slot = &mut state.events.slots[idx];
            match delivered {
                Ok(changed_caps) => {
                    if same_event(slot.pending.as_ref(), &event) {
                        slot.pending = None;
                    }
                    slot.active = Some(event);
                    if let Some(caps) = changed_caps {
                        MutexGuard::unlocked(state, || self.emit_caps_notify(&caps));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "padflow::events",
                        pad = %self.name(),
                        event = event.event_type().name(),
                        %err,
                        "sticky event was refused"
                    );
                    if slot.pending.is_none() {
                        slot.pending = Some(event);
                    }
                    state.flags.insert(PadFlags::NEED_EVENTS);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Run the event function for a sticky event.
    ///
    /// Caps must be a subset of the template caps. Caps equal to the current
    /// ones are accepted without calling the event function. Returns the
    /// new caps when they changed.
    pub(crate) fn deliver_sticky(&self, event: Event) -> Result<Option<Caps>, FlowError> {
        let mut changed_caps = None;
        if let Some(caps) = event.parse_caps() {
            let template = self.template_caps();
            if !caps.is_subset(&template) {
                tracing::warn!(
                    target: "padflow::caps",
                    pad = %self.name(),
                    %caps,
                    %template,
                    "caps not accepted by template"
                );
                return Err(FlowError::NotNegotiated);
            }
            if self.current_caps().as_ref() == Some(caps) {
                tracing::trace!(target: "padflow::caps", pad = %self.name(), "caps unchanged");
                return Ok(None);
            }
            changed_caps = Some(caps.clone());
        }

        let event_type = event.event_type();
        if self.call_event_function(event) {
            Ok(changed_caps)
        } else if event_type == EventType::Caps {
            Err(FlowError::NotNegotiated)
        } else {
            Err(FlowError::Error)
        }
    }

    /// Active sticky event of `event_type`.
    pub fn sticky_event(&self, event_type: EventType) -> Option<Event> {
        self.lock().events.active(event_type).cloned()
    }

    /// Call `f` for every active sticky event, in slot order.
    ///
    /// The object lock is released during each call. If the slot being
    /// visited changed meanwhile, iteration restarts from the first slot.
    /// Stops at, and returns, the first error.
    pub fn sticky_events_foreach<F>(&self, mut f: F) -> Result<(), FlowError>
    where
        F: FnMut(&Pad, &Event) -> Result<(), FlowError>,
    {
        let mut state = self.lock();
        let mut idx = 0;
        while idx < STICKY_SLOTS {
            let Some(event) = state.events.slot(idx).active.clone() else {
                idx += 1;
                continue;
            };
            let result = MutexGuard::unlocked(&mut state, || f(self, &event));
            result?;
            if !same_event(state.events.slot(idx).active.as_ref(), &event) {
                tracing::trace!(target: "padflow::events", pad = %self.name(), "sticky events changed, restarting");
                idx = 0;
                continue;
            }
            idx += 1;
        }
        Ok(())
    }

    /// Negotiated caps: the active caps event's caps.
    pub fn current_caps(&self) -> Option<Caps> {
        self.lock()
            .events
            .active(EventType::Caps)
            .and_then(|e| e.parse_caps().cloned())
    }

    /// Whether caps were negotiated.
    pub fn has_current_caps(&self) -> bool {
        self.current_caps().is_some()
    }

    /// Set the pad offset, re-applying the active segment across the link.
    ///
    /// On a sink pad the segment of the linked source is re-queued with the
    /// new sum of offsets.
    pub fn set_offset(&self, offset: i64) {
        let mut state = self.lock();
        if state.offset == offset {
            return;
        }
        state.offset = offset;
        tracing::debug!(target: "padflow::events", pad = %self.name(), offset, "changed offset");

        let Some(peer) = state.peer() else {
            return;
        };
        if self.is_src() {
            let mut peer_state = peer.lock();
            replace_segment(&state, &mut peer_state);
            drop(peer_state);
            drop(state);
        } else {
            // Lock order is always source then sink.
            drop(state);
            let src_state = peer.lock();
            let mut sink_state = self.lock();
            if src_state.peer_is(self) {
                replace_segment(&src_state, &mut sink_state);
            }
            drop(sink_state);
            drop(src_state);
        }
        drop(peer);
    }
}
