//! Linking and unlinking pads.
//!
//! Linking is always done from the source pad: `src.link(&sink)`. Both
//! object locks are taken in source-then-sink order. A successful link
//! copies the source's active sticky events into the sink's pending slots,
//! so the sink replays them before the first buffer arrives.

use super::sticky::prepare_event_update;
use super::{ObjectGuard, Pad, PadState};
use crate::event::Event;
use crate::flow::{LinkError, LinkResult};
use crate::node::{Node, NodeMessage, StructureChange};
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Checks run by [`Pad::link_full`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkCheck: u32 {
        /// Both pads' nodes must share a parent.
        const HIERARCHY = 1 << 0;
        /// Template caps must intersect. Ignored when `CAPS` is set.
        const TEMPLATE_CAPS = 1 << 1;
        /// Caps answered by caps queries must intersect.
        const CAPS = 1 << 2;
    }
}

impl LinkCheck {
    /// No checks at all.
    pub const NOTHING: Self = Self::empty();
    /// Checks used by [`Pad::link`].
    pub const DEFAULT: Self = Self::HIERARCHY.union(Self::CAPS);
}

impl Default for LinkCheck {
    fn default() -> Self {
        Self::DEFAULT
    }
}

type LinkGuards<'a, 'b> = (ObjectGuard<'a>, ObjectGuard<'b>);

impl Pad {
    /// Link this source pad to `sink` with the default checks.
    pub fn link(&self, sink: &Pad) -> LinkResult {
        self.link_full(sink, LinkCheck::DEFAULT)
    }

    /// Whether this source pad could be linked to `sink` right now.
    pub fn can_link(&self, sink: &Pad) -> bool {
        tracing::debug!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "checking link");
        if !self.is_src() || !sink.is_sink() {
            return false;
        }
        self.link_prepare(sink, LinkCheck::DEFAULT).is_ok()
    }

    /// Link this source pad to `sink`, running only the checks in `flags`.
    ///
    /// The source's link function runs, or else the sink's, with both
    /// object locks released. If another thread relinks either pad
    /// meanwhile, `WasLinked` is returned and that other link stays.
    pub fn link_full(&self, sink: &Pad, flags: LinkCheck) -> LinkResult {
        if !self.is_src() || !sink.is_sink() {
            tracing::warn!(
                target: "padflow::pad",
                src = %self.debug_name(),
                sink = %sink.debug_name(),
                "linking pads with wrong directions"
            );
            return Err(LinkError::WrongDirection);
        }

        let parent = self.parent();
        if let Some(parent) = &parent {
            parent.post_message(NodeMessage::StructureChange {
                change: StructureChange::PadLink,
                pad: sink.name().to_string(),
                busy: true,
            });
        }

        let result = self.link_locked(sink, flags);

        if let Some(parent) = &parent {
            parent.post_message(NodeMessage::StructureChange {
                change: StructureChange::PadLink,
                pad: sink.name().to_string(),
                busy: false,
            });
        }
        result
    }

    fn link_locked(&self, sink: &Pad, flags: LinkCheck) -> LinkResult {
        {
            let (mut src_state, mut sink_state) = self.link_prepare(sink, flags)?;
            src_state.peer = Some(sink.downgrade());
            sink_state.peer = Some(self.downgrade());
            prepare_event_update(&src_state, &mut sink_state);
        }

        let src_func = self.functions().link.clone();
        let sink_func = sink.functions().link.clone();
        if src_func.is_some() || sink_func.is_some() {
            let result = match (src_func, sink_func) {
                (Some(func), _) => func(self, sink),
                (None, Some(func)) => func(sink, self),
                (None, None) => Ok(()),
            };

            let mut src_state = self.lock();
            let mut sink_state = sink.lock();
            if !src_state.peer_is(sink) || !sink_state.peer_is(self) {
                tracing::info!(
                    target: "padflow::pad",
                    src = %self.debug_name(),
                    sink = %sink.debug_name(),
                    "concurrent link detected"
                );
                return Err(LinkError::WasLinked);
            }
            if let Err(err) = result {
                tracing::info!(
                    target: "padflow::pad",
                    src = %self.debug_name(),
                    sink = %sink.debug_name(),
                    %err,
                    "link function refused"
                );
                src_state.peer = None;
                sink_state.peer = None;
                return Err(err);
            }
        }

        tracing::info!(
            target: "padflow::pad",
            src = %self.debug_name(),
            sink = %sink.debug_name(),
            "linked"
        );

        self.emit_linked(sink);
        sink.emit_linked(self);

        self.send_event(Event::reconfigure());
        Ok(())
    }

    /// Lock both pads and run the requested checks.
    ///
    /// On success both guards are returned, source first.
    pub(crate) fn link_prepare<'a, 'b>(
        &'a self,
        sink: &'b Pad,
        flags: LinkCheck,
    ) -> Result<LinkGuards<'a, 'b>, LinkError> {
        tracing::debug!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "trying to link");

        // Caps queries run user code, so they happen before locking.
        let needs_caps = flags.contains(LinkCheck::CAPS);
        let caps = needs_caps.then(|| (self.query_caps(None), sink.query_caps(None)));

        let src_state = self.lock();
        if src_state.peer.is_some() {
            tracing::info!(target: "padflow::pad", src = %self.debug_name(), "source was already linked");
            return Err(LinkError::WasLinked);
        }
        let sink_state = sink.lock();
        if sink_state.peer.is_some() {
            tracing::info!(target: "padflow::pad", sink = %sink.debug_name(), "sink was already linked");
            return Err(LinkError::WasLinked);
        }

        if flags.contains(LinkCheck::HIERARCHY) && !check_hierarchy(&src_state, &sink_state) {
            tracing::info!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "pads have wrong hierarchy");
            return Err(LinkError::WrongHierarchy);
        }

        let compatible = if let Some((src_caps, sink_caps)) = &caps {
            src_caps.can_intersect(sink_caps)
        } else if flags.contains(LinkCheck::TEMPLATE_CAPS) {
            match (self.template(), sink.template()) {
                (Some(src), Some(sink)) => src.caps.can_intersect(&sink.caps),
                _ => true,
            }
        } else {
            true
        };
        if !compatible {
            tracing::info!(target: "padflow::caps", src = %self.debug_name(), sink = %sink.debug_name(), "caps are incompatible");
            return Err(LinkError::NoFormat);
        }

        Ok((src_state, sink_state))
    }

    /// Unlink this source pad from `sink`.
    ///
    /// Returns `false`, without touching either pad, if they are not
    /// linked to each other. Unlink functions run before the peers are
    /// cleared, `unlinked` observers after. Pending sticky events of the
    /// sink are dropped; active ones stay.
    pub fn unlink(&self, sink: &Pad) -> bool {
        if !self.is_src() || !sink.is_sink() {
            tracing::warn!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "unlinking pads with wrong directions");
            return false;
        }
        tracing::debug!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "unlinking");

        let parent = self.parent();
        if let Some(parent) = &parent {
            parent.post_message(NodeMessage::StructureChange {
                change: StructureChange::PadUnlink,
                pad: sink.name().to_string(),
                busy: true,
            });
        }

        let linked = self.lock().peer_is(sink);
        let unlinked = linked && {
            // Unlink functions still see the peer.
            if let Some(func) = self.functions().unlink.as_ref().map(Arc::clone) {
                func(self);
            }
            if let Some(func) = sink.functions().unlink.as_ref().map(Arc::clone) {
                func(sink);
            }

            let mut src_state = self.lock();
            let mut sink_state = sink.lock();
            if src_state.peer_is(sink) {
                src_state.peer = None;
                sink_state.peer = None;
                sink_state.events.clear_pending();
                true
            } else {
                tracing::info!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "concurrent unlink detected");
                false
            }
        };

        if unlinked {
            self.emit_unlinked(sink);
            sink.emit_unlinked(self);
            tracing::info!(target: "padflow::pad", src = %self.debug_name(), sink = %sink.debug_name(), "unlinked");
        }

        if let Some(parent) = &parent {
            parent.post_message(NodeMessage::StructureChange {
                change: StructureChange::PadUnlink,
                pad: sink.name().to_string(),
                busy: false,
            });
        }
        unlinked
    }
}

/// Pads of the same node may not be linked; pads of different nodes need
/// the same grandparent. Pads without a node link freely.
fn check_hierarchy(src: &PadState, sink: &PadState) -> bool {
    let (Some(src_node), Some(sink_node)) = (src.parent.upgrade(), sink.parent.upgrade()) else {
        return true;
    };
    let (src_node, sink_node) = (Node::from_inner(src_node), Node::from_inner(sink_node));
    if src_node == sink_node {
        return false;
    }
    src_node.parent() == sink_node.parent()
}
