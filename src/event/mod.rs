//! Events that travel between pads alongside buffers.
//!
//! Events are categorized by their flow direction:
//!
//! - **Downstream events** travel with data (segment, caps, tags, EOS)
//! - **Upstream events** travel against it (seek, QoS, reconfigure)
//! - **Flush events** travel both ways
//!
//! Serialized events keep their position relative to buffers and are
//! delivered under the receiving pad's stream lock. Sticky events are cached
//! on pads and replayed before data may pass; each sticky type owns a fixed
//! slot, see [`EventType::sticky_index`].
//!
//! # Example
//!
//! ```rust
//! use padflow::caps::Caps;
//! use padflow::event::{Event, EventType};
//!
//! let event = Event::caps(Caps::new("audio/x-raw"));
//! assert_eq!(event.event_type(), EventType::Caps);
//! assert!(event.is_downstream());
//! assert!(event.is_sticky());
//! assert_eq!(event.event_type().sticky_index(), Some(1));
//! ```

mod segment;
mod tags;

pub use segment::{Segment, SegmentFlags, SegmentFormat};
pub use tags::{TagList, TagValue};

use crate::caps::Caps;
use bitflags::bitflags;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of sticky event slots on every pad.
pub const STICKY_SLOTS: usize = 6;

bitflags! {
    /// Classification of an event type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventTypeFlags: u32 {
        /// Travels against the data flow.
        const UPSTREAM = 1 << 0;
        /// Travels with the data flow.
        const DOWNSTREAM = 1 << 1;
        /// Keeps its order relative to buffers.
        const SERIALIZED = 1 << 2;
        /// Cached on pads until replaced.
        const STICKY = 1 << 3;
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Type tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Start flushing; pads fail data flow until flush-stop.
    FlushStart,
    /// Stop flushing.
    FlushStop,
    /// A new stream begins.
    StreamStart,
    /// Format of the following buffers.
    Caps,
    /// Timeline of the following buffers.
    Segment,
    /// Stream metadata.
    Tag,
    /// No more data follows.
    Eos,
    /// No data for a stretch of time.
    Gap,
    /// Quality-of-service feedback.
    Qos,
    /// Seek request.
    Seek,
    /// Latency configuration.
    Latency,
    /// Upstream renegotiation request.
    Reconfigure,
    /// Application event travelling upstream.
    CustomUpstream,
    /// Serialized application event travelling downstream.
    CustomDownstream,
    /// Sticky application event travelling downstream.
    CustomDownstreamSticky,
}

impl EventType {
    /// Flags classifying this type.
    pub fn flags(self) -> EventTypeFlags {
        use EventTypeFlags as F;
        match self {
            EventType::FlushStart => F::UPSTREAM | F::DOWNSTREAM,
            EventType::FlushStop => F::UPSTREAM | F::DOWNSTREAM | F::SERIALIZED,
            EventType::StreamStart
            | EventType::Caps
            | EventType::Segment
            | EventType::Tag
            | EventType::Eos
            | EventType::CustomDownstreamSticky => F::DOWNSTREAM | F::SERIALIZED | F::STICKY,
            EventType::Gap | EventType::CustomDownstream => F::DOWNSTREAM | F::SERIALIZED,
            EventType::Qos
            | EventType::Seek
            | EventType::Latency
            | EventType::Reconfigure
            | EventType::CustomUpstream => F::UPSTREAM,
        }
    }

    /// Slot of this type in a pad's sticky cache, `None` if not sticky.
    ///
    /// Slots are replayed in index order, so stream-start always precedes
    /// caps, caps precede segment, and EOS comes last of the standard types.
    pub fn sticky_index(self) -> Option<usize> {
        match self {
            EventType::StreamStart => Some(0),
            EventType::Caps => Some(1),
            EventType::Segment => Some(2),
            EventType::Tag => Some(3),
            EventType::Eos => Some(4),
            EventType::CustomDownstreamSticky => Some(5),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            EventType::FlushStart => "flush-start",
            EventType::FlushStop => "flush-stop",
            EventType::StreamStart => "stream-start",
            EventType::Caps => "caps",
            EventType::Segment => "segment",
            EventType::Tag => "tag",
            EventType::Eos => "eos",
            EventType::Gap => "gap",
            EventType::Qos => "qos",
            EventType::Seek => "seek",
            EventType::Latency => "latency",
            EventType::Reconfigure => "reconfigure",
            EventType::CustomUpstream => "custom-upstream",
            EventType::CustomDownstream => "custom-downstream",
            EventType::CustomDownstreamSticky => "custom-downstream-sticky",
        }
    }
}

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// See [`EventType::FlushStart`].
    FlushStart,
    /// See [`EventType::FlushStop`].
    FlushStop {
        /// Whether running time restarts at zero.
        reset_time: bool,
    },
    /// See [`EventType::StreamStart`].
    StreamStart {
        /// Identifier of the stream.
        stream_id: String,
    },
    /// See [`EventType::Caps`].
    Caps(Caps),
    /// See [`EventType::Segment`].
    Segment(Segment),
    /// See [`EventType::Tag`].
    Tag(TagList),
    /// See [`EventType::Eos`].
    Eos,
    /// See [`EventType::Gap`].
    Gap {
        /// Start of the gap in nanoseconds.
        timestamp: u64,
        /// Length of the gap in nanoseconds.
        duration: Option<u64>,
    },
    /// See [`EventType::Qos`].
    Qos {
        /// Long-term processing proportion.
        proportion: f64,
        /// Lateness of the reported buffer in nanoseconds.
        diff: i64,
        /// Timestamp of the reported buffer.
        timestamp: u64,
    },
    /// See [`EventType::Seek`].
    Seek {
        /// Requested rate.
        rate: f64,
        /// Unit of `start` and `stop`.
        format: SegmentFormat,
        /// New start position.
        start: i64,
        /// New stop position.
        stop: Option<i64>,
        /// Whether to flush the pipeline.
        flush: bool,
    },
    /// See [`EventType::Latency`].
    Latency {
        /// Pipeline latency in nanoseconds.
        latency: u64,
    },
    /// See [`EventType::Reconfigure`].
    Reconfigure,
    /// Application event; the type decides direction and stickiness.
    Custom {
        /// Direction/stickiness of the event.
        event_type: EventType,
        /// Application-defined name.
        name: String,
        /// Application-defined fields.
        fields: Vec<(String, String)>,
    },
}

#[derive(Debug)]
struct EventInner {
    kind: EventKind,
    seqnum: u32,
}

static NEXT_SEQNUM: AtomicU32 = AtomicU32::new(1);

/// A reference-counted, type-tagged event.
///
/// Cloning shares the event. The sticky cache compares identity (see
/// [`Event::ptr_eq`]), or sequence number and payload for rebuilt segments.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Wrap a payload, assigning a fresh sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self::with_seqnum(kind, NEXT_SEQNUM.fetch_add(1, Ordering::Relaxed))
    }

    fn with_seqnum(kind: EventKind, seqnum: u32) -> Self {
        Self {
            inner: Arc::new(EventInner { kind, seqnum }),
        }
    }

    /// Flush-start event.
    pub fn flush_start() -> Self {
        Self::new(EventKind::FlushStart)
    }

    /// Flush-stop event.
    pub fn flush_stop(reset_time: bool) -> Self {
        Self::new(EventKind::FlushStop { reset_time })
    }

    /// Stream-start event.
    pub fn stream_start(stream_id: impl Into<String>) -> Self {
        Self::new(EventKind::StreamStart {
            stream_id: stream_id.into(),
        })
    }

    /// Caps event.
    pub fn caps(caps: Caps) -> Self {
        Self::new(EventKind::Caps(caps))
    }

    /// Segment event.
    pub fn segment(segment: Segment) -> Self {
        Self::new(EventKind::Segment(segment))
    }

    /// Tag event.
    pub fn tag(tags: TagList) -> Self {
        Self::new(EventKind::Tag(tags))
    }

    /// End-of-stream event.
    pub fn eos() -> Self {
        Self::new(EventKind::Eos)
    }

    /// Gap event.
    pub fn gap(timestamp: u64, duration: Option<u64>) -> Self {
        Self::new(EventKind::Gap {
            timestamp,
            duration,
        })
    }

    /// Latency event.
    pub fn latency(latency: u64) -> Self {
        Self::new(EventKind::Latency { latency })
    }

    /// Reconfigure event.
    pub fn reconfigure() -> Self {
        Self::new(EventKind::Reconfigure)
    }

    /// Application event of the given custom type.
    ///
    /// Non-custom types fall back to [`EventType::CustomDownstream`].
    pub fn custom(event_type: EventType, name: impl Into<String>) -> Self {
        let event_type = match event_type {
            EventType::CustomUpstream
            | EventType::CustomDownstream
            | EventType::CustomDownstreamSticky => event_type,
            _ => EventType::CustomDownstream,
        };
        Self::new(EventKind::Custom {
            event_type,
            name: name.into(),
            fields: Vec::new(),
        })
    }

    /// Payload.
    pub fn kind(&self) -> &EventKind {
        &self.inner.kind
    }

    /// Type tag.
    pub fn event_type(&self) -> EventType {
        match &self.inner.kind {
            EventKind::FlushStart => EventType::FlushStart,
            EventKind::FlushStop { .. } => EventType::FlushStop,
            EventKind::StreamStart { .. } => EventType::StreamStart,
            EventKind::Caps(_) => EventType::Caps,
            EventKind::Segment(_) => EventType::Segment,
            EventKind::Tag(_) => EventType::Tag,
            EventKind::Eos => EventType::Eos,
            EventKind::Gap { .. } => EventType::Gap,
            EventKind::Qos { .. } => EventType::Qos,
            EventKind::Seek { .. } => EventType::Seek,
            EventKind::Latency { .. } => EventType::Latency,
            EventKind::Reconfigure => EventType::Reconfigure,
            EventKind::Custom { event_type, .. } => *event_type,
        }
    }

    /// Sequence number shared by events that belong together.
    pub fn seqnum(&self) -> u32 {
        self.inner.seqnum
    }

    /// Whether the event travels downstream.
    pub fn is_downstream(&self) -> bool {
        self.event_type().flags().contains(EventTypeFlags::DOWNSTREAM)
    }

    /// Whether the event travels upstream.
    pub fn is_upstream(&self) -> bool {
        self.event_type().flags().contains(EventTypeFlags::UPSTREAM)
    }

    /// Whether the event keeps its order relative to buffers.
    pub fn is_serialized(&self) -> bool {
        self.event_type().flags().contains(EventTypeFlags::SERIALIZED)
    }

    /// Whether the event is cached on pads.
    pub fn is_sticky(&self) -> bool {
        self.event_type().flags().contains(EventTypeFlags::STICKY)
    }

    /// Caps carried by a caps event.
    pub fn parse_caps(&self) -> Option<&Caps> {
        match &self.inner.kind {
            EventKind::Caps(caps) => Some(caps),
            _ => None,
        }
    }

    /// Segment carried by a segment event.
    pub fn parse_segment(&self) -> Option<&Segment> {
        match &self.inner.kind {
            EventKind::Segment(segment) => Some(segment),
            _ => None,
        }
    }

    /// Copy of a segment event with `offset` added to the segment base.
    ///
    /// Other events, and a zero offset, return the event unchanged.
    pub fn with_segment_offset(&self, offset: i64) -> Event {
        match &self.inner.kind {
            EventKind::Segment(segment) if offset != 0 => {
                let mut segment = *segment;
                segment.base = segment.base.saturating_add(offset);
                Self::with_seqnum(EventKind::Segment(segment), self.inner.seqnum)
            }
            _ => self.clone(),
        }
    }

    /// Whether two handles refer to the same event.
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to this event.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type().name())
            .field("seqnum", &self.inner.seqnum)
            .field("kind", &self.inner.kind)
            .finish()
    }
}
