//! Synchronous queries answered by pads.
//!
//! A query is passed by mutable reference: the answering pad fills in the
//! result fields and returns `true`. Ownership never moves, so a query can
//! bounce through several pads and come back to its sender.

use crate::caps::Caps;
use crate::event::SegmentFormat;

/// Scheduling modes a pad can offer its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SchedulingModes {
    /// The peer may push into this pad.
    pub push: bool,
    /// The peer may pull from this pad.
    pub pull: bool,
}

/// Payload and result fields of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Which caps can the pad produce or consume?
    Caps {
        /// Restrict the answer to these caps.
        filter: Option<Caps>,
        /// Answer.
        result: Option<Caps>,
    },
    /// Would the pad accept these caps?
    AcceptCaps {
        /// Caps to check.
        caps: Caps,
        /// Answer.
        result: bool,
    },
    /// Current stream position.
    Position {
        /// Requested unit.
        format: SegmentFormat,
        /// Answer.
        position: Option<i64>,
    },
    /// Stream duration.
    Duration {
        /// Requested unit.
        format: SegmentFormat,
        /// Answer.
        duration: Option<i64>,
    },
    /// Latency of the path to this pad.
    Latency {
        /// Whether the path is live.
        live: bool,
        /// Minimum latency in nanoseconds.
        min: u64,
        /// Maximum latency in nanoseconds, `None` if unbounded.
        max: Option<u64>,
    },
    /// Which scheduling modes the peer supports.
    Scheduling {
        /// Answer.
        modes: SchedulingModes,
    },
    /// Application query.
    Custom {
        /// Application-defined name.
        name: String,
        /// Answer.
        answer: Option<String>,
    },
}

/// A query, answered in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    kind: QueryKind,
}

impl Query {
    /// Wrap a payload.
    pub fn new(kind: QueryKind) -> Self {
        Self { kind }
    }

    /// Caps query, optionally filtered.
    pub fn new_caps(filter: Option<Caps>) -> Self {
        Self::new(QueryKind::Caps {
            filter,
            result: None,
        })
    }

    /// Accept-caps query.
    pub fn new_accept_caps(caps: Caps) -> Self {
        Self::new(QueryKind::AcceptCaps {
            caps,
            result: false,
        })
    }

    /// Position query.
    pub fn new_position(format: SegmentFormat) -> Self {
        Self::new(QueryKind::Position {
            format,
            position: None,
        })
    }

    /// Duration query.
    pub fn new_duration(format: SegmentFormat) -> Self {
        Self::new(QueryKind::Duration {
            format,
            duration: None,
        })
    }

    /// Latency query.
    pub fn new_latency() -> Self {
        Self::new(QueryKind::Latency {
            live: false,
            min: 0,
            max: None,
        })
    }

    /// Scheduling query.
    pub fn new_scheduling() -> Self {
        Self::new(QueryKind::Scheduling {
            modes: SchedulingModes::default(),
        })
    }

    /// Application query.
    pub fn new_custom(name: impl Into<String>) -> Self {
        Self::new(QueryKind::Custom {
            name: name.into(),
            answer: None,
        })
    }

    /// Payload.
    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Mutable payload, for answering.
    pub fn kind_mut(&mut self) -> &mut QueryKind {
        &mut self.kind
    }

    /// Human-readable name of the query type.
    pub fn name(&self) -> &'static str {
        match self.kind {
            QueryKind::Caps { .. } => "caps",
            QueryKind::AcceptCaps { .. } => "accept-caps",
            QueryKind::Position { .. } => "position",
            QueryKind::Duration { .. } => "duration",
            QueryKind::Latency { .. } => "latency",
            QueryKind::Scheduling { .. } => "scheduling",
            QueryKind::Custom { .. } => "custom",
        }
    }

    /// Answer of a caps query.
    pub fn caps_result(&self) -> Option<&Caps> {
        match &self.kind {
            QueryKind::Caps { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Set the answer of a caps query. Ignored for other query types.
    pub fn set_caps_result(&mut self, caps: Caps) {
        if let QueryKind::Caps { result, .. } = &mut self.kind {
            *result = Some(caps);
        }
    }

    /// Answer of an accept-caps query.
    pub fn accept_caps_result(&self) -> Option<bool> {
        match &self.kind {
            QueryKind::AcceptCaps { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Set the answer of an accept-caps query. Ignored for other query types.
    pub fn set_accept_caps_result(&mut self, accepted: bool) {
        if let QueryKind::AcceptCaps { result, .. } = &mut self.kind {
            *result = accepted;
        }
    }
}
