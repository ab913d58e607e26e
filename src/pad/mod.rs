//! Pads: the endpoints through which nodes exchange data.
//!
//! A [`Pad`] is a directional endpoint owned by a [`Node`]. A source pad is
//! linked to at most one sink pad and vice versa. Once linked and activated,
//! buffers flow downstream through [`Pad::push`] into the peer's chain
//! function, or are pulled upstream through [`Pad::pull_range`] from the
//! peer's getrange function. Events and queries travel in both directions.
//!
//! # Locking
//!
//! Each pad has two locks:
//!
//! - the **object lock**, a plain mutex guarding flags, peer, sticky events
//!   and probes. It is never held while user code runs.
//! - the **stream lock**, a reentrant lock held while the chain, getrange
//!   or serialized-event path runs, so one streaming thread at a time owns
//!   the pad.
//!
//! When both are needed the stream lock is taken first.
//!
//! # Flushing
//!
//! A pad starts out flushing and stays so until activated. While flushing,
//! data flow fails with [`FlowError::WrongState`]; flush-start events set the
//! state and wake threads blocked by probes, flush-stop clears it.
//!
//! # Example
//!
//! ```rust
//! use padflow::buffer::Buffer;
//! use padflow::flow::{FlowError, FlowSuccess};
//! use padflow::pad::{Pad, PadDirection};
//!
//! let src = Pad::new("src", PadDirection::Src);
//! let sink = Pad::builder("sink", PadDirection::Sink)
//!     .chain_function(|_pad, _buffer| Ok(FlowSuccess::Ok))
//!     .build();
//!
//! src.link(&sink).unwrap();
//! src.set_active(true).unwrap();
//! sink.set_active(true).unwrap();
//!
//! assert_eq!(src.push(Buffer::from_static(b"data")), Ok(FlowSuccess::Ok));
//!
//! assert!(src.unlink(&sink));
//! assert_eq!(src.push(Buffer::from_static(b"data")), Err(FlowError::NotLinked));
//! ```
//!
//! [`Node`]: crate::node::Node
//! [`FlowError::WrongState`]: crate::flow::FlowError::WrongState

mod activation;
mod dataflow;
mod event;
mod functions;
mod link;
mod probe;
mod query;
mod sticky;
mod stream_lock;
mod task;
mod template;

pub use functions::{
    ActivateFunction, ActivateModeFunction, ChainFunction, ChainListFunction, EventFunction,
    GetRangeFunction, InternalLinksFunction, LinkFunction, PadBuilder, PadFunctions,
    QueryFunction, UnlinkFunction,
};
pub use dataflow::PullResult;
pub use link::LinkCheck;
pub use probe::{ProbeData, ProbeId, ProbeInfo, ProbeReturn, ProbeType};
pub use stream_lock::{StreamLock, StreamLockGuard};
pub use task::TaskState;
pub use template::{PadDirection, PadPresence, PadTemplate};

use crate::caps::Caps;
use crate::error::{Error, Result};
use crate::node::{Node, NodeInner, NodeMessage};
use crate::observability::span_pad;
use bitflags::bitflags;
use parking_lot::{Condvar, Mutex, MutexGuard};
use probe::ProbeList;
use sticky::StickyEvents;
use std::sync::{Arc, Weak};
use task::Task;

/// Scheduling mode of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PadMode {
    /// Inactive.
    #[default]
    None,
    /// Data is pushed downstream.
    Push,
    /// Data is pulled from upstream.
    Pull,
}

bitflags! {
    /// State flags of a pad.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PadFlags: u32 {
        /// Data flow fails with `WrongState`.
        const FLUSHING = 1 << 0;
        /// At least one blocking probe is installed.
        const BLOCKED = 1 << 1;
        /// A thread is waiting on a blocking probe.
        const BLOCKING = 1 << 2;
        /// The pad should renegotiate.
        const NEED_RECONFIGURE = 1 << 3;
        /// Pending sticky events must be delivered before data.
        const NEED_EVENTS = 1 << 4;
        /// Caps queries prefer the negotiated caps.
        const FIXED_CAPS = 1 << 5;
        /// Caps handling is forwarded to internally linked pads.
        const PROXY_CAPS = 1 << 6;
    }
}

/// State guarded by the object lock.
pub(crate) struct PadState {
    pub(crate) mode: PadMode,
    pub(crate) flags: PadFlags,
    pub(crate) peer: Option<Weak<PadInner>>,
    pub(crate) parent: Weak<NodeInner>,
    pub(crate) offset: i64,
    pub(crate) events: StickyEvents,
    pub(crate) probes: ProbeList,
    /// Calls currently handing data to the peer; idle probes fire at zero.
    pub(crate) num_using: u32,
    pub(crate) task: Option<Task>,
}

impl PadState {
    pub(crate) fn peer(&self) -> Option<Pad> {
        self.peer
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Pad { inner })
    }

    pub(crate) fn peer_is(&self, other: &Pad) -> bool {
        self.peer
            .as_ref()
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(&other.inner)))
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flags.contains(PadFlags::FLUSHING)
    }
}

pub(crate) type ObjectGuard<'a> = MutexGuard<'a, PadState>;

type LinkedObserver = Arc<dyn Fn(&Pad, &Pad) + Send + Sync>;
type CapsObserver = Arc<dyn Fn(&Pad, &Caps) + Send + Sync>;

#[derive(Default)]
struct Observers {
    linked: Vec<LinkedObserver>,
    unlinked: Vec<LinkedObserver>,
    caps: Vec<CapsObserver>,
}

pub(crate) struct PadInner {
    name: String,
    direction: PadDirection,
    template: Option<Arc<PadTemplate>>,
    functions: PadFunctions,
    state: Mutex<PadState>,
    block_cond: Condvar,
    stream_lock: Arc<StreamLock>,
    observers: Mutex<Observers>,
}

/// A pad. Cheap to clone; clones refer to the same pad.
#[derive(Clone)]
pub struct Pad {
    inner: Arc<PadInner>,
}

impl Pad {
    /// Create a pad with default functions.
    pub fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        PadBuilder::new(name, direction).build()
    }

    /// Start building a pad.
    pub fn builder(name: impl Into<String>, direction: PadDirection) -> PadBuilder {
        PadBuilder::new(name, direction)
    }

    /// Start building a pad from a template.
    pub fn builder_from_template(
        template: Arc<PadTemplate>,
        name: impl Into<String>,
    ) -> PadBuilder {
        PadBuilder::from_template(template, name)
    }

    /// Create a pad from a template with default functions.
    pub fn from_template(template: Arc<PadTemplate>, name: impl Into<String>) -> Self {
        PadBuilder::from_template(template, name).build()
    }

    fn from_builder(builder: PadBuilder) -> Self {
        let PadBuilder {
            name,
            direction,
            template,
            flags,
            functions,
        } = builder;
        tracing::trace!(target: "padflow::pad", pad = %name, ?direction, "created pad");
        Self {
            inner: Arc::new(PadInner {
                name,
                direction,
                template,
                functions,
                state: Mutex::new(PadState {
                    mode: PadMode::None,
                    flags: flags | PadFlags::FLUSHING,
                    peer: None,
                    parent: Weak::new(),
                    offset: 0,
                    events: StickyEvents::default(),
                    probes: ProbeList::default(),
                    num_using: 0,
                    task: None,
                }),
                block_cond: Condvar::new(),
                stream_lock: Arc::new(StreamLock::new()),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    pub(crate) fn lock(&self) -> ObjectGuard<'_> {
        self.inner.state.lock()
    }

    pub(crate) fn functions(&self) -> &PadFunctions {
        &self.inner.functions
    }

    pub(crate) fn downgrade(&self) -> Weak<PadInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_weak(weak: &Weak<PadInner>) -> Option<Pad> {
        weak.upgrade().map(|inner| Pad { inner })
    }

    /// Wake every thread parked on a blocking probe.
    pub(crate) fn block_broadcast(&self) {
        self.inner.block_cond.notify_all();
    }

    pub(crate) fn block_wait(&self, state: &mut ObjectGuard<'_>) {
        self.inner.block_cond.wait(state);
    }

    pub(crate) fn span(&self) -> tracing::Span {
        let node = self.parent();
        span_pad(node.as_ref().map_or("", |n| n.name()), self.name())
    }

    /// Name of the pad.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Direction of the pad.
    pub fn direction(&self) -> PadDirection {
        self.inner.direction
    }

    /// Whether this is a source pad.
    pub fn is_src(&self) -> bool {
        self.inner.direction == PadDirection::Src
    }

    /// Whether this is a sink pad.
    pub fn is_sink(&self) -> bool {
        self.inner.direction == PadDirection::Sink
    }

    /// Template the pad was created from.
    pub fn template(&self) -> Option<&Arc<PadTemplate>> {
        self.inner.template.as_ref()
    }

    /// Caps of the template, or any caps without a template.
    pub fn template_caps(&self) -> Caps {
        self.inner
            .template
            .as_ref()
            .map_or_else(Caps::any, |t| t.caps.clone())
    }

    /// Owning node.
    pub fn parent(&self) -> Option<Node> {
        self.lock().parent.upgrade().map(Node::from_inner)
    }

    pub(crate) fn set_parent(&self, node: &Node) -> Result<()> {
        let mut state = self.lock();
        if state.parent.upgrade().is_some() {
            return Err(Error::AlreadyParented {
                pad: self.name().to_string(),
            });
        }
        state.parent = node.downgrade();
        Ok(())
    }

    pub(crate) fn clear_parent(&self) {
        self.lock().parent = Weak::new();
    }

    /// `"node:pad"`, or just the pad name without a parent.
    pub fn debug_name(&self) -> String {
        match self.parent() {
            Some(node) => format!("{}:{}", node.name(), self.name()),
            None => self.name().to_string(),
        }
    }

    pub(crate) fn post_message(&self, message: NodeMessage) {
        if let Some(node) = self.parent() {
            node.post_message(message);
        }
    }

    /// Current peer.
    pub fn peer(&self) -> Option<Pad> {
        self.lock().peer()
    }

    /// Whether the pad has a peer.
    pub fn is_linked(&self) -> bool {
        self.peer().is_some()
    }

    /// Current scheduling mode.
    pub fn mode(&self) -> PadMode {
        self.lock().mode
    }

    /// Whether the pad is active in push or pull mode.
    pub fn is_active(&self) -> bool {
        self.mode() != PadMode::None
    }

    /// Current flags.
    pub fn flags(&self) -> PadFlags {
        self.lock().flags
    }

    /// Whether the pad is flushing.
    pub fn is_flushing(&self) -> bool {
        self.lock().is_flushing()
    }

    /// Whether a blocking probe is installed.
    pub fn is_blocked(&self) -> bool {
        self.lock().flags.contains(PadFlags::BLOCKED)
    }

    /// Whether a thread is currently waiting on a blocking probe.
    pub fn is_blocking(&self) -> bool {
        let flags = self.lock().flags;
        flags.contains(PadFlags::BLOCKING) && !flags.contains(PadFlags::FLUSHING)
    }

    /// Test and clear the reconfigure flag.
    pub fn check_reconfigure(&self) -> bool {
        let mut state = self.lock();
        let needed = state.flags.contains(PadFlags::NEED_RECONFIGURE);
        state.flags.remove(PadFlags::NEED_RECONFIGURE);
        needed
    }

    /// Whether the reconfigure flag is set, without clearing it.
    pub fn needs_reconfigure(&self) -> bool {
        self.lock().flags.contains(PadFlags::NEED_RECONFIGURE)
    }

    /// Set the reconfigure flag.
    pub fn mark_reconfigure(&self) {
        self.lock().flags.insert(PadFlags::NEED_RECONFIGURE);
    }

    /// Running-time offset applied to segments passing this pad.
    pub fn offset(&self) -> i64 {
        self.lock().offset
    }

    /// The stream lock, for node implementations serializing with streaming.
    pub fn stream_lock(&self) -> StreamLockGuard<'_> {
        self.inner.stream_lock.lock()
    }

    pub(crate) fn stream_lock_handle(&self) -> &Arc<StreamLock> {
        &self.inner.stream_lock
    }

    /// Observe successful links. The callback gets this pad and its new peer.
    pub fn connect_linked<F>(&self, f: F)
    where
        F: Fn(&Pad, &Pad) + Send + Sync + 'static,
    {
        self.inner.observers.lock().linked.push(Arc::new(f));
    }

    /// Observe unlinks. The callback gets this pad and its former peer.
    pub fn connect_unlinked<F>(&self, f: F)
    where
        F: Fn(&Pad, &Pad) + Send + Sync + 'static,
    {
        self.inner.observers.lock().unlinked.push(Arc::new(f));
    }

    /// Observe changes of the negotiated caps.
    pub fn connect_caps_notify<F>(&self, f: F)
    where
        F: Fn(&Pad, &Caps) + Send + Sync + 'static,
    {
        self.inner.observers.lock().caps.push(Arc::new(f));
    }

    pub(crate) fn emit_linked(&self, peer: &Pad) {
        let observers = self.inner.observers.lock().linked.clone();
        for observer in observers {
            observer(self, peer);
        }
    }

    pub(crate) fn emit_unlinked(&self, peer: &Pad) {
        let observers = self.inner.observers.lock().unlinked.clone();
        for observer in observers {
            observer(self, peer);
        }
    }

    pub(crate) fn emit_caps_notify(&self, caps: &Caps) {
        tracing::debug!(target: "padflow::caps", pad = %self.name(), %caps, "caps changed");
        let observers = self.inner.observers.lock().caps.clone();
        for observer in observers {
            observer(self, caps);
        }
    }
}

impl PartialEq for Pad {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Pad {}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.inner.name)
            .field("direction", &self.inner.direction)
            .finish_non_exhaustive()
    }
}

impl Drop for PadInner {
    fn drop(&mut self) {
        let this: *const PadInner = self;
        let state = self.state.get_mut();
        if let Some(peer) = state.peer.take().and_then(|w| w.upgrade()) {
            tracing::warn!(target: "padflow::pad", pad = %self.name, "disposing pad that is still linked");
            let mut peer_state = peer.state.lock();
            let points_here = peer_state
                .peer
                .as_ref()
                .is_some_and(|w| std::ptr::eq(w.as_ptr(), this));
            if points_here {
                peer_state.peer = None;
            }
        }
        if let Some(task) = state.task.take() {
            task.shutdown();
        }
        state.events.clear();
        if state.clear_probes() {
            tracing::debug!(target: "padflow::pad", pad = %self.name, "disposed pad was blocked");
        }
        tracing::trace!(target: "padflow::pad", pad = %self.name, "disposed pad");
    }
}
