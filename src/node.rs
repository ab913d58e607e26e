//! Owning nodes.
//!
//! A [`Node`] owns pads and sits in a tree of nodes. Pads only use it for
//! three things: the hierarchy check when linking, the default set of
//! internally linked pads, and as the destination of [`NodeMessage`]s
//! (structure changes, task status, errors). Messages bubble up the tree, so
//! a handler on the top-level node sees everything.

use crate::error::{Error, Result};
use crate::pad::{Pad, PadDirection};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Kind of structure change announced around link and unlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureChange {
    /// Pads are being linked.
    PadLink,
    /// Pads are being unlinked.
    PadUnlink,
}

/// Status of a pad's background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    /// The task was created.
    Create,
    /// The worker thread started running.
    Enter,
    /// The worker thread is exiting.
    Leave,
}

/// Message posted by a pad to its owning node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMessage {
    /// A link or unlink is starting (`busy`) or has finished.
    StructureChange {
        /// Link or unlink.
        change: StructureChange,
        /// Name of the pad being (un)linked.
        pad: String,
        /// Whether the change is in progress.
        busy: bool,
    },
    /// A pad task changed status.
    StreamStatus {
        /// New status.
        status: StreamStatus,
        /// Name of the pad owning the task.
        pad: String,
    },
    /// A pad hit a fatal error.
    Error {
        /// Name of the pad.
        pad: String,
        /// Description.
        message: String,
    },
}

type MessageHandler = Arc<dyn Fn(&Node, &NodeMessage) + Send + Sync>;

pub(crate) struct NodeInner {
    name: String,
    parent: Mutex<Weak<NodeInner>>,
    pads: Mutex<Vec<Pad>>,
    handlers: Mutex<Vec<MessageHandler>>,
}

/// A node owning pads. Cheap to clone.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a standalone node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                name: name.into(),
                parent: Mutex::new(Weak::new()),
                pads: Mutex::new(Vec::new()),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner> {
        Arc::downgrade(&self.inner)
    }

    /// Name of the node.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.lock().upgrade().map(Node::from_inner)
    }

    /// Place this node inside `parent`.
    pub fn set_parent(&self, parent: &Node) -> Result<()> {
        if Arc::ptr_eq(&self.inner, &parent.inner) {
            return Err(Error::misuse(self.name(), "a node cannot be its own parent"));
        }
        let mut slot = self.inner.parent.lock();
        if slot.upgrade().is_some() {
            return Err(Error::misuse(self.name(), "node already has a parent"));
        }
        *slot = Arc::downgrade(&parent.inner);
        Ok(())
    }

    /// Add a pad to this node.
    pub fn add_pad(&self, pad: &Pad) -> Result<()> {
        pad.set_parent(self)?;
        self.inner.pads.lock().push(pad.clone());
        tracing::debug!(target: "padflow::pad", node = %self.name(), pad = %pad.name(), "added pad");
        Ok(())
    }

    /// Remove a pad from this node. Returns `false` if it was not there.
    pub fn remove_pad(&self, pad: &Pad) -> bool {
        let mut pads = self.inner.pads.lock();
        let Some(pos) = pads.iter().position(|p| p == pad) else {
            return false;
        };
        pads.remove(pos);
        drop(pads);
        pad.clear_parent();
        true
    }

    /// All pads, in insertion order.
    pub fn pads(&self) -> Vec<Pad> {
        self.inner.pads.lock().clone()
    }

    /// Pads with the given direction.
    pub fn pads_with_direction(&self, direction: PadDirection) -> Vec<Pad> {
        self.inner
            .pads
            .lock()
            .iter()
            .filter(|p| p.direction() == direction)
            .cloned()
            .collect()
    }

    /// Find a pad by name.
    pub fn pad(&self, name: &str) -> Option<Pad> {
        self.inner.pads.lock().iter().find(|p| p.name() == name).cloned()
    }

    /// Register a message handler. Handlers see messages posted on this
    /// node and on all its descendants.
    pub fn connect_message<F>(&self, handler: F)
    where
        F: Fn(&Node, &NodeMessage) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().push(Arc::new(handler));
    }

    /// Deliver `message` to this node's handlers, then to its ancestors'.
    ///
    /// Handlers receive the node the message was originally posted on.
    pub fn post_message(&self, message: NodeMessage) {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let handlers = node.inner.handlers.lock().clone();
            for handler in handlers {
                handler(self, &message);
            }
            current = node.parent();
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("name", &self.inner.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parent_chain() {
        let bin = Node::new("bin");
        let child = Node::new("child");
        child.set_parent(&bin).unwrap();
        assert_eq!(child.parent(), Some(bin.clone()));
        assert!(child.set_parent(&bin).is_err());
        assert!(bin.set_parent(&bin).is_err());
    }

    #[test]
    fn test_messages_bubble_up() {
        let bin = Node::new("bin");
        let child = Node::new("child");
        child.set_parent(&bin).unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        bin.connect_message(move |origin, msg| {
            assert_eq!(origin.name(), "child");
            assert!(matches!(msg, NodeMessage::Error { .. }));
            s.fetch_add(1, Ordering::SeqCst);
        });
        let s = seen.clone();
        child.connect_message(move |_, _| {
            s.fetch_add(10, Ordering::SeqCst);
        });

        child.post_message(NodeMessage::Error {
            pad: "sink".into(),
            message: "boom".into(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_pads_by_direction() {
        let node = Node::new("demux");
        let sink = Pad::new("sink", PadDirection::Sink);
        let src0 = Pad::new("src_0", PadDirection::Src);
        let src1 = Pad::new("src_1", PadDirection::Src);
        for pad in [&sink, &src0, &src1] {
            node.add_pad(pad).unwrap();
        }
        assert_eq!(node.pads_with_direction(PadDirection::Src).len(), 2);
        assert_eq!(node.pad("sink"), Some(sink.clone()));
        assert_eq!(sink.parent(), Some(node.clone()));

        // A pad belongs to one node at a time.
        let other = Node::new("other");
        assert!(other.add_pad(&sink).is_err());

        assert!(node.remove_pad(&sink));
        assert!(sink.parent().is_none());
        assert!(!node.remove_pad(&sink));
    }
}
