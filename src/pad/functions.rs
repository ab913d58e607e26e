//! Per-pad function table and the builder that fills it.
//!
//! Every pad carries a [`PadFunctions`] table fixed at construction. Empty
//! slots fall back to the built-in behavior: activation defaults to push
//! mode, events and queries go to [`Pad::event_default`] and
//! [`Pad::query_default`], lists are chained buffer by buffer, and internal
//! links are the owning node's pads of the opposite direction.

use super::{Pad, PadDirection, PadFlags, PadTemplate};
use crate::buffer::{Buffer, BufferList};
use crate::error::Result;
use crate::event::Event;
use crate::flow::{FlowError, FlowResult, LinkResult};
use crate::query::Query;
use std::sync::Arc;

/// Activates a pad in its preferred mode.
pub type ActivateFunction = Arc<dyn Fn(&Pad) -> Result<()> + Send + Sync>;
/// Prepares a pad for (de)activation in push or pull mode.
pub type ActivateModeFunction = Arc<dyn Fn(&Pad, bool) -> Result<()> + Send + Sync>;
/// Receives a buffer on a sink pad.
pub type ChainFunction = Arc<dyn Fn(&Pad, Buffer) -> FlowResult + Send + Sync>;
/// Receives a buffer list on a sink pad.
pub type ChainListFunction = Arc<dyn Fn(&Pad, BufferList) -> FlowResult + Send + Sync>;
/// Produces `size` bytes at `offset` on a source pad.
pub type GetRangeFunction =
    Arc<dyn Fn(&Pad, u64, u32) -> std::result::Result<Buffer, FlowError> + Send + Sync>;
/// Handles an event; `true` when handled.
pub type EventFunction = Arc<dyn Fn(&Pad, Event) -> bool + Send + Sync>;
/// Answers a query in place; `true` when answered.
pub type QueryFunction = Arc<dyn Fn(&Pad, &mut Query) -> bool + Send + Sync>;
/// Lists the pads internally linked to a pad.
pub type InternalLinksFunction = Arc<dyn Fn(&Pad) -> Vec<Pad> + Send + Sync>;
/// Called when a pad gets linked to a peer.
pub type LinkFunction = Arc<dyn Fn(&Pad, &Pad) -> LinkResult + Send + Sync>;
/// Called when a pad is unlinked.
pub type UnlinkFunction = Arc<dyn Fn(&Pad) + Send + Sync>;

/// Function table of a pad.
#[derive(Clone, Default)]
pub struct PadFunctions {
    pub(crate) activate: Option<ActivateFunction>,
    pub(crate) activate_push: Option<ActivateModeFunction>,
    pub(crate) activate_pull: Option<ActivateModeFunction>,
    pub(crate) chain: Option<ChainFunction>,
    pub(crate) chain_list: Option<ChainListFunction>,
    pub(crate) getrange: Option<GetRangeFunction>,
    pub(crate) event: Option<EventFunction>,
    pub(crate) query: Option<QueryFunction>,
    pub(crate) internal_links: Option<InternalLinksFunction>,
    pub(crate) link: Option<LinkFunction>,
    pub(crate) unlink: Option<UnlinkFunction>,
}

impl std::fmt::Debug for PadFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadFunctions")
            .field("activate", &self.activate.is_some())
            .field("activate_push", &self.activate_push.is_some())
            .field("activate_pull", &self.activate_pull.is_some())
            .field("chain", &self.chain.is_some())
            .field("chain_list", &self.chain_list.is_some())
            .field("getrange", &self.getrange.is_some())
            .field("event", &self.event.is_some())
            .field("query", &self.query.is_some())
            .field("internal_links", &self.internal_links.is_some())
            .field("link", &self.link.is_some())
            .field("unlink", &self.unlink.is_some())
            .finish()
    }
}

/// Builder for [`Pad`].
///
/// # Example
///
/// ```rust
/// use padflow::flow::FlowSuccess;
/// use padflow::pad::{Pad, PadDirection};
///
/// let sink = Pad::builder("sink", PadDirection::Sink)
///     .chain_function(|_pad, buffer| {
///         assert!(!buffer.is_empty());
///         Ok(FlowSuccess::Ok)
///     })
///     .build();
/// assert!(sink.is_sink());
/// ```
#[must_use]
pub struct PadBuilder {
    pub(crate) name: String,
    pub(crate) direction: PadDirection,
    pub(crate) template: Option<Arc<PadTemplate>>,
    pub(crate) flags: PadFlags,
    pub(crate) functions: PadFunctions,
}

impl PadBuilder {
    pub(crate) fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            template: None,
            flags: PadFlags::empty(),
            functions: PadFunctions::default(),
        }
    }

    pub(crate) fn from_template(template: Arc<PadTemplate>, name: impl Into<String>) -> Self {
        let mut builder = Self::new(name, template.direction);
        builder.template = Some(template);
        builder
    }

    /// Answer caps queries with the negotiated caps once there are some.
    pub fn fixed_caps(mut self) -> Self {
        self.flags.insert(PadFlags::FIXED_CAPS);
        self
    }

    /// Forward caps events and caps queries to internally linked pads.
    pub fn proxy_caps(mut self) -> Self {
        self.flags.insert(PadFlags::PROXY_CAPS);
        self
    }

    /// Set the activation function.
    pub fn activate_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad) -> Result<()> + Send + Sync + 'static,
    {
        self.functions.activate = Some(Arc::new(f));
        self
    }

    /// Set the push-mode activation function.
    pub fn activate_push_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, bool) -> Result<()> + Send + Sync + 'static,
    {
        self.functions.activate_push = Some(Arc::new(f));
        self
    }

    /// Set the pull-mode activation function.
    pub fn activate_pull_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, bool) -> Result<()> + Send + Sync + 'static,
    {
        self.functions.activate_pull = Some(Arc::new(f));
        self
    }

    /// Set the chain function.
    pub fn chain_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, Buffer) -> FlowResult + Send + Sync + 'static,
    {
        self.functions.chain = Some(Arc::new(f));
        self
    }

    /// Set the chain-list function.
    pub fn chain_list_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, BufferList) -> FlowResult + Send + Sync + 'static,
    {
        self.functions.chain_list = Some(Arc::new(f));
        self
    }

    /// Set the getrange function.
    pub fn getrange_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, u64, u32) -> std::result::Result<Buffer, FlowError> + Send + Sync + 'static,
    {
        self.functions.getrange = Some(Arc::new(f));
        self
    }

    /// Set the event function.
    pub fn event_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, Event) -> bool + Send + Sync + 'static,
    {
        self.functions.event = Some(Arc::new(f));
        self
    }

    /// Set the query function.
    pub fn query_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, &mut Query) -> bool + Send + Sync + 'static,
    {
        self.functions.query = Some(Arc::new(f));
        self
    }

    /// Set the internal-links function.
    pub fn internal_links_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad) -> Vec<Pad> + Send + Sync + 'static,
    {
        self.functions.internal_links = Some(Arc::new(f));
        self
    }

    /// Set the link function.
    pub fn link_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad, &Pad) -> LinkResult + Send + Sync + 'static,
    {
        self.functions.link = Some(Arc::new(f));
        self
    }

    /// Set the unlink function.
    pub fn unlink_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Pad) + Send + Sync + 'static,
    {
        self.functions.unlink = Some(Arc::new(f));
        self
    }

    /// Create the pad.
    pub fn build(self) -> Pad {
        Pad::from_builder(self)
    }
}
