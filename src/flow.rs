//! Flow and link results.
//!
//! Every data-flow operation on a pad (`push`, `chain`, `pull_range`, ...)
//! reports a [`FlowResult`]. The success side distinguishes a plain `Ok`
//! from [`FlowSuccess::CustomSuccess`], which a probe produces when it
//! drops the item. The public push/pull boundary folds `CustomSuccess` back
//! into `Ok`, so callers only ever see it from their own chain functions.
//!
//! Linking has its own, disjoint taxonomy in [`LinkError`].

use thiserror::Error;

/// Successful outcome of a data-flow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowSuccess {
    /// The item was accepted.
    #[default]
    Ok,
    /// The item was consumed without reaching its destination.
    ///
    /// Probes return this when they drop an item.
    CustomSuccess,
}

/// Failed outcome of a data-flow operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowError {
    /// The pad has no peer.
    #[error("not linked")]
    NotLinked,
    /// The pad is flushing or inactive.
    #[error("wrong state (flushing)")]
    WrongState,
    /// Caps could not be agreed on.
    #[error("not negotiated")]
    NotNegotiated,
    /// Fatal error; the node posted details to its parent.
    #[error("error")]
    Error,
    /// The pad lacks the function needed for this operation.
    #[error("not supported")]
    NotSupported,
    /// End of stream was reached.
    #[error("end of stream")]
    Eos,
    /// Node-specific failure.
    #[error("custom error")]
    CustomError,
}

/// Result of a data-flow operation.
pub type FlowResult = Result<FlowSuccess, FlowError>;

/// Short name of a flow result, used in log fields.
pub fn flow_name(result: &FlowResult) -> &'static str {
    match result {
        Ok(FlowSuccess::Ok) => "ok",
        Ok(FlowSuccess::CustomSuccess) => "custom-success",
        Err(FlowError::NotLinked) => "not-linked",
        Err(FlowError::WrongState) => "wrong-state",
        Err(FlowError::NotNegotiated) => "not-negotiated",
        Err(FlowError::Error) => "error",
        Err(FlowError::NotSupported) => "not-supported",
        Err(FlowError::Eos) => "eos",
        Err(FlowError::CustomError) => "custom-error",
    }
}

/// Failed outcome of a link operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkError {
    /// One of the pads already has a peer, or the link changed while the
    /// link functions ran.
    #[error("pad was already linked")]
    WasLinked,
    /// The pads' owners do not share a parent.
    #[error("pads have no common grandparent")]
    WrongHierarchy,
    /// The pads' capabilities do not intersect.
    #[error("pads have no common format")]
    NoFormat,
    /// Source and sink were swapped or share a direction.
    #[error("pads have wrong direction")]
    WrongDirection,
    /// A link function refused the link.
    #[error("link refused")]
    Refused,
}

/// Result of a link operation.
pub type LinkResult = Result<(), LinkError>;
