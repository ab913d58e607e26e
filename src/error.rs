//! Error types for padflow.

use crate::flow::{FlowError, LinkError};
use crate::pad::PadMode;
use thiserror::Error;

/// Result type alias using padflow's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for operations that are not part of the data flow.
///
/// Data flow reports [`FlowError`] and linking reports [`LinkError`]; both
/// convert into this type so callers can use `?` across the API.
#[derive(Error, Debug)]
pub enum Error {
    /// The pad could not switch to the requested scheduling mode.
    #[error("pad {pad}: failed to {verb} in {mode:?} mode", verb = activation_verb(.active))]
    Activation {
        /// Name of the pad.
        pad: String,
        /// Mode that was requested.
        mode: PadMode,
        /// Whether activation or deactivation was requested.
        active: bool,
    },

    /// The activation function of a pad refused the request.
    #[error("activation refused: {0}")]
    ActivationRefused(String),

    /// A pad operation was called in a way its direction or state forbids.
    #[error("pad {pad}: {reason}")]
    Misuse {
        /// Name of the pad.
        pad: String,
        /// What went wrong.
        reason: String,
    },

    /// The pad already belongs to a node.
    #[error("pad {pad} already has a parent")]
    AlreadyParented {
        /// Name of the pad.
        pad: String,
    },

    /// Task control failed.
    #[error("task error on pad {pad}: {reason}")]
    Task {
        /// Name of the pad owning the task.
        pad: String,
        /// What went wrong.
        reason: String,
    },

    /// Flow error bubbled up from a data-flow operation.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Link error bubbled up from a link operation.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// I/O error (spawning worker threads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn activation_verb(active: &bool) -> &'static str {
    if *active { "activate" } else { "deactivate" }
}

impl Error {
    pub(crate) fn misuse(pad: &str, reason: impl Into<String>) -> Self {
        Self::Misuse {
            pad: pad.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn task(pad: &str, reason: impl Into<String>) -> Self {
        Self::Task {
            pad: pad.to_string(),
            reason: reason.into(),
        }
    }
}
