//! # padflow
//!
//! The pad layer of a streaming media framework: the endpoints through
//! which processing nodes are connected and exchange buffers, events and
//! queries.
//!
//! ## Features
//!
//! - **Linking**: source/sink pads with hierarchy and caps checks
//! - **Push and pull scheduling**: chain and getrange functions, buffer lists
//! - **Sticky events**: stream-start, caps, segment and friends replayed
//!   before data, with running-time offsets
//! - **Probes**: blocking, idle and data probes at every checkpoint
//! - **Flushing**: cooperative cancellation of in-flight data flow
//! - **Pad tasks**: a worker thread per pad running under the stream lock
//!
//! ## Quick Start
//!
//! ```rust
//! use padflow::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink_received = received.clone();
//!
//! let src = Pad::new("src", PadDirection::Src);
//! let sink = Pad::builder("sink", PadDirection::Sink)
//!     .chain_function(move |_pad, buffer| {
//!         sink_received.lock().unwrap().push(buffer);
//!         Ok(FlowSuccess::Ok)
//!     })
//!     .build();
//!
//! src.link(&sink)?;
//! src.set_active(true)?;
//! sink.set_active(true)?;
//!
//! assert!(src.push_event(Event::stream_start("demo")));
//! assert!(src.set_caps(Caps::new("application/octet-stream")));
//! src.push(Buffer::from_static(b"hello"))?;
//!
//! assert_eq!(received.lock().unwrap().len(), 1);
//! assert_eq!(sink.current_caps(), Some(Caps::new("application/octet-stream")));
//! # Ok::<(), padflow::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod caps;
pub mod config;
pub mod error;
pub mod event;
pub mod flow;
pub mod node;
pub mod observability;
pub mod pad;
pub mod query;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{Buffer, BufferList};
    pub use crate::caps::Caps;
    pub use crate::error::{Error, Result};
    pub use crate::event::{Event, EventType, Segment};
    pub use crate::flow::{FlowError, FlowResult, FlowSuccess, LinkError, LinkResult};
    pub use crate::node::{Node, NodeMessage};
    pub use crate::pad::{
        Pad, PadDirection, PadFlags, PadMode, PadTemplate, ProbeInfo, ProbeReturn, ProbeType,
    };
    pub use crate::query::Query;
}

pub use error::{Error, Result};
