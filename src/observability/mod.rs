//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters and gauges via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `padflow_buffers_pushed` | Counter | Buffers pushed out of source pads |
//! | `padflow_bytes_pushed` | Counter | Payload bytes pushed |
//! | `padflow_items_dropped` | Counter | Items dropped by probes |
//! | `padflow_events_forwarded` | Counter | Events handed to a peer |
//! | `padflow_flow_errors` | Counter | Failed push/pull calls by result |
//! | `padflow_blocked_pads` | Gauge | Pads currently blocked by probes |
//!
//! ## Tracing
//!
//! Log targets mirror the pad subsystems so they can be filtered
//! separately, e.g. `RUST_LOG=padflow::probes=trace,padflow::scheduling=debug`:
//!
//! - `padflow::pad`: activation, linking, task control
//! - `padflow::scheduling`: push, chain, pull, getrange
//! - `padflow::events`: event propagation and sticky events
//! - `padflow::caps`: caps queries and notifications
//! - `padflow::probes`: probe installation and dispatch
//!
//! ## Example
//!
//! ```rust,no_run
//! use padflow::observability::{TracingConfig, init_metrics, init_tracing};
//!
//! init_tracing(&TracingConfig::default());
//! init_metrics();
//! ```

pub mod metrics;
mod tracing_support;

pub use metrics::init_metrics;
pub use tracing_support::{TracingConfig, init_tracing, instrument_pad, span_pad};
