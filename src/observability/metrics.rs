//! Metrics recorded by the pad core.

use metrics::{Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const BUFFERS_PUSHED: &str = "padflow_buffers_pushed";
const BYTES_PUSHED: &str = "padflow_bytes_pushed";
const ITEMS_DROPPED: &str = "padflow_items_dropped";
const EVENTS_FORWARDED: &str = "padflow_events_forwarded";
const FLOW_ERRORS: &str = "padflow_flow_errors";
const BLOCKED_PADS: &str = "padflow_blocked_pads";

/// Describe all metrics.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        BUFFERS_PUSHED,
        Unit::Count,
        "Buffers pushed out of source pads"
    );
    metrics::describe_counter!(BYTES_PUSHED, Unit::Bytes, "Payload bytes pushed");
    metrics::describe_counter!(ITEMS_DROPPED, Unit::Count, "Items dropped by probes");
    metrics::describe_counter!(
        EVENTS_FORWARDED,
        Unit::Count,
        "Events handed from a pad to its peer"
    );
    metrics::describe_counter!(
        FLOW_ERRORS,
        Unit::Count,
        "Push and pull calls that returned an error"
    );
    metrics::describe_gauge!(
        BLOCKED_PADS,
        Unit::Count,
        "Pads currently blocked by blocking probes"
    );
}

/// Record a buffer pushed out of `pad`.
#[inline]
pub fn record_buffer_pushed(pad: &str, bytes: usize) {
    counter!(BUFFERS_PUSHED, "pad" => pad.to_string()).increment(1);
    counter!(BYTES_PUSHED, "pad" => pad.to_string()).increment(bytes as u64);
}

/// Record an item dropped by a probe on `pad`.
#[inline]
pub fn record_item_dropped(pad: &str) {
    counter!(ITEMS_DROPPED, "pad" => pad.to_string()).increment(1);
}

/// Record an event forwarded from `pad` to its peer.
#[inline]
pub fn record_event_forwarded(pad: &str, event: &'static str) {
    counter!(EVENTS_FORWARDED, "pad" => pad.to_string(), "event" => event).increment(1);
}

/// Record a failed push or pull on `pad`.
#[inline]
pub fn record_flow_error(pad: &str, result: &'static str) {
    counter!(FLOW_ERRORS, "pad" => pad.to_string(), "result" => result).increment(1);
}

/// Record a pad entering (`true`) or leaving (`false`) the blocked state.
#[inline]
pub fn record_blocked(blocked: bool) {
    let gauge = gauge!(BLOCKED_PADS);
    if blocked {
        gauge.increment(1.0);
    } else {
        gauge.decrement(1.0);
    }
}
