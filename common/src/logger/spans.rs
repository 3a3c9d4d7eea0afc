use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Create a root span for a request / sweep / recovery pass.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        slot_id = field::Empty,
        reservation_id = field::Empty
    )
}

/// Create a child span (inherits trace_id from the parent).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        slot_id = field::Empty,
        reservation_id = field::Empty
    )
}

/// Fill in the booking identifiers on the current span once they are known.
pub fn annotate_span(slot_id: Option<i64>, reservation_id: Option<&dyn std::fmt::Display>) {
    let span = Span::current();
    if let Some(sid) = slot_id {
        span.record("slot_id", sid);
    }
    if let Some(rid) = reservation_id {
        span.record("reservation_id", field::display(rid));
    }
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
