//! Binary trace context codec, as carried in the `grpc-trace-bin` metadata
//! entry of a gRPC hop.
//!
//! The encoded form is exactly 29 bytes: a version octet (`0`), then three
//! tagged fields in fixed order — field `0` followed by the 16-byte trace id,
//! field `1` followed by the 8-byte span id, and field `2` followed by a
//! one-byte options word whose bit 0 is the sampled flag.

use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

const VERSION: u8 = 0;
const TRACE_ID_FIELD: u8 = 0;
const SPAN_ID_FIELD: u8 = 1;
const OPTIONS_FIELD: u8 = 2;

/// Length of an encoded trace context.
pub const ENCODED_LEN: usize = 29;

/// Encode a span context, or `None` when the context is invalid and not
/// worth propagating.
pub fn encode(span_context: &SpanContext) -> Option<[u8; ENCODED_LEN]> {
    if !span_context.is_valid() {
        return None;
    }

    let mut buf = [0u8; ENCODED_LEN];
    buf[0] = VERSION;
    buf[1] = TRACE_ID_FIELD;
    buf[2..18].copy_from_slice(&span_context.trace_id().to_bytes());
    buf[18] = SPAN_ID_FIELD;
    buf[19..27].copy_from_slice(&span_context.span_id().to_bytes());
    buf[27] = OPTIONS_FIELD;
    buf[28] = (span_context.trace_flags() & TraceFlags::SAMPLED).to_u8();
    Some(buf)
}

/// Decode a `grpc-trace-bin` payload into a remote span context.
///
/// Strict on shape: anything that is not exactly [`ENCODED_LEN`] bytes with
/// the expected version and field tags is rejected, as is an all-zero trace
/// or span id. Unknown option bits are dropped rather than carried along.
pub fn decode(bytes: &[u8]) -> Option<SpanContext> {
    if bytes.len() != ENCODED_LEN
        || bytes[0] != VERSION
        || bytes[1] != TRACE_ID_FIELD
        || bytes[18] != SPAN_ID_FIELD
        || bytes[27] != OPTIONS_FIELD
    {
        return None;
    }

    let mut trace_id = [0u8; 16];
    trace_id.copy_from_slice(&bytes[2..18]);
    let mut span_id = [0u8; 8];
    span_id.copy_from_slice(&bytes[19..27]);

    let span_context = SpanContext::new(
        TraceId::from_bytes(trace_id),
        SpanId::from_bytes(span_id),
        TraceFlags::new(bytes[28]) & TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    span_context.is_valid().then_some(span_context)
}
