//! # B3 Propagator
//!
//! Propagates `SpanContext`s using the multiple-header B3 encoding:
//! `x-b3-traceid`, `x-b3-spanid` and `x-b3-sampled`. The single-header
//! encoding is not used by any peer of the interoperability chain, so it is
//! not implemented here.

use opentelemetry::{
    propagation::{text_map_propagator::FieldIter, Extractor, Injector, TextMapPropagator},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};
use std::sync::OnceLock;

const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";
const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";
const B3_SAMPLED_HEADER: &str = "x-b3-sampled";

// TODO Replace this with LazyLock once it is stable.
static B3_HEADER_FIELDS: OnceLock<[String; 3]> = OnceLock::new();

fn b3_header_fields() -> &'static [String; 3] {
    B3_HEADER_FIELDS.get_or_init(|| {
        [
            B3_TRACE_ID_HEADER.to_owned(),
            B3_SPAN_ID_HEADER.to_owned(),
            B3_SAMPLED_HEADER.to_owned(),
        ]
    })
}

/// Multiple-header B3 propagator.
#[derive(Clone, Debug, Default)]
pub struct B3Propagator {
    _private: (),
}

impl B3Propagator {
    /// Create a new `B3Propagator`.
    pub fn new() -> Self {
        B3Propagator { _private: () }
    }

    /// Extract a trace id. Only accepts lowercase hex of 16 or 32 digits.
    fn extract_trace_id(&self, trace_id: &str) -> Result<TraceId, ()> {
        if (trace_id.len() != 16 && trace_id.len() != 32)
            || trace_id.chars().any(|c| c.is_ascii_uppercase())
        {
            return Err(());
        }
        TraceId::from_hex(trace_id).map_err(|_| ())
    }

    /// Extract a span id. Only accepts lowercase hex of exactly 16 digits.
    fn extract_span_id(&self, span_id: &str) -> Result<SpanId, ()> {
        if span_id.len() != 16 || span_id.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(());
        }
        SpanId::from_hex(span_id).map_err(|_| ())
    }

    /// Extract the sampling decision. Some senders on the chain write
    /// `true`/`false` instead of `1`/`0`, so both spellings are accepted.
    fn extract_sampled_state(&self, sampled: &str) -> Result<TraceFlags, ()> {
        match sampled {
            "0" | "false" => Ok(TraceFlags::default()),
            "1" | "true" => Ok(TraceFlags::SAMPLED),
            _ => Err(()),
        }
    }

    fn extract_span_context(&self, extractor: &dyn Extractor) -> Result<SpanContext, ()> {
        let trace_id =
            self.extract_trace_id(extractor.get(B3_TRACE_ID_HEADER).unwrap_or("").trim())?;
        let span_id = self.extract_span_id(extractor.get(B3_SPAN_ID_HEADER).unwrap_or("").trim())?;
        // A missing sampled header means the decision is deferred.
        let trace_flags = match extractor.get(B3_SAMPLED_HEADER) {
            Some(sampled) => self.extract_sampled_state(sampled.trim())?,
            None => TraceFlags::default(),
        };

        let span_context =
            SpanContext::new(trace_id, span_id, trace_flags, true, TraceState::default());
        if span_context.is_valid() {
            Ok(span_context)
        } else {
            Err(())
        }
    }
}

impl TextMapPropagator for B3Propagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        injector.set(B3_TRACE_ID_HEADER, span_context.trace_id().to_string());
        injector.set(B3_SPAN_ID_HEADER, span_context.span_id().to_string());
        let sampled = if span_context.is_sampled() { "1" } else { "0" };
        injector.set(B3_SAMPLED_HEADER, sampled.to_string());
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.extract_span_context(extractor)
            .map(|remote| cx.with_remote_span_context(remote))
            .unwrap_or_else(|_| cx.clone())
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(b3_header_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn carrier(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn extract_valid_multi_header() {
        let propagator = B3Propagator::new();
        let cx = propagator.extract(&carrier(&[
            (B3_TRACE_ID_HEADER, TRACE_ID),
            (B3_SPAN_ID_HEADER, SPAN_ID),
            (B3_SAMPLED_HEADER, "1"),
        ]));

        let binding = cx.span();
        let span_context = binding.span_context();
        assert_eq!(span_context.trace_id().to_string(), TRACE_ID);
        assert_eq!(span_context.span_id().to_string(), SPAN_ID);
        assert!(span_context.is_sampled());
        assert!(span_context.is_remote());
    }

    #[test]
    fn extract_accepts_boolean_sampled_spelling() {
        let propagator = B3Propagator::new();
        let cx = propagator.extract(&carrier(&[
            (B3_TRACE_ID_HEADER, TRACE_ID),
            (B3_SPAN_ID_HEADER, SPAN_ID),
            (B3_SAMPLED_HEADER, "true"),
        ]));
        assert!(cx.span().span_context().is_sampled());
    }

    #[test]
    fn extract_missing_sampled_defers_decision() {
        let propagator = B3Propagator::new();
        let cx = propagator.extract(&carrier(&[
            (B3_TRACE_ID_HEADER, TRACE_ID),
            (B3_SPAN_ID_HEADER, SPAN_ID),
        ]));

        let binding = cx.span();
        let span_context = binding.span_context();
        assert!(span_context.is_valid());
        assert!(!span_context.is_sampled());
    }

    #[test]
    fn extract_rejects_bad_headers() {
        let propagator = B3Propagator::new();
        let rejected = [
            // uppercase trace id
            carrier(&[
                (B3_TRACE_ID_HEADER, "4BF92F3577B34DA6A3CE929D0E0E4736"),
                (B3_SPAN_ID_HEADER, SPAN_ID),
            ]),
            // truncated span id
            carrier(&[(B3_TRACE_ID_HEADER, TRACE_ID), (B3_SPAN_ID_HEADER, "00f0")]),
            // zero trace id
            carrier(&[
                (B3_TRACE_ID_HEADER, "00000000000000000000000000000000"),
                (B3_SPAN_ID_HEADER, SPAN_ID),
            ]),
            // garbage sampled value
            carrier(&[
                (B3_TRACE_ID_HEADER, TRACE_ID),
                (B3_SPAN_ID_HEADER, SPAN_ID),
                (B3_SAMPLED_HEADER, "maybe"),
            ]),
            // nothing at all
            carrier(&[]),
        ];

        for headers in rejected {
            let cx = propagator.extract(&headers);
            assert!(!cx.span().span_context().is_valid(), "{headers:?}");
        }
    }

    #[test]
    fn inject_valid_context() {
        let propagator = B3Propagator::new();
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context);

        let mut headers = HashMap::new();
        propagator.inject_context(&cx, &mut headers);

        assert_eq!(headers.get(B3_TRACE_ID_HEADER).map(String::as_str), Some(TRACE_ID));
        assert_eq!(headers.get(B3_SPAN_ID_HEADER).map(String::as_str), Some(SPAN_ID));
        assert_eq!(headers.get(B3_SAMPLED_HEADER).map(String::as_str), Some("1"));
    }

    #[test]
    fn inject_skips_invalid_context() {
        let propagator = B3Propagator::new();
        let mut headers = HashMap::new();
        propagator.inject_context(&Context::new(), &mut headers);
        assert!(headers.is_empty());
    }
}
