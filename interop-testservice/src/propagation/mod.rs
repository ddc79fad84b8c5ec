//! Trace context encodings spoken on the chain. W3C trace-context comes from
//! `opentelemetry_sdk`; the other two formats live here.

pub mod b3;
pub mod binary;

pub use b3::B3Propagator;
