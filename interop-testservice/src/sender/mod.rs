//! Outbound transports. A sender owns one transport/propagation pairing and
//! turns every failure into a fixed diagnostic on the wire, so callers never
//! need to distinguish transport errors from remote failures.

mod grpc;
mod http;

pub use grpc::{GrpcSender, GRPC_HOPPER_ERROR};
pub use http::{HttpSender, HTTP_HOPPER_ERROR, HTTP_SOCKET_ERROR};

use async_trait::async_trait;
use interop_proto::{TestRequest, TestResponse};
use opentelemetry::Context;
use std::fmt;

/// Forwards a hop request to the next service in the chain.
#[async_trait]
pub trait HopSender: fmt::Debug + Send + Sync {
    /// Send `request` to `host:port` with the trace context from `cx`
    /// attached in this sender's propagation format.
    ///
    /// Infallible by contract: transport failures come back as a
    /// `TestResponse` with a single `FAILURE` entry carrying the sender's
    /// diagnostic, under the same `id` as the request.
    async fn send(
        &self,
        cx: &Context,
        host: &str,
        port: u16,
        request: TestRequest,
    ) -> TestResponse;
}
