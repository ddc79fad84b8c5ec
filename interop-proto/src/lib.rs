//! Wire contract shared by every node of the tracing interoperability test
//! chain: the `interop.TestExecutionService` messages, the HTTP binding
//! constants, and small constructors for the status envelopes both transports
//! exchange.

pub mod pb;

pub use pb::{
    spec::{Propagation, Transport},
    CommonResponseStatus, Service, ServiceHop, Spec, Status, TestRequest, TestResponse,
};

/// Path the HTTP binding of the test service listens on.
pub const TEST_REQUEST_PATH: &str = "/test/request";

/// Content type of the HTTP request/response bodies.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Host used when a [`Service`] descriptor leaves `host` empty.
pub const DEFAULT_HOST: &str = "localhost";

/// gRPC metadata key carrying the binary-encoded trace context.
pub const GRPC_TRACE_BIN_HEADER: &str = "grpc-trace-bin";

impl Service {
    /// The peer host, defaulting to [`DEFAULT_HOST`] when unset.
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }
}

impl CommonResponseStatus {
    /// A `SUCCESS` entry.
    pub fn success() -> Self {
        CommonResponseStatus {
            status: Status::Success as i32,
            error: String::new(),
        }
    }

    /// A `FAILURE` entry carrying a diagnostic.
    pub fn failure(error: impl Into<String>) -> Self {
        CommonResponseStatus {
            status: Status::Failure as i32,
            error: error.into(),
        }
    }
}

impl TestResponse {
    /// A response with a single `SUCCESS` entry.
    pub fn success(id: impl Into<String>) -> Self {
        TestResponse {
            id: id.into(),
            status: vec![CommonResponseStatus::success()],
        }
    }

    /// A response with a single `FAILURE` entry.
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        TestResponse {
            id: id.into(),
            status: vec![CommonResponseStatus::failure(error)],
        }
    }
}
