use std::time::Duration;

use async_trait::async_trait;
use interop_proto::pb::test_execution_service_client::TestExecutionServiceClient;
use interop_proto::{TestRequest, TestResponse, GRPC_TRACE_BIN_HEADER};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use tonic::metadata::MetadataValue;
use tonic::transport::Endpoint;

use super::HopSender;
use crate::error::HopError;
use crate::propagation::binary;

/// Diagnostic reported when a gRPC hop cannot be completed.
pub const GRPC_HOPPER_ERROR: &str = "GRPC Service Hopper Error";

/// Sends hops over gRPC, carrying the trace context in the
/// `grpc-trace-bin` metadata entry.
///
/// A fresh channel is dialed per hop. Peers in the chain come and go between
/// requests, so nothing is gained from pooling connections here.
#[derive(Debug)]
pub struct GrpcSender {
    timeout: Duration,
}

impl GrpcSender {
    pub fn new(timeout: Duration) -> Self {
        GrpcSender { timeout }
    }

    async fn try_send(
        &self,
        cx: &Context,
        host: &str,
        port: u16,
        request: TestRequest,
    ) -> Result<TestResponse, HopError> {
        let endpoint = Endpoint::from_shared(format!("http://{host}:{port}"))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel = endpoint.connect().await?;
        let mut client = TestExecutionServiceClient::new(channel);

        let mut request = tonic::Request::new(request);
        if let Some(encoded) = binary::encode(cx.span().span_context()) {
            request
                .metadata_mut()
                .insert_bin(GRPC_TRACE_BIN_HEADER, MetadataValue::from_bytes(&encoded));
        }

        Ok(client.test(request).await?.into_inner())
    }
}

#[async_trait]
impl HopSender for GrpcSender {
    async fn send(
        &self,
        cx: &Context,
        host: &str,
        port: u16,
        request: TestRequest,
    ) -> TestResponse {
        let id = request.id.clone();
        tracing::debug!(
            %host,
            port,
            %id,
            name = %request.name,
            remaining_hops = request.service_hops.len(),
            "forwarding hop over grpc"
        );

        match self.try_send(cx, host, port, request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%host, port, %error, "grpc hop failed");
                TestResponse::failure(id, GRPC_HOPPER_ERROR)
            }
        }
    }
}
