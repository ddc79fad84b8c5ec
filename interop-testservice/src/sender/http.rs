use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use interop_proto::{TestRequest, TestResponse, PROTOBUF_CONTENT_TYPE, TEST_REQUEST_PATH};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;
use opentelemetry_http::HeaderInjector;
use prost::Message;

use super::HopSender;
use crate::error::HopError;
use crate::propagation::B3Propagator;

/// Diagnostic reported when an HTTP hop cannot be completed.
pub const HTTP_HOPPER_ERROR: &str = "Http Service Hopper Error";

/// Diagnostic reported when the peer answered but its reply body could not
/// be read.
pub const HTTP_SOCKET_ERROR: &str = "Http Socket Error";

/// Sends hops as protobuf-over-HTTP `POST`s, with the trace context injected
/// into request headers by the configured propagator.
#[derive(Debug)]
pub struct HttpSender {
    client: reqwest::Client,
    propagator: Box<dyn TextMapPropagator + Send + Sync>,
}

impl HttpSender {
    /// A sender that propagates context with multiple-header B3.
    pub fn b3(timeout: Duration) -> Result<Self, HopError> {
        Self::with_propagator(Box::new(B3Propagator::new()), timeout)
    }

    pub fn with_propagator(
        propagator: Box<dyn TextMapPropagator + Send + Sync>,
        timeout: Duration,
    ) -> Result<Self, HopError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(HopError::Request)?;
        Ok(HttpSender { client, propagator })
    }

    async fn try_send(
        &self,
        cx: &Context,
        host: &str,
        port: u16,
        request: TestRequest,
    ) -> Result<TestResponse, HopError> {
        let url = format!("http://{host}:{port}{TEST_REQUEST_PATH}");
        let mut headers = http::HeaderMap::new();
        self.propagator
            .inject_context(cx, &mut HeaderInjector(&mut headers));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(request.encode_to_vec())
            .send()
            .await
            .map_err(HopError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HopError::HttpStatus(status));
        }

        let body = response.bytes().await.map_err(HopError::Body)?;
        Ok(TestResponse::decode(body)?)
    }
}

#[async_trait]
impl HopSender for HttpSender {
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
            "forwarding hop over http"
        );

        match self.try_send(cx, host, port, request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%host, port, %error, "http hop failed");
                let diagnostic = match error {
                    HopError::Body(_) => HTTP_SOCKET_ERROR,
                    _ => HTTP_HOPPER_ERROR,
                };
                TestResponse::failure(id, diagnostic)
            }
        }
    }
}
