use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use interop_proto::{TestRequest, TestResponse, PROTOBUF_CONTENT_TYPE, TEST_REQUEST_PATH};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use prost::Message;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::ServerHandle;
use crate::hopper::ServiceHopper;
use crate::propagation::B3Propagator;

const BAD_REQUEST: &str = "Bad Request";

#[derive(Clone)]
struct AppState {
    hopper: Arc<ServiceHopper>,
    trace_context: TraceContextPropagator,
    b3: B3Propagator,
}

impl AppState {
    /// Restore the caller's trace context from request headers. W3C
    /// trace-context wins when both encodings are present; the two share no
    /// header names, so trying them in order is unambiguous.
    fn parent_context(&self, headers: &HeaderMap) -> Context {
        let extractor = HeaderExtractor(headers);
        let cx = self.trace_context.extract(&extractor);
        if cx.span().span_context().is_valid() {
            return cx;
        }
        self.b3.extract(&extractor)
    }
}

fn router(hopper: Arc<ServiceHopper>) -> Router {
    let state = AppState {
        hopper,
        trace_context: TraceContextPropagator::new(),
        b3: B3Propagator::new(),
    };
    Router::new()
        .route(TEST_REQUEST_PATH, post(handle_test_request).fallback(bad_request))
        .fallback(bad_request)
        .with_state(state)
}

async fn handle_test_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match TestRequest::decode(body.as_ref()) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!(%error, "undecodable test request body");
            return bad_request().await;
        }
    };

    let cx = state.parent_context(&headers);
    let response = state.hopper.serve_hop(&cx, request).await;
    protobuf_response(StatusCode::OK, &response)
}

/// Every rejected request gets the same protobuf failure envelope, so peers
/// can decode errors the same way they decode results.
async fn bad_request() -> Response {
    protobuf_response(
        StatusCode::BAD_REQUEST,
        &TestResponse::failure("", BAD_REQUEST),
    )
}

fn protobuf_response(status: StatusCode, response: &TestResponse) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        response.encode_to_vec(),
    )
        .into_response()
}

/// Bind `addr` and serve the HTTP binding until the returned handle is shut
/// down.
pub async fn start(addr: SocketAddr, hopper: Arc<ServiceHopper>) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (shutdown, rx) = oneshot::channel::<()>();
    let app = router(hopper);

    let task = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
        if let Err(error) = served {
            tracing::error!(%error, "http endpoint terminated");
        }
    });
    tracing::info!(%local_addr, "http test service listening");

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
