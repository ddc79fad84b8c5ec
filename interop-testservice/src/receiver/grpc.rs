use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use interop_proto::pb::test_execution_service_server::{
    TestExecutionService, TestExecutionServiceServer,
};
use interop_proto::{TestRequest, TestResponse, GRPC_TRACE_BIN_HEADER};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use super::ServerHandle;
use crate::hopper::ServiceHopper;
use crate::propagation::binary;

#[derive(Debug)]
struct GrpcReceiver {
    hopper: Arc<ServiceHopper>,
}

#[tonic::async_trait]
impl TestExecutionService for GrpcReceiver {
    async fn test(
        &self,
        request: Request<TestRequest>,
    ) -> Result<Response<TestResponse>, Status> {
        let cx = parent_context(&request);
        let response = self.hopper.serve_hop(&cx, request.into_inner()).await;
        Ok(Response::new(response))
    }
}

/// Restore the caller's trace context from `grpc-trace-bin` metadata. An
/// absent or malformed entry yields an empty context rather than an error;
/// interop peers are free to call without one.
fn parent_context(request: &Request<TestRequest>) -> Context {
    request
        .metadata()
        .get_bin(GRPC_TRACE_BIN_HEADER)
        .and_then(|value| value.to_bytes().ok())
        .and_then(|bytes| binary::decode(&bytes))
        .map(|remote| Context::new().with_remote_span_context(remote))
        .unwrap_or_else(Context::new)
}

/// Bind `addr` and serve the test execution service until the returned
/// handle is shut down.
pub async fn start(addr: SocketAddr, hopper: Arc<ServiceHopper>) -> io::Result<ServerHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (shutdown, rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let served = Server::builder()
            .add_service(TestExecutionServiceServer::new(GrpcReceiver { hopper }))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                let _ = rx.await;
            })
            .await;
        if let Err(error) = served {
            tracing::error!(%error, "grpc endpoint terminated");
        }
    });
    tracing::info!(%local_addr, "grpc test service listening");

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
