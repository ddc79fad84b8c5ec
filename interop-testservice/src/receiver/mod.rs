//! Inbound endpoints. Each binding accepts test requests, restores the
//! propagated trace context and hands the hop chain to the executor.

pub mod grpc;
pub mod http;

use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running endpoint. The socket stays bound for the handle's
/// lifetime; call [`shutdown`](ServerHandle::shutdown) to stop accepting and
/// let in-flight requests finish.
#[derive(Debug)]
pub struct ServerHandle {
    pub(crate) local_addr: SocketAddr,
    pub(crate) shutdown: oneshot::Sender<()>,
    pub(crate) task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the endpoint is actually bound to. Differs from the
    /// configured one when an ephemeral port (`:0`) was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new requests and wait for the endpoint to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}
