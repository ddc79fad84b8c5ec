//! Hop chain executor.
//!
//! Each node of the interoperability chain runs one [`ServiceHopper`]. An
//! inbound request names the remaining hops; the hopper pops the first one,
//! forwards the tail to that peer over the requested transport/propagation
//! pairing, and folds the downstream reply into its own status list. The
//! result is one status entry per hop, in traversal order, with the first
//! entry describing this node.

use interop_proto::{Propagation, TestRequest, TestResponse, Transport};
use opentelemetry::Context;

use crate::config::Config;
use crate::error::HopError;
use crate::sender::{GrpcSender, HopSender, HttpSender};

/// Upper bound on the hop chain length. A request naming more hops is
/// rejected outright rather than fanned out across the network.
pub const MAX_SERVICE_HOPS: usize = 128;

/// Diagnostic for a pairing that is registered but has no working sender.
pub const NOT_AVAILABLE: &str = "Not available";

/// What the registry knows about a transport/propagation pairing.
pub enum HopDispatch<'a> {
    /// A working sender for the pairing.
    Ready(&'a dyn HopSender),
    /// The pairing is recognized but intentionally unimplemented. The hop
    /// records its own success and a failure for the peer it never reached.
    Stub,
}

/// Maps transport/propagation pairings to senders.
#[derive(Debug)]
pub struct HopRegistry {
    grpc_binary: Box<dyn HopSender>,
    http_b3: Box<dyn HopSender>,
}

impl HopRegistry {
    pub fn new(grpc_binary: Box<dyn HopSender>, http_b3: Box<dyn HopSender>) -> Self {
        HopRegistry {
            grpc_binary,
            http_b3,
        }
    }

    /// The production pairing table.
    pub fn with_defaults(config: &Config) -> Result<Self, HopError> {
        Ok(HopRegistry::new(
            Box::new(GrpcSender::new(config.hop_timeout)),
            Box::new(HttpSender::b3(config.hop_timeout)?),
        ))
    }

    pub fn lookup(&self, transport: Transport, propagation: Propagation) -> Option<HopDispatch<'_>> {
        match (transport, propagation) {
            (Transport::Grpc, Propagation::BinaryFormatPropagation) => {
                Some(HopDispatch::Ready(self.grpc_binary.as_ref()))
            }
            (Transport::Http, Propagation::B3FormatPropagation) => {
                Some(HopDispatch::Ready(self.http_b3.as_ref()))
            }
            // Recognized on inbound requests, but no outbound sender exists.
            (Transport::Http, Propagation::TraceContextFormatPropagation) => {
                Some(HopDispatch::Stub)
            }
            _ => None,
        }
    }
}

/// Executes hop chains against a [`HopRegistry`].
#[derive(Debug)]
pub struct ServiceHopper {
    registry: HopRegistry,
}

impl ServiceHopper {
    pub fn new(registry: HopRegistry) -> Self {
        ServiceHopper { registry }
    }

    /// Process one inbound request.
    ///
    /// Total: every outcome, including transport failures downstream, comes
    /// back as a `TestResponse` under the request's `id`.
    pub async fn serve_hop(&self, cx: &Context, request: TestRequest) -> TestResponse {
        let TestRequest {
            id,
            name,
            mut service_hops,
        } = request;

        if service_hops.is_empty() {
            return TestResponse::success(id);
        }
        if service_hops.len() > MAX_SERVICE_HOPS {
            tracing::warn!(%id, hops = service_hops.len(), "rejecting oversized hop chain");
            return TestResponse::failure(
                id,
                format!("Too many service hops: {}", service_hops.len()),
            );
        }

        let next = service_hops.remove(0);
        let service = next.service.unwrap_or_default();
        let spec = service.spec.clone().unwrap_or_default();
        let transport = spec.transport();
        let propagation = spec.propagation();

        let downstream = match self.registry.lookup(transport, propagation) {
            None => {
                return TestResponse::failure(
                    id,
                    format!(
                        "Unsupported propagation: {} or transport: {}",
                        propagation.as_str_name(),
                        transport.as_str_name()
                    ),
                );
            }
            Some(HopDispatch::Stub) => TestResponse::failure(id.clone(), NOT_AVAILABLE),
            // The wire carries the port as uint32; anything outside the tcp
            // range is a bad hop descriptor, not something to dial.
            Some(HopDispatch::Ready(sender)) => match u16::try_from(service.port) {
                Ok(port) => {
                    let forwarded = TestRequest {
                        id: id.clone(),
                        name,
                        service_hops,
                    };
                    sender.send(cx, service.host_or_default(), port, forwarded).await
                }
                Err(_) => TestResponse::failure(
                    id.clone(),
                    format!("Invalid service port: {}", service.port),
                ),
            },
        };

        combine_status(TestResponse::success(id), downstream)
    }
}

/// Append `addition`'s status entries to `base`, keeping `base`'s id.
pub fn combine_status(mut base: TestResponse, addition: TestResponse) -> TestResponse {
    base.status.extend(addition.status);
    base
}
