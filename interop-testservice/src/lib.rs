//! Tracing context interoperability test service.
//!
//! One node of a test chain that verifies trace context survives crossing
//! between tracing libraries. A node listens on a gRPC and an HTTP binding;
//! each inbound `TestRequest` names the remaining hops, and the node forwards
//! the tail of the chain to the next peer using the transport and propagation
//! format that hop asks for, folding the downstream statuses into its own
//! response.
//!
//! Supported pairings: gRPC with binary (`grpc-trace-bin`) propagation and
//! HTTP with multiple-header B3. HTTP with W3C trace-context is recognized
//! inbound but has no outbound sender.

pub mod config;
pub mod error;
pub mod hopper;
pub mod propagation;
pub mod receiver;
pub mod sender;

pub use config::Config;
pub use error::HopError;
pub use hopper::{combine_status, HopDispatch, HopRegistry, ServiceHopper, MAX_SERVICE_HOPS};
pub use receiver::ServerHandle;
