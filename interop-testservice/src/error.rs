use thiserror::Error;

/// Failures a transport sender can hit while forwarding a hop.
///
/// None of these cross the sender boundary as-is: every variant is mapped to
/// a fixed wire diagnostic before the response is handed back to the hop
/// executor, so a remote peer never sees transport internals.
#[derive(Debug, Error)]
pub enum HopError {
    /// The gRPC channel could not be established.
    #[error("grpc channel error: {0}")]
    Channel(#[from] tonic::transport::Error),

    /// The remote peer answered the rpc with an error status.
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The HTTP client could not be built or the request could not be sent.
    #[error("http request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The reply body could not be read off the socket.
    #[error("http body read failed: {0}")]
    Body(#[source] reqwest::Error),

    /// The remote peer answered with a non-success HTTP status.
    #[error("unexpected http status: {0}")]
    HttpStatus(http::StatusCode),

    /// The reply payload was not a valid `TestResponse`.
    #[error("malformed response body: {0}")]
    Decode(#[from] prost::DecodeError),
}
