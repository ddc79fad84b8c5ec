//! End-to-end hop chain scenarios over real sockets. Every node binds
//! ephemeral loopback ports so tests can run in parallel.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use axum::routing::post;
use axum::Router;
use interop_proto::pb::test_execution_service_client::TestExecutionServiceClient;
use interop_proto::{
    Propagation, Service, ServiceHop, Spec, Status, TestRequest, TestResponse, Transport,
    GRPC_TRACE_BIN_HEADER, PROTOBUF_CONTENT_TYPE, TEST_REQUEST_PATH,
};
use interop_testservice::propagation::binary;
use interop_testservice::{receiver, Config, HopRegistry, ServerHandle, ServiceHopper};
use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
use prost::Message;
use tokio::net::TcpListener;
use tonic::metadata::MetadataValue;

struct Node {
    grpc: ServerHandle,
    http: ServerHandle,
}

impl Node {
    async fn start() -> Node {
        let config = Config {
            grpc_addr: "127.0.0.1:0".parse().unwrap(),
            http_addr: "127.0.0.1:0".parse().unwrap(),
            hop_timeout: Duration::from_secs(5),
        };
        let registry = HopRegistry::with_defaults(&config).unwrap();
        let hopper = Arc::new(ServiceHopper::new(registry));
        let grpc = receiver::grpc::start(config.grpc_addr, hopper.clone())
            .await
            .unwrap();
        let http = receiver::http::start(config.http_addr, hopper).await.unwrap();
        Node { grpc, http }
    }

    fn grpc_port(&self) -> u16 {
        self.grpc.local_addr().port()
    }

    fn http_port(&self) -> u16 {
        self.http.local_addr().port()
    }

    async fn stop(self) {
        self.grpc.shutdown().await;
        self.http.shutdown().await;
    }
}

fn hop(transport: Transport, propagation: Propagation, port: u16) -> ServiceHop {
    ServiceHop {
        service: Some(Service {
            host: "127.0.0.1".to_string(),
            port: u32::from(port),
            spec: Some(Spec {
                transport: transport as i32,
                propagation: propagation as i32,
            }),
        }),
    }
}

fn request(id: &str, name: &str, service_hops: Vec<ServiceHop>) -> TestRequest {
    TestRequest {
        id: id.to_string(),
        name: name.to_string(),
        service_hops,
    }
}

fn statuses(response: &TestResponse) -> Vec<Status> {
    response.status.iter().map(|entry| entry.status()).collect()
}

async fn call_grpc(port: u16, request: TestRequest) -> TestResponse {
    let mut client = TestExecutionServiceClient::connect(format!("http://127.0.0.1:{port}"))
        .await
        .unwrap();
    client.test(request).await.unwrap().into_inner()
}

#[tokio::test]
async fn empty_chain_over_grpc() {
    let node = Node::start().await;

    let response = call_grpc(node.grpc_port(), request("1", "empty", vec![])).await;
    assert_eq!(response.id, "1");
    assert_eq!(statuses(&response), vec![Status::Success]);

    node.stop().await;
}

#[tokio::test]
async fn three_node_chain_over_mixed_transports() {
    let a = Node::start().await;
    let b = Node::start().await;
    let c = Node::start().await;

    let hops = vec![
        hop(Transport::Grpc, Propagation::BinaryFormatPropagation, b.grpc_port()),
        hop(Transport::Http, Propagation::B3FormatPropagation, c.http_port()),
    ];
    let response = call_grpc(a.grpc_port(), request("2", "three-node", hops)).await;

    assert_eq!(response.id, "2");
    assert_eq!(
        statuses(&response),
        vec![Status::Success, Status::Success, Status::Success]
    );

    a.stop().await;
    b.stop().await;
    c.stop().await;
}

#[tokio::test]
async fn unsupported_pairing_short_circuits() {
    let node = Node::start().await;

    let hops = vec![hop(Transport::Grpc, Propagation::B3FormatPropagation, 1)];
    let response = call_grpc(node.grpc_port(), request("3", "unsupported", hops)).await;

    assert_eq!(statuses(&response), vec![Status::Failure]);
    assert_eq!(
        response.status[0].error,
        "Unsupported propagation: B3_FORMAT_PROPAGATION or transport: GRPC"
    );

    node.stop().await;
}

#[tokio::test]
async fn trace_context_hop_reports_not_available() {
    let node = Node::start().await;

    let hops = vec![hop(Transport::Http, Propagation::TraceContextFormatPropagation, 1)];
    let response = call_grpc(node.grpc_port(), request("4", "stubbed", hops)).await;

    assert_eq!(statuses(&response), vec![Status::Success, Status::Failure]);
    assert_eq!(response.status[1].error, "Not available");

    node.stop().await;
}

#[tokio::test]
async fn unreachable_grpc_peer_is_absorbed() {
    let node = Node::start().await;

    // Port 1 refuses connections on loopback.
    let hops = vec![hop(Transport::Grpc, Propagation::BinaryFormatPropagation, 1)];
    let response = call_grpc(node.grpc_port(), request("5", "dead-grpc-peer", hops)).await;

    assert_eq!(response.id, "5");
    assert_eq!(statuses(&response), vec![Status::Success, Status::Failure]);
    assert_eq!(response.status[1].error, "GRPC Service Hopper Error");

    node.stop().await;
}

#[tokio::test]
async fn unreachable_http_peer_is_absorbed() {
    let node = Node::start().await;

    let hops = vec![hop(Transport::Http, Propagation::B3FormatPropagation, 1)];
    let response = call_grpc(node.grpc_port(), request("6", "dead-http-peer", hops)).await;

    assert_eq!(statuses(&response), vec![Status::Success, Status::Failure]);
    assert_eq!(response.status[1].error, "Http Service Hopper Error");

    node.stop().await;
}

#[tokio::test]
async fn http_binding_rejects_garbage_with_an_envelope() {
    let node = Node::start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!(
            "http://127.0.0.1:{}{TEST_REQUEST_PATH}",
            node.http_port()
        ))
        .body(&b"\xde\xad not a protobuf"[..])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let decoded = TestResponse::decode(response.bytes().await.unwrap()).unwrap();
    assert_eq!(statuses(&decoded), vec![Status::Failure]);
    assert_eq!(decoded.status[0].error, "Bad Request");

    node.stop().await;
}

#[tokio::test]
async fn http_binding_rejects_unknown_paths() {
    let node = Node::start().await;

    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/somewhere/else", node.http_port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let decoded = TestResponse::decode(response.bytes().await.unwrap()).unwrap();
    assert_eq!(decoded.status[0].error, "Bad Request");

    node.stop().await;
}

/// Terminal peer that records the headers of the one request it receives.
async fn start_capture_peer(seen: Arc<Mutex<Option<HeaderMap>>>) -> SocketAddr {
    let app = Router::new().route(
        TEST_REQUEST_PATH,
        post(move |headers: HeaderMap, _body: Bytes| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = Some(headers);
                (
                    [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
                    TestResponse::success("capture").encode_to_vec(),
                )
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

const TRACE_ID_HEX: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const SPAN_ID_HEX: &str = "00f067aa0ba902b7";

#[tokio::test]
async fn w3c_context_crosses_to_b3_headers() {
    let node = Node::start().await;
    let seen = Arc::new(Mutex::new(None));
    let peer = start_capture_peer(seen.clone()).await;

    let hops = vec![hop(Transport::Http, Propagation::B3FormatPropagation, peer.port())];
    let body = request("7", "w3c-to-b3", hops).encode_to_vec();
    let response = reqwest::Client::new()
        .post(format!(
            "http://127.0.0.1:{}{TEST_REQUEST_PATH}",
            node.http_port()
        ))
        .header("traceparent", format!("00-{TRACE_ID_HEX}-{SPAN_ID_HEX}-01"))
        .header(reqwest::header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .unwrap();

    let decoded = TestResponse::decode(response.bytes().await.unwrap()).unwrap();
    assert_eq!(statuses(&decoded), vec![Status::Success, Status::Success]);

    let headers = seen.lock().unwrap().take().expect("peer saw no request");
    assert_eq!(headers.get("x-b3-traceid").unwrap(), TRACE_ID_HEX);
    assert_eq!(headers.get("x-b3-spanid").unwrap(), SPAN_ID_HEX);
    assert_eq!(headers.get("x-b3-sampled").unwrap(), "1");

    node.stop().await;
}

#[tokio::test]
async fn binary_context_crosses_to_b3_headers() {
    let node = Node::start().await;
    let seen = Arc::new(Mutex::new(None));
    let peer = start_capture_peer(seen.clone()).await;

    let span_context = SpanContext::new(
        TraceId::from_hex(TRACE_ID_HEX).unwrap(),
        SpanId::from_hex(SPAN_ID_HEX).unwrap(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    let encoded = binary::encode(&span_context).unwrap();

    let hops = vec![hop(Transport::Http, Propagation::B3FormatPropagation, peer.port())];
    let mut grpc_request = tonic::Request::new(request("8", "binary-to-b3", hops));
    grpc_request
        .metadata_mut()
        .insert_bin(GRPC_TRACE_BIN_HEADER, MetadataValue::from_bytes(&encoded));

    let mut client =
        TestExecutionServiceClient::connect(format!("http://127.0.0.1:{}", node.grpc_port()))
            .await
            .unwrap();
    let response = client.test(grpc_request).await.unwrap().into_inner();
    assert_eq!(statuses(&response), vec![Status::Success, Status::Success]);

    let headers = seen.lock().unwrap().take().expect("peer saw no request");
    assert_eq!(headers.get("x-b3-traceid").unwrap(), TRACE_ID_HEX);
    assert_eq!(headers.get("x-b3-spanid").unwrap(), SPAN_ID_HEX);
    assert_eq!(headers.get("x-b3-sampled").unwrap(), "1");

    node.stop().await;
}
