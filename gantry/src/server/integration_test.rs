use super::{AppState, router};
use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use gantry_core::discovery::Discoverer;
use gantry_core::discovery::static_table::StaticSource;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

mod echo_service_impl;

async fn spawn_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()
            .unwrap();

        Server::builder()
            .add_service(reflection_service)
            .add_service(EchoServiceServer::new(EchoServiceImpl))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

async fn spawn_gateway(discoverer: Arc<dyn Discoverer>, token: &str) -> String {
    let state = AppState {
        discoverer,
        access_token: token.to_string(),
    };
    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn single_version_source(backend: SocketAddr) -> Arc<StaticSource> {
    let yaml = format!("echo.EchoService:\n  v1: \"127.0.0.1:{}\"\n", backend.port());
    Arc::new(StaticSource::from_yaml(&yaml).unwrap())
}

#[tokio::test]
async fn unary_call_round_trips_json() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .query(&[("version", "v1")])
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/json",
    );
    assert_eq!(response.text().await.unwrap(), "{}");
}

#[tokio::test]
async fn upstream_grpc_status_maps_to_http() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/UnaryFail"))
        .query(&[("version", "v1")])
        .body(r#"{"message":"hi"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 501);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"code": 12, "message": "unary unimplemented"}));
}

#[tokio::test]
async fn empty_table_yields_service_unresolvable() {
    let base = spawn_gateway(Arc::new(StaticSource::from_yaml("{}").unwrap()), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["message"].as_str().unwrap().contains("unresolvable"));
}

#[tokio::test]
async fn two_versions_without_a_choice_is_a_bad_request() {
    let backend = spawn_backend().await;
    let yaml = format!(
        "echo.EchoService:\n  v1: \"127.0.0.1:{port}\"\n  v2: \"127.0.0.1:{port}\"\n",
        port = backend.port(),
    );
    let base = spawn_gateway(Arc::new(StaticSource::from_yaml(&yaml).unwrap()), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn repeated_version_parameter_is_a_bad_request() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .query(&[("version", "v1"), ("version", "v2")])
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/UnaryEcho"))
        .query(&[("version", "v1")])
        .body(r#"{"wrong":"field"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_gateway() {
    let yaml = "echo.EchoService:\n  v1: \"127.0.0.1:1\"\n";
    let base = spawn_gateway(Arc::new(StaticSource::from_yaml(yaml).unwrap()), "").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .query(&[("version", "v1")])
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn grpc_metadata_headers_are_forwarded() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    // The backend appends the x-echo metadata value to the message.
    let response = reqwest::Client::new()
        .post(format!("{base}/v1/echo.EchoService/UnaryEcho"))
        .query(&[("version", "v1")])
        .header("Grpc-Metadata-X-Echo", "ping")
        .header("X-Unrelated", "dropped")
        .body(r#"{"message":"hello"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "hello [ping]"}));
}

#[tokio::test]
async fn access_token_protects_everything_but_the_probe() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "secret").await;
    let client = reqwest::Client::new();

    // Missing token: 401 with an empty body.
    let response = client
        .post(format!("{base}/v1/echo.EchoService/EmptyCall?version=v1"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.text().await.unwrap(), "");

    // Wrong token.
    let response = client
        .get(format!("{base}/anything"))
        .header("X-Access-Token", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // The probe stays open.
    let response = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    // The right token goes through.
    let response = client
        .post(format!("{base}/v1/echo.EchoService/EmptyCall?version=v1"))
        .header("X-Access-Token", "secret")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn the_route_table_rejects_what_it_does_not_know() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;
    let client = reqwest::Client::new();

    // Wrong method on the RPC path.
    let response = client
        .get(format!("{base}/v1/echo.EchoService/EmptyCall"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);

    // Wrong method on the probe.
    let response = client.post(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 405);

    // Wrong number of path segments.
    let response = client
        .post(format!("{base}/v1/echo.EchoService"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Anything else.
    let response = client.get(format!("{base}/nope")).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn debug_records_dumps_the_table() {
    let backend = spawn_backend().await;
    let base = spawn_gateway(single_version_source(backend), "").await;

    let response = reqwest::Client::new()
        .get(format!("{base}/debug/records"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["grpc_service"]["echo.EchoService"]["v1"].is_array());
}
