use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use gantry_core::error::GatewayError;
use gantry_core::reflection::client::ReflectionClient;
use tonic_reflection::server::v1::ServerReflectionServer;


fn setup_reflection_client()
-> ReflectionClient<ServerReflectionServer<impl tonic_reflection::server::v1::ServerReflection>> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .expect("Failed to setup Reflection Service");

    ReflectionClient::new(reflection_service)
}

#[tokio::test]
async fn resolve_service_yields_a_complete_descriptor() {
    let mut client = setup_reflection_client();

    let service = client
        .resolve_service("echo.EchoService")
        .await
        .expect("Failed to resolve service via reflection");

    assert_eq!(service.full_name(), "echo.EchoService");

    let unary = service
        .methods()
        .find(|m| m.name() == "UnaryEcho")
        .expect("UnaryEcho should exist");
    assert_eq!(unary.input().name(), "EchoRequest");
    assert_eq!(unary.output().name(), "EchoResponse");
    assert!(!unary.is_client_streaming());
    assert!(!unary.is_server_streaming());

    let streaming = service
        .methods()
        .find(|m| m.name() == "ServerStreamingEcho")
        .expect("ServerStreamingEcho should exist");
    assert!(streaming.is_server_streaming());
}

#[tokio::test]
async fn unknown_symbol_surfaces_as_service_not_found() {
    let mut client = setup_reflection_client();

    let result = client.resolve_service("non.existent.Service").await;

    assert!(matches!(result, Err(GatewayError::ServiceNotFound(_))));
}

#[tokio::test]
async fn backend_without_reflection_surfaces_as_service_not_found() {
    // This backend hosts only the echo service; the reflection call itself
    // comes back UNIMPLEMENTED, which the gateway reports the same way as
    // a missing service.
    let mut client = ReflectionClient::new(EchoServiceServer::new(EchoServiceImpl));

    let result = client.resolve_service("echo.EchoService").await;

    assert!(matches!(result, Err(GatewayError::ServiceNotFound(_))));
}

#[tokio::test]
async fn list_services_names_everything_the_backend_exposes() {
    let mut client = setup_reflection_client();

    let services = client.list_services().await.unwrap();

    assert!(services.contains(&"echo.EchoService".to_string()));
}
