use echo_service::EchoService;
use echo_service::pb::{EchoRequest, EchoResponse, Empty};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

// A minimal echo backend for the gateway end-to-end tests.
pub struct EchoServiceImpl;

#[tonic::async_trait]
impl EchoService for EchoServiceImpl {
    type ServerStreamingEchoStream = ReceiverStream<Result<EchoResponse, Status>>;

    async fn empty_call(&self, _req: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }

    async fn unary_echo(
        &self,
        req: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        // Metadata sent by the gateway is echoed back in the message body so
        // tests can observe header projection end to end.
        let suffix = req
            .metadata()
            .get("x-echo")
            .and_then(|v| v.to_str().ok())
            .map(|v| format!(" [{v}]"))
            .unwrap_or_default();
        let message = format!("{}{suffix}", req.into_inner().message);
        Ok(Response::new(EchoResponse { message }))
    }

    async fn unary_fail(
        &self,
        _req: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        Err(Status::unimplemented("unary unimplemented"))
    }

    async fn server_streaming_echo(
        &self,
        req: Request<EchoRequest>,
    ) -> Result<Response<Self::ServerStreamingEchoStream>, Status> {
        let message = req.into_inner().message;
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(EchoResponse { message })).await;
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
