extern crate tokio_stream;

use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Sender;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::body::BoxBody;
use tonic::codegen::Service;
use tonic::codegen::http::{Request, Response};
use tonic::server::NamedService;

// Serves a single grpc service on an ephemeral port for the duration of a
// test. Shuts the server down again when dropped.
pub struct TestRpcServer {
    port: u16,
    shutdown: Option<Sender<()>>,
}

impl TestRpcServer {
    // Binds a fresh port and serves the supplied service on it from a
    // background task. Panics on any setup failure.
    pub async fn run<S>(service: S) -> Self
    where
        S: Service<Request<BoxBody>, Response = Response<BoxBody>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        // Binding by hand makes the chosen port visible before serving starts.
        let listener = TcpListener::bind("[::1]:0").await.expect("bind");
        let port = listener.local_addr().expect("address").port();
        let (tx, rx) = oneshot::channel();

        // Serve until stop() fires the channel.
        tokio::spawn(async {
            let incoming = TcpListenerStream::new(listener);
            let shutdown = async {
                rx.await.ok();
            };
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(incoming, shutdown)
                .await
                .expect("serve");
        });

        TestRpcServer {
            port,
            shutdown: Some(tx),
        }
    }

    // The ephemeral port the server bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
    }
}

impl Drop for TestRpcServer {
    fn drop(&mut self) {
        self.stop();
    }
}
