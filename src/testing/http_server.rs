use axum::Router;
use axum::routing::IntoMakeService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Sender;

// Serves an axum router on an ephemeral port for the duration of a test.
// Shuts the server down again when dropped.
pub struct TestHttpServer {
    port: u16,
    shutdown: Option<Sender<()>>,
}

impl TestHttpServer {
    // Binds a fresh port and serves the supplied router on it from a
    // background task. Panics on any setup failure.
    pub async fn run(router: IntoMakeService<Router>) -> Self {
        // Binding by hand makes the chosen port visible before serving starts.
        let listener = TcpListener::bind("[::1]:0").await.expect("bind");
        let port = listener.local_addr().expect("address").port();
        let (tx, rx) = oneshot::channel();

        // Serve until stop() fires the channel.
        tokio::spawn(async {
            let shutdown = async {
                rx.await.ok();
            };
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
                .expect("serve");
        });

        TestHttpServer {
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

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}
