use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::Sleep;
use tonic::client::GrpcService;
use tonic::codegen::http::Request;
use tower::BoxError;

use crate::raft::raft_common_proto::Server;

// Knobs controlling how intercepted rpcs get tampered with.
pub struct FailureOptions {
    // The chance for an intercepted rpc to fail outright.
    pub failure_probability: f64,

    // The chance for an intercepted rpc to be delayed.
    pub latency_probability: f64,

    // How long a delayed rpc gets held back.
    pub latency_ms: u64,
}

impl FailureOptions {
    // Options which leave every rpc alone.
    pub const fn no_failures() -> Self {
        Self {
            failure_probability: 0.0,
            latency_probability: 0.0,
            latency_ms: 0,
        }
    }

    // Options which fail rpcs at the supplied rate and add no latency.
    pub const fn fail_with_probability(failure_probability: f64) -> Self {
        Self {
            failure_probability,
            latency_probability: 0.0,
            latency_ms: 0,
        }
    }
}

// A handle shared by all channels in a cluster which decides the fate of
// intercepted RPCs. Cloning the handle keeps referring to the same underlying
// settings, so a test harness can cut off a member while RPCs are in flight.
#[derive(Clone)]
pub struct FailureInjection {
    options: Arc<FailureOptions>,
    disconnected: Arc<Mutex<HashSet<String>>>,
}

impl FailureInjection {
    pub fn new(options: FailureOptions) -> Self {
        Self {
            options: Arc::new(options),
            disconnected: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    // Returns a handle which never interferes with RPCs.
    pub fn none() -> Self {
        Self::new(FailureOptions::no_failures())
    }

    // Cuts off the supplied server, failing all RPCs to and from it until
    // "reconnect" is called.
    pub fn disconnect(&self, server: &Server) {
        self.disconnected
            .lock()
            .unwrap()
            .insert(server_key(server));
    }

    // Restores connectivity for the supplied server.
    pub fn reconnect(&self, server: &Server) {
        self.disconnected
            .lock()
            .unwrap()
            .remove(&server_key(server));
    }

    fn should_fail(&self, channel_info: &ChannelInfo) -> bool {
        if rand::random::<f64>() < self.options.failure_probability {
            return true;
        }
        let disconnected = self.disconnected.lock().unwrap();
        disconnected.contains(&channel_info.src) || disconnected.contains(&channel_info.dst)
    }

    fn latency(&self) -> Option<Duration> {
        if rand::random::<f64>() < self.options.latency_probability {
            Some(Duration::from_millis(self.options.latency_ms))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    src: String,
    dst: String,
}

impl ChannelInfo {
    pub fn new(src: String, dst: String) -> Self {
        Self { src, dst }
    }
}

// Tower layer wrapped around a grpc channel. Consults the shared
// FailureInjection handle on every call and fails or delays the rpc
// accordingly.
pub struct FailureInjectionMiddleware<T> {
    inner: T,
    injection: FailureInjection,
    channel_info: ChannelInfo,
}

impl<T> FailureInjectionMiddleware<T> {
    pub fn new(inner: T, injection: FailureInjection, channel_info: ChannelInfo) -> Self {
        FailureInjectionMiddleware {
            inner,
            injection,
            channel_info,
        }
    }
}

impl<T, ReqBody> GrpcService<ReqBody> for FailureInjectionMiddleware<T>
where
    T: GrpcService<ReqBody>,
    T::Error: Into<BoxError>,
{
    type ResponseBody = T::ResponseBody;
    type Error = BoxError;
    type Future = FailureInjectionFuture<T::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let failed = self.injection.should_fail(&self.channel_info);
        let delay = self.injection.latency().map(tokio::time::sleep);
        FailureInjectionFuture {
            inner: self.inner.call(request),
            delay,
            failed,
            channel_info: self.channel_info.clone(),
        }
    }
}

// The future returned by the middleware. Resolves to an error for rpcs
// picked to fail, and holds back the wrapped rpc future until the delay
// elapses for rpcs picked to be slow.
#[pin_project]
pub struct FailureInjectionFuture<F> {
    #[pin]
    inner: F,
    #[pin]
    delay: Option<Sleep>,
    failed: bool,
    channel_info: ChannelInfo,
}

impl<F, Response, Error> Future for FailureInjectionFuture<F>
where
    F: Future<Output = Result<Response, Error>>,
    Error: Into<BoxError>,
{
    type Output = Result<Response, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if *this.failed {
            let (src, dst) = (this.channel_info.src.clone(), this.channel_info.dst.clone());
            let error = tonic::Status::unavailable(format!(
                "Injected failure in channel {} -> {}",
                src, dst
            ));
            return Poll::Ready(Err(error.into()));
        }

        if let Some(delay) = this.delay.as_mut().as_pin_mut() {
            match delay.poll(cx) {
                Poll::Ready(()) => this.delay.set(None),
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.inner.poll(cx) {
            Poll::Ready(result) => Poll::Ready(result.map_err(Into::into)),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn server_key(server: &Server) -> String {
    format!("{}:{}", server.host, server.port)
}
