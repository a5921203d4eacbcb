use async_std::channel;
use async_std::sync::Mutex;
use axum::Router;
use axum_tonic::NestTonic;
use axum_tonic::RestGrpcService;
use futures::Future;
use futures::future::join_all;
use std::env;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span};

#[cfg(test)]
use std::time::Duration;
#[cfg(test)]
use tokio::time::sleep;
#[cfg(test)]
use tonic::transport::Channel;

use crate::engine;
use crate::engine::grpc::EngineServer;
use crate::engine::{EngineService, RecordProcessor};
#[cfg(test)]
use crate::engine::grpc::{EngineClient, GetInstanceRequest, GetInstanceResponse, InstanceState};
#[cfg(test)]
use crate::raft::raft_common_proto::Entry;
use crate::raft::raft_common_proto::Server;
use crate::raft::raft_service_proto::raft_server::RaftServer;
#[cfg(test)]
use crate::raft::{Client, new_client};
use crate::raft::{
    Diagnostics, FailureInjection, FailureOptions, FilePersistenceOptions, Options,
    PersistenceOptions, RaftImpl,
};

// Runs a whole cluster of members within a single process. Every member
// serves on a real port, so tests and the dev binary talk to the cluster the
// same way external clients would. A production deployment would place each
// member on its own machine instead.
pub struct Harness {
    members: Vec<Member>,
    diagnostics: Arc<Mutex<Diagnostics>>,
    failures: FailureInjection,
}

// Intermediate state for assembling a harness. Ports are bound before any
// member is created, since every member must know the addresses of all the
// others up front.
pub struct HarnessBuilder {
    bound: Vec<BoundAddress>,
    failure: FailureOptions,
    options: Options,
    file_persistence: bool,
}

impl HarnessBuilder {
    // Creates the members and returns the harness, together with a future
    // which completes once all members have stopped serving.
    pub async fn build(
        self,
        cluster_name: &str,
        wipe_persistence: bool,
    ) -> Result<(Harness, Pin<Box<dyn Future<Output = ()> + Send>>), Box<dyn Error>> {
        let diagnostics = Arc::new(Mutex::new(Diagnostics::new()));
        let all = self.addresses();
        let failures = FailureInjection::new(self.failure);

        let mut members = Vec::new();
        let mut serving = Vec::new();
        let raft_options = self.options;
        let file_persistence = self.file_persistence;
        for bound in self.bound {
            let persistence = if file_persistence {
                file_persistence_options(cluster_name, bound.server.name.as_str(), wipe_persistence)
            } else {
                PersistenceOptions::NoPersistenceForTesting
            };

            let (member, future) = Member::new(
                &bound.server,
                bound.listener,
                &all,
                diagnostics.clone(),
                raft_options.clone(),
                persistence,
                failures.clone(),
            )
            .await?;
            let span = info_span!("serve", server = %member.address.name);

            members.push(member);
            serving.push(future.instrument(span));
        }

        let serving_all = Box::pin(async {
            join_all(serving).await;
        });
        let harness = Harness {
            members,
            diagnostics,
            failures,
        };
        Ok((harness, serving_all))
    }

    // Replaces the failure options applied to the channels between members.
    pub fn with_failure(self, failure: FailureOptions) -> Self {
        Self { failure, ..self }
    }

    // Replaces the consensus timing options used by every member.
    pub fn with_options(self, options: Options) -> Self {
        Self { options, ..self }
    }

    // Keeps every member's durable state on disk, surviving restarts of the
    // process.
    pub fn with_file_persistence(self) -> Self {
        Self {
            file_persistence: true,
            ..self
        }
    }

    // The addresses of all bound members, in declaration order.
    pub fn addresses(&self) -> Vec<Server> {
        self.bound.iter().map(|b| b.server.clone()).collect()
    }
}

impl Harness {
    // Binds a listening port for every supplied member name and returns the
    // builder holding them.
    pub async fn builder(names: Vec<String>) -> Result<HarnessBuilder, Box<dyn Error>> {
        let mut bound = Vec::new();
        for name in names {
            let listener = TcpListener::bind("[::1]:0").await?;
            let server = Server {
                host: "::1".to_string(),
                port: listener.local_addr()?.port() as i32,
                name,
            };
            bound.push(BoundAddress { server, listener });
        }
        Ok(HarnessBuilder {
            bound,
            failure: FailureOptions::no_failures(),
            options: Options::default(),
            file_persistence: false,
        })
    }

    // The addresses of all members, in declaration order.
    pub fn addresses(&self) -> Vec<Server> {
        self.members.iter().map(|m| m.address.clone()).collect()
    }

    // The diagnostics record shared by all members of this harness.
    pub fn diagnostics(&self) -> Arc<Mutex<Diagnostics>> {
        self.diagnostics.clone()
    }

    // A handle to the failure injection shared by the grpc channels between
    // the members.
    #[cfg(test)]
    pub fn failures(&self) -> FailureInjection {
        self.failures.clone()
    }

    // Returns a client for raft-level operations, aimed at the first member.
    #[cfg(test)]
    pub fn make_raft_client(&self) -> Box<dyn Client + Send + Sync> {
        new_client("harness-client", &self.members[0].address)
    }

    // Returns a client for engine operations, connected to the first member.
    #[cfg(test)]
    pub async fn make_engine_client(&self) -> EngineClient<Channel> {
        let address = &self.members[0].address;
        let target = format!("http://[{}]:{}", address.host, address.port);
        EngineClient::connect(target).await.expect("connect")
    }

    // Checks the recorded cluster history for consistency, panicking if the
    // members ever disagreed.
    #[cfg(test)]
    pub async fn validate(&self) {
        self.diagnostics
            .lock()
            .await
            .validate()
            .await
            .expect("validate");
    }

    // Starts the cluster logic on every member.
    pub async fn start(&self) {
        for member in &self.members {
            member.start().await;
        }
    }

    // Shuts down every member of this harness.
    pub async fn stop(&self) {
        for member in &self.members {
            member.stop().await;
        }
    }

    // Polls the cluster until the workflow instance with the supplied key
    // shows up in the supplied state. Panics on timeout.
    #[cfg(test)]
    pub async fn wait_for_instance(
        &self,
        key: u64,
        state: InstanceState,
        timeout_duration: Duration,
    ) -> GetInstanceResponse {
        wait_for(timeout_duration, || async {
            let mut client = self.make_engine_client().await;
            let response = client.get_instance(GetInstanceRequest { key }).await.ok()?;
            let proto = response.into_inner();
            match &proto.instance {
                Some(instance) if instance.state() == state => Some(proto),
                _ => None,
            }
        })
        .await
        .expect("wait_for_instance")
    }

    // Polls the diagnostics until some member is leader and the supplied
    // matcher accepts the (term, leader) pair.
    #[cfg(test)]
    pub async fn wait_for_leader<M>(&self, timeout_duration: Duration, matcher: M) -> (u64, Server)
    where
        M: Fn(&(u64, Server)) -> bool,
    {
        let diag = self.diagnostics.clone();
        wait_for(timeout_duration, || async {
            let (term, leader) = diag.lock().await.latest_leader().await?;
            if !self.is_member(leader.name.as_str()) {
                return None;
            }
            matcher(&(term, leader.clone())).then_some((term, leader))
        })
        .await
        .expect("wait_for_leader")
    }

    // The full log of every member, in declaration order.
    #[cfg(test)]
    pub async fn member_logs(&self) -> Vec<Vec<Entry>> {
        let mut logs = Vec::new();
        for member in &self.members {
            logs.push(member.raft.log_entries().await);
        }
        logs
    }

    // Polls until every member's commit index has reached the supplied
    // index. Panics on timeout.
    #[cfg(test)]
    pub async fn wait_for_commit(&self, index: u64, timeout_duration: Duration) {
        wait_for(timeout_duration, || async {
            for member in &self.members {
                if member.raft.commit_index().await < index {
                    return None;
                }
            }
            Some(())
        })
        .await
        .expect("wait_for_commit")
    }

    #[cfg(test)]
    fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.address.name == name)
    }
}

// A single member process of the cluster: one raft participant plus the
// engine service, with grpc and http multiplexed onto a shared port.
struct Member {
    address: Server,
    raft: Arc<RaftImpl>,
    shutdown: channel::Sender<()>,
}

impl Member {
    // Sets up the member's services on the supplied listener and returns it
    // together with the future that serves until shutdown. The member does
    // not participate in the cluster until start() is called.
    async fn new(
        address: &Server,
        listener: TcpListener,
        all: &Vec<Server>,
        diagnostics: Arc<Mutex<Diagnostics>>,
        raft_options: Options,
        persistence: PersistenceOptions,
        failures: FailureInjection,
    ) -> Result<(Self, Pin<Box<dyn Future<Output = ()> + Send>>), Box<dyn Error>> {
        let port = listener.local_addr()?.port() as i32;
        if port != address.port {
            return Err(
                format!("Bound port {} does not match address {}", port, address.port).into(),
            );
        }
        if all.len() < 2 {
            return Err(format!("A cluster needs at least 2 members, got {}", all.len()).into());
        }

        // The engine service doubles as the state machine which the raft
        // participant applies committed records to.
        let path = "/engine";
        let processor = Arc::new(Mutex::new(RecordProcessor::new()));
        let service = Arc::new(EngineService::new(address.name.as_str(), address, processor));
        let engine_grpc = EngineServer::from_arc(service.clone());
        let http = Arc::new(engine::HttpHandler::new(service.clone()));
        let web = Router::new().nest(path, http.routes());

        let server_diagnostics = diagnostics.lock().await.for_server(address);
        let raft = Arc::new(
            RaftImpl::new(
                address,
                all,
                service.raft_state_machine(),
                persistence,
                failures,
                raft_options,
                Some(server_diagnostics),
            )
            .await
            .map_err(|e| format!("Failed to create raft member '{}': {}", address.name, e))?,
        );
        let raft_grpc = RaftServer::from_arc(raft.clone());

        // Multiplex both grpc services and the http routes onto the port.
        let grpc = Router::new().nest_tonic(raft_grpc).nest_tonic(engine_grpc);
        let services = RestGrpcService::new(web, grpc).into_make_service();

        let (stop, stopped) = channel::unbounded::<()>();
        let signal = async move { stopped.recv().await.unwrap_or(()) };
        let serving = Box::pin(async {
            match axum::serve(listener, services)
                .with_graceful_shutdown(signal)
                .await
            {
                Ok(()) => info!("Stopped serving"),
                Err(failure) => error!("Serving failed: {}", failure),
            }
        });

        info!(
            "Member {} serving grpc and http on http://[{}]:{}{}",
            address.name, address.host, address.port, path
        );

        let member = Member {
            address: address.clone(),
            raft,
            shutdown: stop,
        };
        Ok((member, serving))
    }

    // Kicks off the member's background participation in the cluster.
    async fn start(&self) {
        self.raft.start().await;
    }

    // Withdraws the member from the cluster, then tears down its server.
    // Must only be called once.
    async fn stop(&self) {
        self.raft.stop().await;
        self.shutdown.send(()).await.expect("shutdown")
    }
}

struct BoundAddress {
    server: Server,
    listener: TcpListener,
}

// Keeps durable state under something like /tmp/baton/<cluster>/<member>.
fn file_persistence_options(cluster_name: &str, member_name: &str, wipe: bool) -> PersistenceOptions {
    let directory = env::temp_dir()
        .as_path()
        .join("baton")
        .join(cluster_name)
        .join(member_name);
    PersistenceOptions::FilePersistence(FilePersistenceOptions {
        directory: directory.to_string_lossy().into_owned(),
        wipe,
    })
}

// Polls the supplied condition until it produces a value, returning Err(())
// if this does not happen within the timeout.
#[cfg(test)]
async fn wait_for<F, Fut, T>(timeout_duration: Duration, mut condition: F) -> Result<T, ()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout_duration;
    loop {
        if let Some(result) = condition().await {
            return Ok(result);
        }
        if tokio::time::Instant::now() > deadline {
            return Err(());
        }
        sleep(Duration::from_millis(300)).await;
    }
}
