use std::time::Duration;

use async_std::sync::Mutex;
use async_trait::async_trait;
use futures::Future;
use tokio::time::sleep;
use tonic::Request;
use tonic::transport::Channel;
use tracing::debug;

use crate::raft::client::Attempt::{Done, Fail, Redirect};
use crate::raft::error::{RaftError, RaftResult};
use crate::raft::raft_common_proto::{EntryId, Server};
use crate::raft::raft_service_proto::raft_client::RaftClient;
use crate::raft::raft_service_proto::{Status as ResponseStatus, StepDownRequest, SubmitRequest};

const RETRY_PAUSE: Duration = Duration::from_millis(300);

// Creates a client connected to the cluster the supplied member belongs to.
// The member doesn't need to be the leader, any member can redirect the
// client to wherever the leader currently is. The name only shows up in logs.
pub fn new_client(name: &str, member: &Server) -> Box<dyn Client + Sync + Send> {
    Box::new(ClientImpl {
        name: name.into(),
        leader: Mutex::new(member.clone()),
        max_follow_attempts: 10,
    })
}

// Operations a caller can run against the cluster as a whole.
#[async_trait]
pub trait Client {
    // Appends the payload to the cluster's shared log, returning the id the
    // entry committed under. Does not return until commit (or failure).
    async fn submit(&self, payload: &[u8]) -> RaftResult<EntryId>;

    // Asks the current leader to relinquish leadership. Returns the address
    // of the member which stepped down.
    async fn preempt_leader(&self) -> RaftResult<Server>;
}

// What a single rpc against one member produced.
enum Attempt<T> {
    // The rpc succeeded and produced a value.
    Done(T),

    // The rpc failed for good, retrying won't help.
    Fail(RaftError),

    // The contacted member wasn't the leader. Carries the member's own guess
    // at who leads now, if it has one.
    Redirect(Option<Server>),
}

struct ClientImpl {
    name: String,

    // Where we believe the leader to be. Updated whenever a member
    // redirects us.
    leader: Mutex<Server>,

    // How many redirects to chase before giving up on an operation.
    max_follow_attempts: i32,
}

impl ClientImpl {
    async fn remember_leader(&self, leader: &Server) {
        let mut locked = self.leader.lock().await;
        *locked = leader.clone();
        debug!(name=%self.name, leader=%leader.name, "following new leader");
    }

    async fn connect(server: &Server) -> RaftResult<RaftClient<Channel>> {
        RaftClient::connect(format!("http://[{}]:{}", server.host, server.port))
            .await
            .map_err(|failure| RaftError::ConnectionFailed {
                peer: peer_label(server),
                source: Box::new(failure),
            })
    }

    // Runs an operation against whoever we currently believe leads the
    // cluster, chasing redirects for a bounded number of attempts. The
    // operation reports how each attempt went through its Attempt value.
    async fn follow_leader<T, Fut>(&self, operation: impl Fn(Server) -> Fut) -> RaftResult<T>
    where
        Fut: Future<Output = Attempt<T>>,
    {
        let mut leader = self.leader.lock().await.clone();
        for _ in 0..self.max_follow_attempts {
            match operation(leader.clone()).await {
                Done(result) => return Ok(result),
                Fail(failure) => return Err(failure),
                Redirect(Some(next)) => {
                    self.remember_leader(&next).await;
                    leader = next;
                }
                // No better candidate known, ask the same member again.
                Redirect(None) => (),
            }
            sleep(RETRY_PAUSE).await;
        }
        Err(RaftError::Internal(format!(
            "No leader found after {} attempts",
            self.max_follow_attempts
        )))
    }

    // A single submit rpc against the presumed leader.
    async fn try_submit(leader: Server, payload: &[u8]) -> Attempt<EntryId> {
        let mut request = Request::new(SubmitRequest {
            payload: payload.to_vec(),
        });
        request.set_timeout(Duration::from_secs(3));

        let mut client = match ClientImpl::connect(&leader).await {
            Ok(client) => client,
            Err(failure) => return Fail(failure),
        };

        match client.submit(request).await {
            Err(status) => Fail(RaftError::Rpc {
                peer: peer_label(&leader),
                status,
            }),
            Ok(response) => {
                let proto = response.into_inner();
                match ResponseStatus::try_from(proto.status) {
                    Ok(ResponseStatus::Success) => match proto.entry_id {
                        Some(entry_id) => Done(entry_id),
                        None => Fail(RaftError::missing("entry_id")),
                    },
                    Ok(ResponseStatus::NotLeader) => Redirect(proto.leader),

                    // The leader lost its term before our entry committed. The
                    // entry can no longer commit under that term, so handing
                    // the payload to whoever leads now is safe.
                    Ok(ResponseStatus::LeadershipLost) => Redirect(proto.leader),

                    Err(_) => Fail(bad_status(proto.status)),
                }
            }
        }
    }

    // A single step_down rpc against the presumed leader.
    async fn try_step_down(leader: Server) -> Attempt<Server> {
        let mut request = Request::new(StepDownRequest {});
        request.set_timeout(Duration::from_millis(100));

        let mut client = match ClientImpl::connect(&leader).await {
            Ok(client) => client,
            Err(failure) => return Fail(failure),
        };

        match client.step_down(request).await {
            Err(status) => Fail(RaftError::Rpc {
                peer: peer_label(&leader),
                status,
            }),
            Ok(response) => {
                let proto = response.into_inner();
                match ResponseStatus::try_from(proto.status) {
                    Ok(ResponseStatus::Success) => match proto.leader {
                        Some(leader) => Done(leader),
                        None => Fail(RaftError::missing("leader")),
                    },
                    Ok(ResponseStatus::NotLeader) => Redirect(proto.leader),
                    Ok(ResponseStatus::LeadershipLost) => Redirect(proto.leader),
                    Err(_) => Fail(bad_status(proto.status)),
                }
            }
        }
    }
}

#[async_trait]
impl Client for ClientImpl {
    async fn submit(&self, payload: &[u8]) -> RaftResult<EntryId> {
        self.follow_leader(async move |leader: Server| {
            ClientImpl::try_submit(leader, payload).await
        })
        .await
    }

    async fn preempt_leader(&self) -> RaftResult<Server> {
        self.follow_leader(async move |leader: Server| ClientImpl::try_step_down(leader).await)
            .await
    }
}

fn peer_label(server: &Server) -> String {
    if server.name.is_empty() {
        format!("[{}]:{}", server.host, server.port)
    } else {
        server.name.clone()
    }
}

fn bad_status(status: i32) -> RaftError {
    RaftError::Internal(format!("Unrecognized response status: {}", status))
}
