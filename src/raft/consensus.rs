use std::cmp::{max, min};
use std::collections::HashMap;
use std::time::Duration;

use async_std::sync::{Arc, Mutex};
use futures::future::join_all;
use rand::Rng;
use timer::{Guard, Timer};
use tokio::runtime::Handle;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

#[cfg(test)]
use crate::raft::raft_common_proto::Entry;

use crate::raft::StateMachine;
use crate::raft::cluster::{Cluster, PeerClient};
use crate::raft::diagnostics::ServerDiagnostics;
use crate::raft::error::{RaftError, RaftResult};
use crate::raft::failure_injection::FailureInjection;
use crate::raft::persistence::PersistenceOptions;
use crate::raft::raft_common_proto::entry::Data;
use crate::raft::raft_common_proto::{Marker, Server};
use crate::raft::raft_service_proto::Status as ResponseStatus;
use crate::raft::raft_service_proto::raft_server::Raft;
use crate::raft::raft_service_proto::{
    AppendRequest, AppendResponse, StepDownRequest, StepDownResponse, SubmitRequest,
    SubmitResponse, VoteRequest, VoteResponse,
};
use crate::raft::store::Store;

const DEFAULT_FOLLOWER_TIMEOUT_MS: i64 = 2000;
const DEFAULT_CANDIDATE_TIMEOUT_MS: i64 = 3000;
const DEFAULT_LEADER_REPLICATE_MS: i64 = 500;
const DEFAULT_RPC_TIMEOUT_MS: i64 = 1000;

// Timing knobs for a single cluster member.
#[derive(Clone, Debug)]
pub struct Options {
    // How long a follower waits for a leader before calling an election.
    pub follower_timeout_ms: i64,

    // How long a candidate waits for its election to conclude before giving
    // up on it and starting a fresh one.
    pub candidate_timeout_ms: i64,

    // The interval between replication rounds on a leader. Replication
    // doubles as the heartbeat, so this must stay below the follower
    // timeout.
    pub leader_replicate_ms: i64,

    // How long to wait for a peer's reply before giving up on the call.
    pub rpc_timeout_ms: i64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            follower_timeout_ms: DEFAULT_FOLLOWER_TIMEOUT_MS,
            candidate_timeout_ms: DEFAULT_CANDIDATE_TIMEOUT_MS,
            leader_replicate_ms: DEFAULT_LEADER_REPLICATE_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
        }
    }
}

// A single member of the consensus group. Serves the raft rpc interface and
// drives this member's election and replication machinery.
pub struct RaftImpl {
    address: Server,
    state: Arc<Mutex<RaftState>>,
}

impl RaftImpl {
    pub async fn new(
        server: &Server,
        all: &[Server],
        state_machine: Arc<Mutex<dyn StateMachine + Send>>,
        persistence_options: PersistenceOptions,
        failures: FailureInjection,
        options: Options,
        diagnostics: Option<Arc<Mutex<ServerDiagnostics>>>,
    ) -> RaftResult<RaftImpl> {
        let name = server_name(server);
        let store = Store::new(
            persistence_options,
            state_machine,
            name.as_str(),
            diagnostics.clone(),
        )
        .await
        .map_err(|failure| RaftError::Initialization(failure.to_string()))?;

        Ok(RaftImpl {
            address: server.clone(),
            state: Arc::new(Mutex::new(RaftState {
                options,
                name,

                store,

                role: RaftRole::Follower,
                followers: HashMap::new(),
                halted: false,

                timer: Timer::new(),
                timer_guard: None,

                cluster: Cluster::new(server.clone(), all, failures),
                handle: Handle::current(),

                diagnostics,
            })),
        })
    }

    // Starts participating in the cluster, initially as a follower.
    pub async fn start(&self) {
        let arc_state = self.state.clone();
        let mut state = self.state.lock().await;
        info!("[{}] Starting", state.name);
        let term = state.store.term();
        RaftImpl::become_follower(&mut state, arc_state, term).await;
    }

    // Stops participating in the cluster. Any pending submissions are
    // cancelled and subsequent requests fail.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        info!("[{}] Stopping", state.name);
        state.role = RaftRole::Follower;
        state.timer_guard = None;
        state.halted = true;
    }

    pub fn address(&self) -> &Server {
        &self.address
    }

    // The index of the last entry this member considers committed.
    #[cfg(test)]
    pub async fn commit_index(&self) -> u64 {
        self.state.lock().await.store.committed_index()
    }

    // A copy of this member's full log.
    #[cfg(test)]
    pub async fn log_entries(&self) -> Vec<Entry> {
        self.state.lock().await.store.get_entries_after(0)
    }

    // Makes this instance a follower for the supplied term, which must be no
    // lower than the current one. A vote cast in the current term is kept, a
    // newer term starts out with no vote.
    async fn become_follower(state: &mut RaftState, arc_state: Arc<Mutex<RaftState>>, term: u64) {
        info!("[{}] Becoming follower for term {}", state.name, term);
        assert!(term >= state.store.term(), "Term should never decrease");

        state.role = RaftRole::Follower;
        if term > state.store.term() {
            if let Err(failure) = state.store.update_term_info(term, &None).await {
                state.halt(&failure);
                return;
            }
        }
        state.reset_election_timer(arc_state);
    }

    // Makes this instance the leader for the supplied term. Appends a marker
    // entry for the new term, whose replication establishes the commit point
    // for anything left over from earlier terms.
    async fn become_leader(state: &mut RaftState, arc_state: Arc<Mutex<RaftState>>, term: u64) {
        state.role = RaftRole::Leader;
        state.timer_guard = None;

        let me = state.cluster.me();
        state.cluster.observe_leader(&me);
        if let Some(diagnostics) = &state.diagnostics {
            diagnostics.lock().await.report_leader(term, &me);
        }

        if let Err(failure) = state.store.append(term, Data::Marker(Marker {})).await {
            state.halt(&failure);
            return;
        }
        state.followers = state.initial_follower_positions();

        state.handle.spawn(async move {
            RaftImpl::replicate_loop(arc_state, term).await;
        });
    }

    // Calls repeated elections, one term apart, until this member wins one
    // or observes that the cluster has settled on some other outcome.
    async fn election_loop(arc_state: Arc<Mutex<RaftState>>, term: u64) {
        let timeout_ms = arc_state.lock().await.options.candidate_timeout_ms;
        let mut term = term;
        while !RaftImpl::run_election(arc_state.clone(), term).await {
            term = term + 1;
            async_std::task::sleep(Duration::from_millis(add_jitter(timeout_ms) as u64)).await;
        }
    }

    // Runs one election for the supplied term. A return value of true means
    // the matter is settled, one way or another, and no further elections
    // are needed.
    async fn run_election(arc_state: Arc<Mutex<RaftState>>, term: u64) -> bool {
        let mut vote_futures = Vec::new();
        {
            let mut state = arc_state.lock().await;
            if state.halted {
                return true;
            }

            // The planned term is no longer ahead of our own, so this
            // election is moot. A vote already cast in the term must stand.
            if state.store.term() >= term {
                return true;
            }

            // Prepare the election, voting for ourselves.
            info!("[{}] Starting election for term {}", state.name, term);
            state.role = RaftRole::Candidate;
            state.timer_guard = None;
            let me = state.cluster.me();
            if let Err(failure) = state.store.update_term_info(term, &Some(me)).await {
                state.halt(&failure);
                return true;
            }

            // Request votes from all peers.
            let rpc_timeout = Duration::from_millis(state.options.rpc_timeout_ms as u64);
            let request = state.build_vote_request();
            for server in state.cluster.others() {
                debug!(
                    "[{}] Making vote rpc to [{}]",
                    state.name,
                    server_name(&server)
                );
                match state.cluster.new_client(&server) {
                    Ok(client) => {
                        vote_futures.push(RaftImpl::call_vote(client, request.clone(), rpc_timeout))
                    }
                    Err(error) => warn!(
                        "[{}] Failed to create client for [{}]: {}",
                        state.name,
                        server_name(&server),
                        error
                    ),
                }
            }
        }

        let results = join_all(vote_futures).await;

        {
            let mut state = arc_state.lock().await;
            debug!("[{}] Done waiting for vote requests", state.name);

            // The term advanced or our role changed while the votes were
            // in flight, this run no longer matters.
            if state.store.term() > term || state.role != RaftRole::Candidate {
                return true;
            }

            let mut votes = 1; // Our own vote.
            for result in results {
                match result {
                    Ok(response) => {
                        if response.term > term {
                            info!("[{}] Detected higher term {}", state.name, response.term);
                            RaftImpl::become_follower(&mut state, arc_state.clone(), response.term)
                                .await;
                            return true;
                        }
                        if response.granted {
                            votes = votes + 1;
                        }
                    }
                    Err(status) => info!("[{}] Vote request failed: {}", state.name, status),
                }
            }

            if votes >= state.cluster.quorum_size() {
                info!(
                    "[{}] Won election with {} votes, becoming leader for term {}",
                    state.name, votes, term
                );
                RaftImpl::become_leader(&mut state, arc_state.clone(), term).await;
                true
            } else {
                info!("[{}] Lost election with {} votes", state.name, votes);
                false
            }
        }
    }

    async fn call_vote(
        mut client: PeerClient,
        request: VoteRequest,
        rpc_timeout: Duration,
    ) -> Result<VoteResponse, Status> {
        match tokio::time::timeout(rpc_timeout, client.vote(Request::new(request))).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(status),
            Err(_) => Err(Status::deadline_exceeded("vote rpc timed out")),
        }
    }

    // Drives replication rounds for as long as this member leads the given
    // term. Exits once leadership is lost in any way.
    async fn replicate_loop(arc_state: Arc<Mutex<RaftState>>, term: u64) {
        let timeout_ms = arc_state.lock().await.options.leader_replicate_ms;
        loop {
            {
                let state = arc_state.lock().await;
                if state.halted || state.store.term() > term || state.role != RaftRole::Leader {
                    return;
                }
                if let Some(diagnostics) = &state.diagnostics {
                    diagnostics
                        .lock()
                        .await
                        .report_leader(term, &state.cluster.me());
                }
            }

            RaftImpl::replicate_entries(arc_state.clone(), term).await;
            async_std::task::sleep(Duration::from_millis(add_jitter(timeout_ms) as u64)).await;
        }
    }

    // A single replication round, sending each follower the entries it is
    // missing. An empty batch still counts as the heartbeat.
    async fn replicate_entries(arc_state: Arc<Mutex<RaftState>>, term: u64) {
        let mut append_futures = Vec::new();
        {
            let mut state = arc_state.lock().await;
            if state.role != RaftRole::Leader {
                return;
            }
            debug!("[{}] Replicating entries", state.name);

            let rpc_timeout = Duration::from_millis(state.options.rpc_timeout_ms as u64);
            for server in state.cluster.others() {
                let request = state.build_append_request(&server);
                match state.cluster.new_client(&server) {
                    Ok(client) => append_futures.push(RaftImpl::call_append(
                        client,
                        server.clone(),
                        request,
                        rpc_timeout,
                    )),
                    Err(error) => warn!(
                        "[{}] Failed to create client for [{}]: {}",
                        state.name,
                        server_name(&server),
                        error
                    ),
                }
            }
        }

        let results = join_all(append_futures).await;

        {
            let mut state = arc_state.lock().await;
            if state.store.term() > term {
                info!("[{}] Detected higher term {}", state.name, state.store.term());
                return;
            }
            if state.role != RaftRole::Leader {
                info!("[{}] No longer leader", state.name);
                return;
            }

            for result in results {
                match result {
                    Err((peer, status)) => info!(
                        "[{}] Append request to [{}] failed: {}",
                        state.name,
                        server_name(&peer),
                        status
                    ),
                    Ok((peer, response)) => {
                        if response.term > state.store.term() {
                            info!(
                                "[{}] Detected higher term {} from peer [{}]",
                                state.name,
                                response.term,
                                server_name(&peer)
                            );
                            RaftImpl::become_follower(&mut state, arc_state.clone(), response.term)
                                .await;
                            return;
                        }
                        state.handle_append_response(&peer, &response);
                    }
                }
            }
            state.update_committed().await;
            debug!("[{}] Done replicating entries", state.name);
        }
    }

    async fn call_append(
        mut client: PeerClient,
        peer: Server,
        request: AppendRequest,
        rpc_timeout: Duration,
    ) -> Result<(Server, AppendResponse), (Server, Status)> {
        match tokio::time::timeout(rpc_timeout, client.append(Request::new(request))).await {
            Ok(Ok(response)) => Ok((peer, response.into_inner())),
            Ok(Err(status)) => Err((peer, status)),
            Err(_) => Err((peer, Status::deadline_exceeded("append rpc timed out"))),
        }
    }
}

// What the leader knows about one follower's log. Drives the choice of
// entries to send it next.
#[derive(Debug, Clone, PartialEq)]
struct FollowerPosition {
    // Index of the first entry the follower still needs.
    next_index: u64,

    // Latest index the follower has confirmed holding.
    match_index: u64,
}

#[derive(PartialEq)]
enum RaftRole {
    Follower,
    Candidate,
    Leader,
}

struct RaftState {
    // Fixed at construction.
    options: Options,
    name: String,

    // Persistent raft state, the log, and the state machine.
    store: Store,

    // Changes as the member moves between roles.
    role: RaftRole,
    followers: HashMap<String, FollowerPosition>,
    halted: bool,

    timer: Timer,
    timer_guard: Option<Guard>,

    // Cluster membership and connections.
    cluster: Cluster,

    // Used to get async work onto the runtime from timer threads.
    handle: Handle,

    // When set, observed leaders and applied entries get reported here.
    diagnostics: Option<Arc<Mutex<ServerDiagnostics>>>,
}

impl RaftState {
    // Stops accepting requests and participating in the cluster. Called when
    // persistent storage has failed, at which point none of the guarantees the
    // protocol relies on can be kept.
    fn halt(&mut self, failure: &RaftError) {
        error!("[{}] Halting: {}", self.name, failure);
        self.halted = true;
        self.role = RaftRole::Follower;
        self.timer_guard = None;
    }

    // Schedules a new election for the term after the current one, replacing
    // any previously scheduled election.
    fn reset_election_timer(&mut self, arc_state: Arc<Mutex<RaftState>>) {
        let term = self.store.term();
        let me = self.name.clone();
        let handle = self.handle.clone();
        let timeout_ms = add_jitter(self.options.follower_timeout_ms);
        self.timer_guard = Some(self.timer.schedule_with_delay(
            chrono::Duration::milliseconds(timeout_ms),
            move || {
                let arc_state = arc_state.clone();
                let me = me.clone();
                handle.spawn(async move {
                    info!("[{}] Timed out waiting for leader heartbeat", me);
                    RaftImpl::election_loop(arc_state, term + 1).await;
                });
            },
        ));
    }

    // The follower positions a fresh leader starts out with.
    fn initial_follower_positions(&self) -> HashMap<String, FollowerPosition> {
        let mut result = HashMap::new();
        for server in self.cluster.others() {
            result.insert(
                server_key(&server),
                FollowerPosition {
                    // Assume the follower is caught up until an append
                    // proves otherwise.
                    next_index: self.store.next_index(),
                    match_index: 0,
                },
            );
        }
        result
    }

    // Builds the append request for one follower based on its recorded
    // position. Only valid on a current leader.
    fn build_append_request(&self, follower: &Server) -> AppendRequest {
        // The id of the entry right before the ones we are about to send.
        let position = self
            .followers
            .get(server_key(follower).as_str())
            .expect("follower position");
        let previous = self.store.entry_id_at_index(position.next_index - 1);

        AppendRequest {
            term: self.store.term(),
            leader: Some(self.cluster.me()),
            previous: Some(previous),
            entries: self.store.get_entries_after(previous.index),
            committed: self.store.committed_index(),
        }
    }

    // Folds a follower's append response into its recorded position. The
    // response's term must already have been checked against ours.
    fn handle_append_response(&mut self, peer: &Server, response: &AppendResponse) {
        let follower = self.followers.get_mut(server_key(peer).as_str());
        if follower.is_none() {
            info!(
                "[{}] Ignoring append response for unknown peer [{}]",
                self.name,
                server_name(peer)
            );
            return;
        }

        let f = follower.unwrap();
        if !response.success {
            // A rejection means the follower's log diverges before the point
            // our batch tried to attach at. Walk next_index back towards the
            // index the follower last reported, one step at a time in case
            // the reply is stale.
            f.next_index = max(1, min(f.next_index - 1, response.match_index + 1));
            info!(
                "[{}] Decremented next_index for peer [{}] to {}",
                self.name,
                server_name(peer),
                f.next_index
            );
            return;
        }

        // The follower has confirmed entries up to "match_index". Stale replies
        // arriving out of order must never move the position backwards.
        let old = f.clone();
        if response.match_index > f.match_index {
            f.match_index = response.match_index;
        }
        f.next_index = max(f.next_index, f.match_index + 1);
        if f != &old {
            debug!(
                "[{}] Follower state for peer [{}] is now (next={},match={})",
                self.name,
                server_name(peer),
                f.next_index,
                f.match_index
            );
        }
    }

    // Moves the commit index forward to the highest index a quorum of the
    // cluster holds. Only entries of the current term are counted directly,
    // earlier entries are committed along with them.
    async fn update_committed(&mut self) {
        let current_term = self.store.term();
        let mut target = self.store.committed_index();
        for index in self.store.committed_index() + 1..self.store.next_index() {
            let mut matches = 1; // Counting ourselves.
            for follower in self.followers.values() {
                if follower.match_index >= index {
                    matches = matches + 1;
                }
            }

            if matches >= self.cluster.quorum_size()
                && self.store.entry_id_at_index(index).term == current_term
            {
                target = index;
            }
        }

        if target > self.store.committed_index() {
            self.store.commit_to(target).await;
        }
    }

    // The vote request this member sends out when campaigning.
    fn build_vote_request(&self) -> VoteRequest {
        VoteRequest {
            term: self.store.term(),
            candidate: Some(self.cluster.me()),
            last: Some(self.store.last_log_id()),
        }
    }
}

#[tonic::async_trait]
impl Raft for RaftImpl {
    async fn vote(&self, request: Request<VoteRequest>) -> Result<Response<VoteResponse>, Status> {
        let request = request.into_inner();
        let arc_state = self.state.clone();
        let mut state = self.state.lock().await;
        info!("[{}] Handling vote request: [{:?}]", state.name, request);

        if state.halted {
            return Err(RaftError::Halted.into());
        }

        // A candidate from an older term only gets told our term.
        if state.store.term() > request.term {
            return Ok(Response::new(VoteResponse {
                term: state.store.term(),
                granted: false,
            }));
        }

        // A newer term moves us to follower first. The vote decision below
        // then happens inside that term, where our vote may still be open.
        if request.term > state.store.term() {
            RaftImpl::become_follower(&mut state, arc_state.clone(), request.term).await;
            if state.halted {
                return Err(RaftError::Halted.into());
            }
        }

        let candidate = request
            .candidate
            .ok_or_else(|| Status::from(RaftError::missing("candidate")))?;
        let last = request.last.unwrap_or_default();
        let term = state.store.term();

        // At most one vote per term, always the same one when asked again.
        let available = match state.store.voted_for() {
            None => true,
            Some(voted) => voted == candidate,
        };
        if !available {
            info!("[{}] Rejecting, already voted in term {}", state.name, term);
            return Ok(Response::new(VoteResponse {
                term,
                granted: false,
            }));
        }

        if state.store.log_is_up_to_date(&last) {
            if let Err(failure) = state.store.update_voted_for(&Some(candidate)).await {
                state.halt(&failure);
                return Err(failure.into());
            }
            // A vote grant resets the election timer, same as leader contact.
            state.reset_election_timer(arc_state);
            info!("[{}] Granted vote", state.name);
            Ok(Response::new(VoteResponse {
                term,
                granted: true,
            }))
        } else {
            info!("[{}] Denied vote, candidate log out of date", state.name);
            Ok(Response::new(VoteResponse {
                term,
                granted: false,
            }))
        }
    }

    async fn append(
        &self,
        request: Request<AppendRequest>,
    ) -> Result<Response<AppendResponse>, Status> {
        let request = request.into_inner();
        let arc_state = self.state.clone();
        let mut state = self.state.lock().await;
        debug!("[{}] Handling append request: [{:?}]", state.name, request);

        if state.halted {
            return Err(RaftError::Halted.into());
        }

        // A sender behind on terms is a deposed leader. A failed response
        // carrying our term tells it so.
        if state.store.term() > request.term {
            return Ok(Response::new(AppendResponse {
                term: state.store.term(),
                success: false,
                match_index: 0,
            }));
        }

        // The sender is the one true leader for its term. If its term is
        // greater than ours we adopt it, and even at an equal term a candidate
        // yields. The append itself is processed below, inside the new role.
        if request.term > state.store.term() || state.role != RaftRole::Follower {
            RaftImpl::become_follower(&mut state, arc_state.clone(), request.term).await;
            if state.halted {
                return Err(RaftError::Halted.into());
            }
        }

        // Take note of who leads this term.
        let leader = request
            .leader
            .ok_or_else(|| Status::from(RaftError::missing("leader")))?;
        state.cluster.observe_leader(&leader);
        if let Some(diagnostics) = &state.diagnostics {
            diagnostics
                .lock()
                .await
                .report_leader(state.store.term(), &leader);
        }

        // Reset the election timer, we have heard from a live leader.
        state.reset_election_timer(arc_state);

        let term = state.store.term();

        // Make sure we have the entry the leader considers replicated on us.
        // If not, report our last index so the leader can back off to it.
        let previous = request.previous.unwrap_or_default();
        if !state.store.log_contains(&previous) {
            return Ok(Response::new(AppendResponse {
                term,
                success: false,
                match_index: state.store.last_log_id().index,
            }));
        }

        if !request.entries.is_empty() {
            if let Err(failure) = state.store.append_all(&request.entries).await {
                return match failure {
                    RaftError::NonContiguousLog { .. } | RaftError::InvalidArgument(_) => {
                        Err(Status::invalid_argument(failure.to_string()))
                    }
                    failure => {
                        state.halt(&failure);
                        Err(failure.into())
                    }
                };
            }
        }

        // An index the leader reports committed is settled across the
        // cluster, so applying up to it is safe. Our own last entry is the
        // cap, nothing past it has been matched against the leader yet.
        let limit = min(request.committed, state.store.last_log_id().index);
        state.store.commit_to(limit).await;

        let match_index = previous.index + request.entries.len() as u64;
        debug!("[{}] Successfully processed append", state.name);
        Ok(Response::new(AppendResponse {
            term,
            success: true,
            match_index,
        }))
    }

    async fn submit(
        &self,
        request: Request<SubmitRequest>,
    ) -> Result<Response<SubmitResponse>, Status> {
        let request = request.into_inner();
        let entry_id;
        let receiver;
        {
            let mut state = self.state.lock().await;
            debug!("[{}] Handling submit request", state.name);

            if state.halted {
                return Err(RaftError::Halted.into());
            }

            if state.role != RaftRole::Leader {
                return Ok(Response::new(SubmitResponse {
                    status: ResponseStatus::NotLeader.into(),
                    entry_id: None,
                    leader: state.cluster.leader(),
                }));
            }

            let term = state.store.term();
            match state.store.append(term, Data::Payload(request.payload)).await {
                Ok(id) => entry_id = id,
                Err(failure) => {
                    state.halt(&failure);
                    return Err(failure.into());
                }
            }
            receiver = state.store.add_listener(entry_id.index);
        }

        // Nudge a replication round along instead of waiting out the tick.
        let nudge = self.state.clone();
        let term = entry_id.term;
        tokio::spawn(async move {
            RaftImpl::replicate_entries(nudge, term).await;
        });

        // Wait for the entry to be replicated without holding up the regular
        // operations of this member.
        let commit_outcome = receiver.await;

        let state = self.state.lock().await;
        match commit_outcome {
            Ok(committed_id) if committed_id == entry_id => Ok(Response::new(SubmitResponse {
                status: ResponseStatus::Success.into(),
                entry_id: Some(entry_id),
                leader: Some(state.cluster.me()),
            })),

            // Either our entry got truncated (the listener is cancelled) or a
            // different entry was committed at its index. The submitted payload
            // is guaranteed never to commit, so retrying it is safe.
            _ => Ok(Response::new(SubmitResponse {
                status: ResponseStatus::LeadershipLost.into(),
                entry_id: None,
                leader: state.cluster.leader(),
            })),
        }
    }

    async fn step_down(
        &self,
        _request: Request<StepDownRequest>,
    ) -> Result<Response<StepDownResponse>, Status> {
        let arc_state = self.state.clone();
        let mut state = self.state.lock().await;
        debug!("[{}] Handling step down request", state.name);

        if state.halted {
            return Err(RaftError::Halted.into());
        }

        if state.role != RaftRole::Leader {
            return Ok(Response::new(StepDownResponse {
                status: ResponseStatus::NotLeader.into(),
                leader: state.cluster.leader(),
            }));
        }

        // Step down within the current term. The next leader emerges once a
        // follower timeout expires somewhere and triggers an election.
        let term = state.store.term();
        RaftImpl::become_follower(&mut state, arc_state, term).await;

        Ok(Response::new(StepDownResponse {
            status: ResponseStatus::Success.into(),
            leader: Some(state.cluster.me()),
        }))
    }
}

// Adds up to 25 percent of random jitter on top of the supplied bound.
fn add_jitter(lower: i64) -> i64 {
    let mut rng = rand::thread_rng();
    rng.gen_range(lower..lower + lower / 4 + 1)
}

fn server_key(server: &Server) -> String {
    format!("{}:{}", server.host, server.port)
}

fn server_name(server: &Server) -> String {
    if server.name.is_empty() {
        format!("{}:{}", server.host, server.port)
    } else {
        server.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::persistence::PersistenceOptions;
    use crate::raft::raft_common_proto::{Entry, EntryId};
    use crate::raft::testing::FakeStateMachine;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_vote_granted_once_per_term() {
        let fixture = Fixture::new().await;
        let candidate = fixture.members[1].clone();
        let other = fixture.members[2].clone();

        let response = fixture.vote(vote_request(1, &candidate, 0, 0)).await;
        assert!(response.granted);
        assert_eq!(1, response.term);

        // The same candidate asks again, e.g. because our first reply got lost.
        let response = fixture.vote(vote_request(1, &candidate, 0, 0)).await;
        assert!(response.granted);

        // A different candidate in the same term is out of luck.
        let response = fixture.vote(vote_request(1, &other, 0, 0)).await;
        assert!(!response.granted);
    }

    #[tokio::test]
    async fn test_vote_rejects_stale_term() {
        let fixture = Fixture::new().await;
        let candidate = fixture.members[1].clone();
        let other = fixture.members[2].clone();

        let response = fixture.vote(vote_request(3, &candidate, 0, 0)).await;
        assert!(response.granted);

        let response = fixture.vote(vote_request(2, &other, 0, 0)).await;
        assert!(!response.granted);
        assert_eq!(3, response.term);
    }

    #[tokio::test]
    async fn test_vote_requires_up_to_date_log() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();
        let candidate = fixture.members[2].clone();

        // Seed our log through an append from the leader of term 2.
        let response = fixture
            .append(append_request(2, &leader, (0, 0), vec![payload_entry(2, 1)], 0))
            .await;
        assert!(response.success);

        // A candidate with an empty log does not get our vote, even though its
        // term is ahead of ours.
        let response = fixture.vote(vote_request(3, &candidate, 0, 0)).await;
        assert!(!response.granted);
        assert_eq!(3, response.term);

        // A candidate which holds our last entry does.
        let response = fixture.vote(vote_request(4, &candidate, 2, 1)).await;
        assert!(response.granted);
    }

    #[tokio::test]
    async fn test_append_rejects_stale_term() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();

        let response = fixture
            .append(append_request(3, &leader, (0, 0), vec![], 0))
            .await;
        assert!(response.success);

        let response = fixture
            .append(append_request(2, &leader, (0, 0), vec![], 0))
            .await;
        assert!(!response.success);
        assert_eq!(3, response.term);
    }

    #[tokio::test]
    async fn test_append_reports_last_index_on_mismatch() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();

        // The leader assumes we hold entries we have never seen.
        let response = fixture
            .append(append_request(2, &leader, (1, 5), vec![], 0))
            .await;
        assert!(!response.success);
        assert_eq!(0, response.match_index);

        let response = fixture
            .append(append_request(
                2,
                &leader,
                (0, 0),
                vec![payload_entry(2, 1), payload_entry(2, 2)],
                0,
            ))
            .await;
        assert!(response.success);
        assert_eq!(2, response.match_index);

        // An entry id which disagrees with our log also counts as missing.
        let response = fixture
            .append(append_request(2, &leader, (1, 1), vec![payload_entry(2, 2)], 0))
            .await;
        assert!(!response.success);
        assert_eq!(2, response.match_index);
    }

    #[tokio::test]
    async fn test_append_replay_is_idempotent() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();
        let entries = vec![payload_entry(2, 1), payload_entry(2, 2)];

        let response = fixture
            .append(append_request(2, &leader, (0, 0), entries.clone(), 0))
            .await;
        assert!(response.success);
        assert_eq!(2, response.match_index);

        // The same batch delivered again, this time with a commit index.
        let response = fixture
            .append(append_request(2, &leader, (0, 0), entries, 2))
            .await;
        assert!(response.success);
        assert_eq!(2, response.match_index);

        assert_eq!(2, fixture.raft.commit_index().await);
        let machine = fixture.state_machine.lock().await;
        assert_eq!(2, machine.applied_count());
    }

    #[tokio::test]
    async fn test_append_truncates_conflicting_suffix() {
        let fixture = Fixture::new().await;
        let old_leader = fixture.members[1].clone();
        let new_leader = fixture.members[2].clone();

        let response = fixture
            .append(append_request(
                2,
                &old_leader,
                (0, 0),
                vec![payload_entry(2, 1), payload_entry(2, 2), payload_entry(2, 3)],
                1,
            ))
            .await;
        assert!(response.success);

        // The leader of term 3 replaces everything after index 1.
        let replacement = Entry {
            id: Some(EntryId { term: 3, index: 2 }),
            data: Some(Data::Payload("replacement".as_bytes().to_vec())),
        };
        let response = fixture
            .append(append_request(3, &new_leader, (2, 1), vec![replacement], 2))
            .await;
        assert!(response.success);
        assert_eq!(2, response.match_index);

        // A heartbeat consistent with the replacement log goes through.
        let response = fixture
            .append(append_request(3, &new_leader, (3, 2), vec![], 2))
            .await;
        assert!(response.success);

        assert_eq!(2, fixture.raft.commit_index().await);
        let machine = fixture.state_machine.lock().await;
        assert_eq!(2, machine.applied_count());
        assert_eq!((2, Bytes::from("replacement")), machine.applied()[1].clone());
    }

    #[tokio::test]
    async fn test_append_commit_capped_by_local_log() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();

        // The leader has committed up to 9, but has only sent us one entry.
        let response = fixture
            .append(append_request(2, &leader, (0, 0), vec![payload_entry(2, 1)], 9))
            .await;
        assert!(response.success);
        assert_eq!(1, fixture.raft.commit_index().await);
    }

    #[tokio::test]
    async fn test_submit_rejected_by_follower() {
        let fixture = Fixture::new().await;

        let response = fixture
            .raft
            .submit(Request::new(SubmitRequest {
                payload: "payload".as_bytes().to_vec(),
            }))
            .await
            .expect("submit")
            .into_inner();
        assert_eq!(ResponseStatus::NotLeader, response.status());
        assert!(response.entry_id.is_none());
    }

    #[tokio::test]
    async fn test_step_down_rejected_by_follower() {
        let fixture = Fixture::new().await;

        let response = fixture
            .raft
            .step_down(Request::new(StepDownRequest {}))
            .await
            .expect("step down")
            .into_inner();
        assert_eq!(ResponseStatus::NotLeader, response.status());
    }

    #[tokio::test]
    async fn test_commit_waits_for_current_term_entry() {
        let fixture = Fixture::new().await;
        let leader = fixture.members[1].clone();

        // Hold two uncommitted entries from the leader of term 2.
        let response = fixture
            .append(append_request(
                2,
                &leader,
                (0, 0),
                vec![payload_entry(2, 1), payload_entry(2, 2)],
                0,
            ))
            .await;
        assert!(response.success);

        // Act as the leader of term 3 with both peers fully caught up.
        let mut state = fixture.raft.state.lock().await;
        state.store.update_term_info(3, &None).await.expect("term");
        state.role = RaftRole::Leader;
        state.followers = state.initial_follower_positions();
        for follower in state.followers.values_mut() {
            follower.match_index = 2;
        }

        // A quorum holds the term 2 entries, but none of them is from the
        // current term, so the commit index must stay put.
        state.update_committed().await;
        assert_eq!(0, state.store.committed_index());

        // Once a current term entry reaches a quorum, everything below it
        // commits along with it.
        state.store.append(3, Data::Marker(Marker {})).await.expect("append");
        for follower in state.followers.values_mut() {
            follower.match_index = 3;
        }
        state.update_committed().await;
        assert_eq!(3, state.store.committed_index());
        drop(state);

        let machine = fixture.state_machine.lock().await;
        assert_eq!(2, machine.applied_count());
    }

    #[tokio::test]
    async fn test_follower_position_never_regresses() {
        let fixture = Fixture::new().await;
        let peer = fixture.members[2].clone();
        let mut state = fixture.leader_state_with_log().await;
        assert_eq!((4, 0), position(&state, &peer));

        // A successful append moves both numbers forward.
        state.handle_append_response(&peer, &append_response(true, 3));
        assert_eq!((4, 3), position(&state, &peer));

        // A stale success for an earlier batch cannot move them back.
        state.handle_append_response(&peer, &append_response(true, 1));
        assert_eq!((4, 3), position(&state, &peer));
    }

    #[tokio::test]
    async fn test_follower_backoff_on_rejection() {
        let fixture = Fixture::new().await;
        let peer = fixture.members[2].clone();
        let mut state = fixture.leader_state_with_log().await;

        // The follower reports holding only its first entry.
        state.handle_append_response(&peer, &append_response(false, 1));
        assert_eq!((2, 0), position(&state, &peer));

        // Repeated rejections keep stepping down, but never below 1.
        state.handle_append_response(&peer, &append_response(false, 0));
        assert_eq!((1, 0), position(&state, &peer));
        state.handle_append_response(&peer, &append_response(false, 0));
        assert_eq!((1, 0), position(&state, &peer));
    }

    struct Fixture {
        members: Vec<Server>,
        raft: RaftImpl,
        state_machine: Arc<Mutex<FakeStateMachine>>,
    }

    impl Fixture {
        async fn new() -> Self {
            let members = make_members(3);
            let state_machine = Arc::new(Mutex::new(FakeStateMachine::new()));
            let raft = RaftImpl::new(
                &members[0],
                &members,
                state_machine.clone(),
                PersistenceOptions::NoPersistenceForTesting,
                FailureInjection::none(),
                test_options(),
                None,
            )
            .await
            .expect("create raft");
            Fixture {
                members,
                raft,
                state_machine,
            }
        }

        async fn vote(&self, request: VoteRequest) -> VoteResponse {
            self.raft
                .vote(Request::new(request))
                .await
                .expect("vote")
                .into_inner()
        }

        async fn append(&self, request: AppendRequest) -> AppendResponse {
            self.raft
                .append(Request::new(request))
                .await
                .expect("append")
                .into_inner()
        }

        // Accepts three entries from the leader of term 2, then puts this
        // member in charge as the leader of term 3 and hands out its state.
        async fn leader_state_with_log(&self) -> async_std::sync::MutexGuard<'_, RaftState> {
            let leader = self.members[1].clone();
            let response = self
                .append(append_request(
                    2,
                    &leader,
                    (0, 0),
                    vec![payload_entry(2, 1), payload_entry(2, 2), payload_entry(2, 3)],
                    0,
                ))
                .await;
            assert!(response.success);

            let mut state = self.raft.state.lock().await;
            state.store.update_term_info(3, &None).await.expect("term");
            state.role = RaftRole::Leader;
            state.followers = state.initial_follower_positions();
            state
        }
    }

    // Timeouts far beyond anything these tests run for, the timer must never
    // fire in the middle of a test.
    fn test_options() -> Options {
        Options {
            follower_timeout_ms: 100_000,
            candidate_timeout_ms: 100_000,
            leader_replicate_ms: 100_000,
            rpc_timeout_ms: 100_000,
        }
    }

    fn make_members(count: usize) -> Vec<Server> {
        (0..count)
            .map(|i| Server {
                host: "::1".to_string(),
                port: 3000 + i as i32,
                name: format!("raft-{}", i),
            })
            .collect()
    }

    fn vote_request(term: u64, candidate: &Server, last_term: u64, last_index: u64) -> VoteRequest {
        VoteRequest {
            term,
            candidate: Some(candidate.clone()),
            last: Some(EntryId {
                term: last_term,
                index: last_index,
            }),
        }
    }

    fn append_request(
        term: u64,
        leader: &Server,
        previous: (u64, u64),
        entries: Vec<Entry>,
        committed: u64,
    ) -> AppendRequest {
        AppendRequest {
            term,
            leader: Some(leader.clone()),
            previous: Some(EntryId {
                term: previous.0,
                index: previous.1,
            }),
            entries,
            committed,
        }
    }

    fn payload_entry(term: u64, index: u64) -> Entry {
        Entry {
            id: Some(EntryId { term, index }),
            data: Some(Data::Payload(format!("payload-{}", index).into_bytes())),
        }
    }

    fn append_response(success: bool, match_index: u64) -> AppendResponse {
        AppendResponse {
            term: 3,
            success,
            match_index,
        }
    }

    fn position(state: &RaftState, peer: &Server) -> (u64, u64) {
        let follower = state.followers.get(server_key(peer).as_str()).expect("position");
        (follower.next_index, follower.match_index)
    }
}
