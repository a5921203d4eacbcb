use crate::engine::grpc::{
    CancelInstanceRequest, CompleteInstanceRequest, CreateInstanceRequest, EngineClient,
    GetInstanceRequest, Instance, InstanceState,
};
use crate::harness::Harness;
use crate::raft::raft_common_proto::entry::Data;
use crate::raft::raft_common_proto::{Entry, Server};
use crate::raft::{Options, new_client};
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tonic::transport::Channel;

const TIMEOUT: Duration = Duration::from_secs(3);
const NAMES: [&str; 3] = ["alpha", "beta", "gamma"];

#[tokio::test]
async fn test_elects_initial_leader() {
    let harness = start_cluster(&NAMES).await;

    harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_elects_leader_large_cluster() {
    let n = 17;
    let owned: Vec<String> = (1..=n).map(|i| format!("n{}", i)).collect();
    let names: Vec<&str> = owned.iter().map(String::as_str).collect();
    let harness = start_cluster(&names).await;

    harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_two_member_cluster() {
    let harness = start_cluster(&["left", "right"]).await;

    harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    // Both members form the quorum, so this proves full replication.
    let key = create_instance(&harness, "order-process").await;
    harness
        .wait_for_instance(key, InstanceState::Active, TIMEOUT)
        .await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_disconnect_leader() {
    let harness = start_cluster(&NAMES).await;

    // Capture the first leader, then cut it off from the others.
    let (term1, leader1) = harness.wait_for_leader(TIMEOUT, term_above(0)).await;
    harness.failures().disconnect(&leader1);

    // A leader in a later term must emerge, and it cannot be the member we
    // cut off.
    let (term2, leader2) = harness.wait_for_leader(TIMEOUT, term_above(term1)).await;
    assert_ne!(leader2.name, leader1.name);

    // Swap the partition over to the second leader.
    harness.failures().reconnect(&leader1);
    harness.failures().disconnect(&leader2);

    // Same again, a still later term won by somebody reachable.
    let (_, leader3) = harness.wait_for_leader(TIMEOUT, term_above(term2)).await;
    assert_ne!(leader3.name, leader2.name);

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_submit() {
    let harness = start_cluster(&NAMES).await;
    harness.wait_for_leader(TIMEOUT, term_above(0)).await;
    let client = harness.make_raft_client();

    let payload: &[u8] = "solo-payload".as_bytes();
    let result = client.submit(payload).await;

    // The leader occupies index 1 with its marker entry, so the payload can
    // land no earlier than index 2.
    let entry_id = result.expect("submit");
    assert!(entry_id.term >= 1);
    assert!(entry_id.index >= 2);

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_submit_via_follower() {
    let harness = start_cluster(&NAMES).await;
    let (_, leader) = harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    // Aim the client at a member which is not the leader, forcing it to
    // follow the returned redirects.
    let follower = harness
        .addresses()
        .into_iter()
        .find(|address| address.name != leader.name)
        .expect("follower");
    let client = new_client("test-client", &follower);

    let result = client.submit("forwarded-payload".as_bytes()).await;
    assert!(result.is_ok());

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_step_down() {
    let harness = start_cluster(&NAMES).await;
    let (term1, leader1) = harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    let client = harness.make_raft_client();
    let preempted = client.preempt_leader().await.expect("preempt");
    assert_eq!(preempted.name, leader1.name);

    // The next leader must show up in a later term. Note that the preempted
    // node remains a valid candidate, so we make no claim about identity.
    harness.wait_for_leader(TIMEOUT, term_above(term1)).await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_convergence_across_cluster_sizes() {
    for size in 2..=5usize {
        let owned: Vec<String> = (1..=size).map(|i| format!("m{}", i)).collect();
        let names: Vec<&str> = owned.iter().map(String::as_str).collect();
        let harness = start_cluster(&names).await;
        harness.wait_for_leader(TIMEOUT, term_above(0)).await;

        let payload = format!("converge-{}", size).into_bytes();
        let client = harness.make_raft_client();
        let entry_id = client.submit(&payload).await.expect("submit");

        // The payload sits above the leader's marker entry. Once every
        // member's commit index covers it, every member must hold exactly
        // one payload entry.
        assert!(entry_id.index >= 2);
        harness.wait_for_commit(entry_id.index, TIMEOUT).await;
        for log in harness.member_logs().await {
            assert_eq!(vec![payload.clone()], payloads(&log), "cluster size {}", size);
        }

        harness.validate().await;
        harness.stop().await;
    }
}

#[tokio::test]
async fn test_convergence_many_entries() {
    let harness = start_cluster(&NAMES).await;
    harness.wait_for_leader(TIMEOUT, term_above(0)).await;
    let client = harness.make_raft_client();

    let count = 128usize;
    let mut last_index = 0;
    for i in 0..count {
        let payload = format!("entry-{}", i).into_bytes();
        let entry_id = client.submit(&payload).await.expect("submit");
        last_index = entry_id.index;
    }

    // Every member ends up with the same payload sequence, in submission
    // order.
    harness.wait_for_commit(last_index, TIMEOUT).await;
    let logs = harness.member_logs().await;
    let reference = payloads(&logs[0]);
    assert_eq!(count, reference.len());
    for (i, payload) in reference.iter().enumerate() {
        assert_eq!(&format!("entry-{}", i).into_bytes(), payload);
    }
    for log in &logs[1..] {
        assert_eq!(reference, payloads(log));
    }

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_engine() {
    let harness = start_cluster(&NAMES).await;
    let mut client = harness.make_engine_client().await;

    let key = create_instance(&harness, "invoice-process").await;
    let response = harness
        .wait_for_instance(key, InstanceState::Active, TIMEOUT)
        .await;
    assert_eq!(response.instance.expect("instance").process_id, "invoice-process");

    client
        .complete_instance(CompleteInstanceRequest { key })
        .await
        .expect("complete");
    harness
        .wait_for_instance(key, InstanceState::Completed, TIMEOUT)
        .await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_engine_cancel() {
    let harness = start_cluster(&NAMES).await;
    let mut client = harness.make_engine_client().await;

    let key = create_instance(&harness, "doomed-process").await;
    harness
        .wait_for_instance(key, InstanceState::Active, TIMEOUT)
        .await;

    client
        .cancel_instance(CancelInstanceRequest { key })
        .await
        .expect("cancel");
    harness
        .wait_for_instance(key, InstanceState::Cancelled, TIMEOUT)
        .await;

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_engine_convergence() {
    let harness = start_cluster(&NAMES).await;
    harness.wait_for_leader(TIMEOUT, term_above(0)).await;
    let client = harness.make_engine_client().await;

    // Create a batch of instances concurrently so they commit in a few
    // replication rounds rather than one at a time.
    let mut tasks = Vec::new();
    for i in 0..32 {
        let mut c = client.clone();
        tasks.push(async move {
            let process_id = format!("process-{}", i);
            let key = c
                .create_instance(CreateInstanceRequest {
                    process_id: process_id.clone(),
                })
                .await
                .expect("create")
                .into_inner()
                .key;
            (process_id, key)
        });
    }
    let created = join_all(tasks).await;

    // Every instance must have been assigned a distinct key.
    let keys: HashSet<u64> = created.iter().map(|(_, key)| *key).collect();
    assert_eq!(created.len(), keys.len());

    // Every member must eventually hold every instance with identical contents.
    for server in harness.addresses() {
        for (process_id, key) in &created {
            let instance = wait_for_member_instance(&server, *key, InstanceState::Active).await;
            assert_eq!(&instance.process_id, process_id);
        }
    }

    harness.validate().await;
    harness.stop().await;
}

#[tokio::test]
async fn test_http_status() {
    let harness = start_cluster(&NAMES).await;
    harness.wait_for_leader(TIMEOUT, term_above(0)).await;

    let address = harness.addresses()[0].clone();
    let url = format!("http://[{}]:{}/engine/status", address.host, address.port);
    let body = reqwest::get(url)
        .await
        .expect("get")
        .text()
        .await
        .expect("text");

    assert!(body.contains("server=alpha"));
    assert!(body.contains("instances="));

    harness.stop().await;
}

// Matcher accepting any leader whose term exceeds the given one.
fn term_above(n: u64) -> Box<dyn Fn(&(u64, Server)) -> bool> {
    Box::new(move |(term, _)| *term > n)
}

// The payload bytes of the supplied log, markers skipped.
fn payloads(log: &[Entry]) -> Vec<Vec<u8>> {
    log.iter()
        .filter_map(|entry| match &entry.data {
            Some(Data::Payload(payload)) => Some(payload.clone()),
            _ => None,
        })
        .collect()
}

// Creates an instance of the supplied process and returns its key.
async fn create_instance(harness: &Harness, process_id: &str) -> u64 {
    let mut client = harness.make_engine_client().await;
    client
        .create_instance(CreateInstanceRequest {
            process_id: process_id.to_string(),
        })
        .await
        .expect("create")
        .into_inner()
        .key
}

// Polls the supplied member directly until it returns the instance in the
// supplied state.
async fn wait_for_member_instance(server: &Server, key: u64, state: InstanceState) -> Instance {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let mut client = engine_client(server).await;
        let found = client
            .get_instance(GetInstanceRequest { key })
            .await
            .ok()
            .and_then(|response| response.into_inner().instance)
            .filter(|instance| instance.state() == state);
        if let Some(instance) = found {
            return instance;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for instance {} on {}",
            key,
            server.name
        );
        sleep(Duration::from_millis(100)).await;
    }
}

async fn engine_client(server: &Server) -> EngineClient<Channel> {
    let address = format!("http://[{}]:{}", server.host, server.port);
    EngineClient::connect(address).await.expect("connect")
}

async fn start_cluster(nodes: &[&str]) -> Harness {
    let names = nodes.iter().map(|s| s.to_string()).collect();
    let builder = Harness::builder(names)
        .await
        .expect("builder")
        .with_options(test_options());

    let (harness, serving) = builder.build("test-cluster", false).await.expect("harness");
    harness.start().await;
    tokio::spawn(async { serving.await });
    harness
}

// Timings tightened so elections and replication settle well within TIMEOUT.
fn test_options() -> Options {
    Options {
        follower_timeout_ms: 500,
        candidate_timeout_ms: 600,
        leader_replicate_ms: 100,
        rpc_timeout_ms: 300,
    }
}
