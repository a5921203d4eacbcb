extern crate structopt;
extern crate tracing;

use async_std::sync::{Arc, Mutex};
use futures::FutureExt;
use futures::future::{join3, join4};
use std::error::Error;
use std::time::Duration;
use structopt::StructOpt;
use tokio::select;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::EnvFilter;

use crate::engine::grpc::{CompleteInstanceRequest, CreateInstanceRequest, EngineClient};
use crate::harness::Harness;
use crate::raft::raft_common_proto::Server;
use crate::raft::{Diagnostics, FailureOptions};

mod engine;
mod harness;
#[cfg(test)]
mod integration_test;
mod raft;
#[cfg(test)]
mod testing;

const CLUSTER_NAME: &str = "local";

// The dev cluster runs with a small amount of injected RPC flakiness, which
// keeps elections and retries exercised during normal operation.
fn dev_failure_options() -> FailureOptions {
    FailureOptions {
        failure_probability: 0.01,
        latency_probability: 0.05,
        latency_ms: 50,
    }
}

#[derive(Debug, StructOpt, Copy, Clone)]
struct Arguments {
    #[structopt(long = "disable_preempt")]
    disable_preempt: bool,

    #[structopt(long = "disable_validate")]
    disable_validate: bool,

    #[structopt(long = "disable_lifecycle")]
    disable_lifecycle: bool,

    #[structopt(long = "disable_observe")]
    disable_observe: bool,

    #[structopt(long = "wipe_persistence")]
    wipe_persistence: bool,
}

// Periodically preempts the cluster leader, forcing an election. This keeps
// the recovery path hot while the other loops generate traffic.
async fn run_preempt_loop(
    args: Arguments,
    member: &Server,
    shutdown: impl Future<Output = ()> + Clone,
) {
    if args.disable_preempt {
        info!("preempt loop disabled");
        return;
    }

    let client = raft::new_client("leader-preempt", member);
    loop {
        let body = async {
            // Give the cluster time to settle in between preemptions.
            sleep(Duration::from_secs(12)).await;

            let start = Instant::now();
            match client.preempt_leader().await {
                Ok(leader) => {
                    info!(preempted = %leader.name, latency_ms = %start.elapsed().as_millis(), "done")
                }
                Err(message) => error!("preempt failed: {}", message),
            }
        };

        select! {
            _ = shutdown.clone() => break,
            _ = body => (),
        }
    }
    info!("Exiting")
}

// Periodically checks the recorded cluster history for consistency. A failure
// here means the consensus implementation has misbehaved, so we abort loudly.
async fn run_validate_loop(
    args: Arguments,
    diag: Arc<Mutex<Diagnostics>>,
    shutdown: impl Future<Output = ()> + Clone,
) {
    if args.disable_validate {
        info!("validate loop disabled");
        return;
    }

    loop {
        let body = async {
            sleep(Duration::from_secs(5)).await;
            diag.lock().await.validate().await.expect("cluster history");
        };

        select! {
            _ = shutdown.clone() => break,
            _ = body => (),
        }
    }
    info!("Exiting")
}

// Repeatedly drives a process instance through its full lifecycle, creating
// it and then completing it, producing a steady stream of committed records.
async fn run_lifecycle_loop(
    args: Arguments,
    member: &Server,
    shutdown: impl Future<Output = ()> + Clone,
) {
    if args.disable_lifecycle {
        info!("lifecycle loop disabled");
        return;
    }

    let address = format!("http://[{}]:{}", member.host, member.port);
    let mut iteration = 0;
    loop {
        let body = async {
            // Reconnect on every pass, the server may have been unreachable.
            let mut client = EngineClient::connect(address.clone()).await.expect("connect");
            let start = Instant::now();

            let outcome = async {
                let key = client
                    .create_instance(CreateInstanceRequest {
                        process_id: "demo-process".to_string(),
                    })
                    .await?
                    .into_inner()
                    .key;
                client.complete_instance(CompleteInstanceRequest { key }).await?;
                Ok::<u64, tonic::Status>(key)
            }
            .await;

            match outcome {
                Ok(key) => {
                    if iteration % 10 == 1 {
                        info!(iteration, key, latency_ms = %start.elapsed().as_millis(), "done")
                    }
                }
                Err(status) => {
                    info!(iteration, latency_ms = %start.elapsed().as_millis(), "failed: {}", status)
                }
            }
            iteration += 1;
            sleep(Duration::from_millis(1000)).await;
        };

        select! {
            _ = shutdown.clone() => break,
            _ = body => (),
        }
    }
    info!("Exiting")
}

// Periodically fetches the status page of a member and logs the contents,
// giving a rough view of the cluster making progress.
async fn run_observe_loop(
    args: Arguments,
    member: &Server,
    shutdown: impl Future<Output = ()> + Clone,
) {
    if args.disable_observe {
        info!("observe loop disabled");
        return;
    }

    let url = format!("http://[{}]:{}/engine/status", member.host, member.port);
    loop {
        let body = async {
            sleep(Duration::from_secs(5)).await;
            match fetch_status(url.as_str()).await {
                Ok(text) => info!("{}", text.trim_end()),
                Err(message) => error!("status fetch failed: {}", message),
            }
        };

        select! {
            _ = shutdown.clone() => break,
            _ = body => (),
        }
    }
    info!("Exiting")
}

async fn fetch_status(url: &str) -> Result<String, reqwest::Error> {
    reqwest::get(url).await?.text().await
}

fn names() -> Vec<String> {
    (b'A'..=b'E').map(|c| (c as char).to_string()).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Log filtering is configured through the RUST_LOG env variable, e.g.:
    // > RUST_LOG=info,baton::engine=debug cargo run
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::from("baton=info"));
    tracing_subscriber::FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(env_filter)
        .init();

    let arguments = Arguments::from_args();
    let (harness, serving) = Harness::builder(names())
        .await
        .expect("builder")
        .with_failure(dev_failure_options())
        .with_file_persistence()
        .build(CLUSTER_NAME, arguments.wipe_persistence)
        .await
        .expect("harness");

    let diagnostics = harness.diagnostics();
    harness.start().await;
    info!("Started {} members", harness.addresses().len());

    // All the client loops watch a single shared future for shutdown.
    let (stop, stopped) = async_std::channel::unbounded::<()>();
    let stop_signal = async { stopped.recv().await.unwrap_or(()) }.shared();

    // The loops all talk to the first member, which redirects as needed.
    let first = harness.addresses().first().expect("members").clone();
    let clients = join4(
        run_lifecycle_loop(arguments, &first, stop_signal.clone())
            .instrument(info_span!("lifecycle")),
        run_preempt_loop(arguments, &first, stop_signal.clone()).instrument(info_span!("preempt")),
        run_validate_loop(arguments, diagnostics, stop_signal.clone())
            .instrument(info_span!("validate")),
        run_observe_loop(arguments, &first, stop_signal.clone()).instrument(info_span!("observe")),
    )
    .shared();

    // On ctrl-c, wind down the client loops before taking down the servers.
    let harness = Arc::new(harness);
    let stopping_harness = harness.clone();
    let stopping_clients = clients.clone();
    let signal_handler = async move {
        tokio::signal::ctrl_c().await.expect("ctrl-c");
        info!("Received ctrl-c, shutting down");

        stop.send(()).await.expect("stop-send");
        stopping_clients.await;
        stopping_harness.stop().await;
    };

    join3(serving, signal_handler, clients).await;
    info!("Shutdown complete");
    Ok(())
}
