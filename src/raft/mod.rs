#[path = "generated/raft_common_proto.rs"]
pub mod raft_common_proto;

#[path = "generated/raft_persistence_proto.rs"]
pub mod raft_persistence_proto;

#[path = "generated/raft_service_proto.rs"]
pub mod raft_service_proto;

mod cluster;
mod log;
mod store;

mod client;
pub use client::{Client, new_client};

mod consensus;
pub use consensus::{Options, RaftImpl};

mod diagnostics;
pub use diagnostics::Diagnostics;

mod error;
pub use error::{RaftError, RaftResult};

mod failure_injection;
pub use failure_injection::{FailureInjection, FailureOptions};

mod persistence;
pub use persistence::{FilePersistenceOptions, PersistenceOptions};

mod state_machine;
pub use state_machine::{StateMachine, StateMachineResult};

#[cfg(test)]
mod testing;
