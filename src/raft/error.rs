use crate::raft::persistence::PersistenceError;
use thiserror::Error;
use tonic::Status;

/// Shorthand for results produced by raft operations.
pub type RaftResult<T> = Result<T, RaftError>;

/// Everything that can go wrong inside the raft package.
#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Could not initialize member: {0}")]
    Initialization(String),

    #[error("Rpc to peer {peer} failed: {status}")]
    Rpc {
        peer: String,
        #[source]
        status: Status,
    },

    #[error("Could not connect to peer {peer}: {source}")]
    ConnectionFailed {
        peer: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Bad request: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Log entries out of order, expected index {expected} but got {actual}")]
    NonContiguousLog { expected: u64, actual: u64 },

    #[error("Durable write failed, member halted: {source}")]
    Storage {
        #[source]
        source: PersistenceError,
    },

    #[error("Member has halted after a fatal error")]
    Halted,
}

impl RaftError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::InvalidArgument(format!("Request is missing field {}", field))
    }
}

impl From<PersistenceError> for RaftError {
    fn from(source: PersistenceError) -> Self {
        RaftError::Storage { source }
    }
}

// How raft errors surface to grpc callers. Validation problems map to
// invalid_argument, a halted member reports unavailable, the rest is internal.
impl From<RaftError> for Status {
    fn from(err: RaftError) -> Self {
        match err {
            RaftError::InvalidArgument(_) | RaftError::NonContiguousLog { .. } => {
                Status::invalid_argument(err.to_string())
            }
            RaftError::Storage { .. } | RaftError::Halted => Status::unavailable(err.to_string()),
            _ => Status::internal(err.to_string()),
        }
    }
}
