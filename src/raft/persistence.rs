use crate::raft::raft_common_proto::{Entry, Server};
use crate::raft::raft_persistence_proto::State;
use async_std::fs;
use async_std::fs::OpenOptions;
use async_std::path::Path;
use async_trait::async_trait;
use futures::AsyncWriteExt;
use prost::Message;
use std::io::ErrorKind;
use thiserror::Error;
use tracing::info;

const STATE_PATH: &str = "member_state.pb.bin";
const LOG_PATH: &str = "log.pb.bin";

// Durable storage for the parts of a participant's state which must survive
// a restart, i.e., the latest term, the vote cast in that term, and the log
// entries. Implementations must make sure that once one of the write methods
// returns successfully, the data survives a crash of the process.
#[async_trait]
pub trait Persistence {
    // Returns the stored state, or None if this backend holds no state (e.g.,
    // a brand new directory).
    async fn read(&self) -> Result<Option<LoadedState>, PersistenceError>;

    // Atomically stores term, vote and log entries.
    async fn write(
        &self,
        term: u64,
        voted: &Option<Server>,
        entries: &[Entry],
    ) -> Result<(), PersistenceError>;

    // Stores term and vote, leaving the entries untouched.
    async fn write_state(&self, term: u64, voted: &Option<Server>) -> Result<(), PersistenceError>;

    // Stores the log entries, leaving term and vote untouched.
    async fn write_entries(&self, entries: &[Entry]) -> Result<(), PersistenceError>;
}

// The state loaded from a persistence backend upon restart.
pub struct LoadedState {
    pub term: u64,
    pub voted_for: Option<Server>,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub struct FilePersistenceOptions {
    // The directory backing the persistence, created if necessary.
    pub directory: String,

    // If true, any stored state in the directory is discarded on startup.
    pub wipe: bool,
}

#[derive(Debug, Clone)]
pub enum PersistenceOptions {
    FilePersistence(FilePersistenceOptions),
    NoPersistenceForTesting,
}

pub async fn new(
    options: PersistenceOptions,
) -> Result<Box<dyn Persistence + Send>, PersistenceError> {
    match options {
        PersistenceOptions::FilePersistence(file_options) => {
            FilePersistence::new(&file_options).await
        }
        PersistenceOptions::NoPersistenceForTesting => Ok(Box::new(NoopPersistence {})),
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct PersistenceError {
    message: String,
}

impl PersistenceError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

struct NoopPersistence {}

#[async_trait]
impl Persistence for NoopPersistence {
    async fn read(&self) -> Result<Option<LoadedState>, PersistenceError> {
        Ok(None)
    }
    async fn write(&self, _: u64, _: &Option<Server>, _: &[Entry]) -> Result<(), PersistenceError> {
        Ok(())
    }
    async fn write_state(&self, _: u64, _: &Option<Server>) -> Result<(), PersistenceError> {
        Ok(())
    }
    async fn write_entries(&self, _: &[Entry]) -> Result<(), PersistenceError> {
        Ok(())
    }
}

struct FilePersistence {
    directory: String,
}

impl FilePersistence {
    pub async fn new(
        options: &FilePersistenceOptions,
    ) -> Result<Box<dyn Persistence + Send>, PersistenceError> {
        let directory = options.directory.as_str();
        ensure_directory(directory).await?;

        let result = Box::new(FilePersistence {
            directory: directory.to_string(),
        });
        if options.wipe {
            result.remove_if_exists(STATE_PATH).await?;
            result.remove_if_exists(LOG_PATH).await?;
            info!("Wiped existing state from directory {}", directory);
        }

        info!("File persistence ready in directory {}", directory);
        Ok(result)
    }

    // Writes the supplied bytes to a sibling file and renames it over the
    // destination, so that a crash leaves either the old contents or the new
    // contents, never a torn file.
    async fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<(), PersistenceError> {
        let path = Path::new(self.directory.as_str()).join(filename);
        let tmp_path = Path::new(self.directory.as_str()).join(format!("{}.tmp", filename));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path.clone())
            .await
            .map_err(|e| {
                PersistenceError::new(format!(
                    "Failed to open file {:?} : {}",
                    tmp_path.to_str(),
                    e.to_string()
                ))
            })?;

        file.write_all(data).await.map_err(|e| {
            PersistenceError::new(format!(
                "Failed to write to file {:?} : {}",
                tmp_path.to_str(),
                e.to_string()
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            PersistenceError::new(format!(
                "Failed to sync file {:?} : {}",
                tmp_path.to_str(),
                e.to_string()
            ))
        })?;

        fs::rename(tmp_path.clone(), path.clone()).await.map_err(|e| {
            PersistenceError::new(format!(
                "Failed to rename {:?} to {:?} : {}",
                tmp_path.to_str(),
                path.to_str(),
                e.to_string()
            ))
        })
    }

    async fn read_file_if_exists(
        &self,
        filename: &str,
    ) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = Path::new(self.directory.as_str()).join(filename);
        match fs::read(path.clone()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::new(format!(
                "Failed to read file {:?} : {}",
                path.to_str(),
                e.to_string()
            ))),
        }
    }

    async fn remove_if_exists(&self, filename: &str) -> Result<(), PersistenceError> {
        let path = Path::new(self.directory.as_str()).join(filename);
        match fs::remove_file(path.clone()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::new(format!(
                "Failed to remove file {:?} : {}",
                path.to_str(),
                e.to_string()
            ))),
        }
    }
}

#[async_trait]
impl Persistence for FilePersistence {
    async fn read(&self) -> Result<Option<LoadedState>, PersistenceError> {
        let state_bytes = match self.read_file_if_exists(STATE_PATH).await? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let state = State::decode(state_bytes.as_slice()).map_err(|e| {
            PersistenceError::new(format!("Failed to decode main state file : {}", e))
        })?;

        let mut entries = Vec::new();
        if let Some(log_bytes) = self.read_file_if_exists(LOG_PATH).await? {
            let mut slice = log_bytes.as_slice();
            while !slice.is_empty() {
                let entry = Entry::decode_length_delimited(&mut slice).map_err(|e| {
                    PersistenceError::new(format!("Failed to decode log file : {}", e))
                })?;
                entries.push(entry);
            }
        }

        Ok(Some(LoadedState {
            term: state.term,
            voted_for: state.voted_for,
            entries,
        }))
    }

    async fn write(
        &self,
        term: u64,
        voted: &Option<Server>,
        entries: &[Entry],
    ) -> Result<(), PersistenceError> {
        // The term must be durable before any entries tagged with it.
        self.write_state(term, voted).await?;
        self.write_entries(entries).await
    }

    async fn write_state(&self, term: u64, voted: &Option<Server>) -> Result<(), PersistenceError> {
        let output = State {
            term,
            voted_for: voted.clone(),
        };
        self.write_atomic(STATE_PATH, &output.encode_to_vec())
            .await
    }

    // TODO: Append to the log file incrementally instead of rewriting the
    // whole file on every change.
    async fn write_entries(&self, entries: &[Entry]) -> Result<(), PersistenceError> {
        let mut buffer = Vec::new();
        for entry in entries {
            entry
                .encode_length_delimited(&mut buffer)
                .map_err(|e| PersistenceError::new(format!("Failed to encode entry : {}", e)))?;
        }
        self.write_atomic(LOG_PATH, &buffer).await
    }
}

async fn ensure_directory(directory: &str) -> Result<(), PersistenceError> {
    let dir_path = Path::new(directory);
    match fs::metadata(&dir_path).await {
        Ok(metadata) => {
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(PersistenceError::new(format!(
                    "Persistence path {} is not a directory",
                    directory
                )))
            }
        }
        Err(e) => {
            if e.kind() == ErrorKind::NotFound {
                fs::create_dir_all(directory).await.map_err(|e| {
                    PersistenceError::new(format!("Could not create {}: {}", directory, e))
                })
            } else {
                Err(PersistenceError::new(format!("Failed to inspect {}: {}", directory, e)))
            }
        }
    }
}
