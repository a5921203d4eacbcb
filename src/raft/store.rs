use async_std::sync::{Arc, Mutex};
use bytes::Bytes;
use futures::channel::oneshot::{Receiver, Sender, channel};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

use crate::raft::diagnostics::ServerDiagnostics;
use crate::raft::error::{RaftError, RaftResult};
use crate::raft::log::Log;
use crate::raft::persistence::{Persistence, PersistenceOptions};
use crate::raft::raft_common_proto::entry::Data;
use crate::raft::raft_common_proto::{Entry, EntryId, Server};
use crate::raft::{StateMachine, persistence};

// Owns everything a member stores: the in-memory log plus the durable
// copies of the log and the (term, voted_for) pair.
//
// The store is also where committed entries get fed to the state machine,
// and where callers can wait for a particular index to commit.
pub struct Store {
    // Collaborators, fixed at construction.
    name: String,
    state_machine: Arc<Mutex<dyn StateMachine + Send>>,
    persistence: Box<dyn Persistence + Send>,
    diagnostics: Option<Arc<Mutex<ServerDiagnostics>>>,

    // Mirrored to durable storage on every change.
    log: Log,
    term: u64,
    voted_for: Option<Server>,

    // Volatile progress markers, rebuilt after a restart.
    committed: u64,
    applied: u64,

    listener_uid: u64,
    listeners: BTreeSet<CommitListener>,
}

impl Store {
    pub async fn new(
        persistence_options: PersistenceOptions,
        state_machine: Arc<Mutex<dyn StateMachine + Send>>,
        name: &str,
        diagnostics: Option<Arc<Mutex<ServerDiagnostics>>>,
    ) -> RaftResult<Self> {
        let persistence = persistence::new(persistence_options)
            .await
            .map_err(RaftError::from)?;

        let mut store = Self {
            name: name.to_string(),
            state_machine,
            persistence,
            diagnostics,

            log: Log::new_empty(),
            term: 0,
            voted_for: None,

            committed: 0,
            applied: 0,

            listener_uid: 0,
            listeners: BTreeSet::new(),
        };

        // Restoring must happen before any other operation touches the store,
        // any earlier write would clobber whatever the previous run left behind.
        store.restore_persisted().await?;

        // Follow up with a full write so that all backing files exist from the
        // start. A run that only ever updates a subset of them could otherwise
        // leave behind a state that fails to load.
        store.persist_all().await?;

        Ok(store)
    }

    // Loads any previously persisted state into this store.
    async fn restore_persisted(&mut self) -> RaftResult<()> {
        if let Some(loaded) = self.persistence.read().await? {
            self.term = loaded.term;
            self.voted_for = loaded.voted_for;
            self.log = Log::new(loaded.entries)?;
        }
        Ok(())
    }

    // Writes out every piece of durable state this store tracks.
    async fn persist_all(&self) -> RaftResult<()> {
        self.persistence
            .write(self.term, &self.voted_for, self.log.entries())
            .await?;
        Ok(())
    }

    async fn persist_entries(&mut self) -> RaftResult<()> {
        self.persistence.write_entries(self.log.entries()).await?;
        Ok(())
    }

    // The highest committed index, inclusive. Zero means nothing has
    // committed yet.
    pub fn committed_index(&self) -> u64 {
        self.committed
    }

    // The highest index applied to the state machine, inclusive.
    pub fn applied_index(&self) -> u64 {
        self.applied
    }

    // The index the next appended entry will occupy.
    pub fn next_index(&self) -> u64 {
        self.log.next_index()
    }

    // Appends a new uncommitted entry under the supplied term, as leaders do
    // for incoming payloads. Returns the new entry's id once it is durable.
    pub async fn append(&mut self, term: u64, data: Data) -> RaftResult<EntryId> {
        let entry_id = self.log.append(term, data);
        self.persist_entries().await?;
        Ok(entry_id)
    }

    // Incorporates entries received from a leader. Entries already present are
    // left alone, a conflicting entry replaces the stored one and discards its
    // whole suffix. Listeners waiting on a discarded index get cancelled.
    pub async fn append_all(&mut self, entries: &[Entry]) -> RaftResult<()> {
        if let Some(truncated) = self.log.append_all(entries)? {
            assert!(
                truncated > self.committed,
                "[{}] Refusing to truncate committed entry at index {}",
                &self.name,
                truncated,
            );
            self.listeners.retain(|listener| listener.index < truncated);
        }
        self.persist_entries().await
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn voted_for(&self) -> Option<Server> {
        self.voted_for.clone()
    }

    // Records a new vote under the current term.
    pub async fn update_voted_for(&mut self, voted_for: &Option<Server>) -> RaftResult<()> {
        self.update_term_info(self.term, voted_for).await
    }

    // Moves to the supplied term and vote, making both durable.
    pub async fn update_term_info(
        &mut self,
        term: u64,
        voted_for: &Option<Server>,
    ) -> RaftResult<()> {
        assert!(term >= self.term, "Terms must never move backwards");
        self.term = term;
        self.voted_for = voted_for.clone();
        self.persistence
            .write_state(self.term, &self.voted_for)
            .await?;
        Ok(())
    }

    // Advances the committed index to the supplied value, feeding the newly
    // committed entries to the state machine and waking matching listeners.
    // Indexes at or below the current committed index are a no-op.
    pub async fn commit_to(&mut self, new_commit_index: u64) {
        if new_commit_index <= self.committed {
            return;
        }

        // Asserts that the index actually exists in the log.
        self.log.id_at(new_commit_index);

        let previous = self.committed;
        self.committed = new_commit_index;
        debug!(
            from = previous,
            to = self.committed,
            "[{}] commit index advanced",
            &self.name,
        );

        self.apply_committed().await;
        self.resolve_listeners();
    }

    // The id stored at the supplied index. Panics when the index is absent,
    // callers must know it exists (index 0 yields the sentinel id).
    pub fn entry_id_at_index(&self, index: u64) -> EntryId {
        self.log.id_at(index)
    }

    // The id of the newest entry, or the sentinel id when the log is empty.
    pub fn last_log_id(&self) -> EntryId {
        self.log.last_id()
    }

    // Whether the supplied id names an entry held in the log. The sentinel
    // id always counts as present.
    pub fn log_contains(&self, entry_id: &EntryId) -> bool {
        self.log.contains(entry_id)
    }

    // Whether a log ending in the supplied id is at least as current as ours.
    pub fn log_is_up_to_date(&self, other_last: &EntryId) -> bool {
        self.log.is_up_to_date(other_last)
    }

    // All entries strictly after the supplied index.
    pub fn get_entries_after(&self, index: u64) -> Vec<Entry> {
        self.log.get_entries_after(index)
    }

    // Hands out a receiver which fires once the supplied index commits. An
    // index that has already committed fires immediately.
    pub fn add_listener(&mut self, index: u64) -> Receiver<EntryId> {
        let (sender, receiver) = channel::<EntryId>();
        let uid = self.listener_uid;
        self.listener_uid += 1;
        self.listeners.insert(CommitListener { index, sender, uid });

        self.resolve_listeners();
        receiver
    }

    // Feeds committed entries the state machine hasn't seen yet to the state
    // machine, in index order. Marker entries advance the applied index
    // without reaching the machine. Safe to call in any role.
    async fn apply_committed(&mut self) {
        while self.applied < self.committed {
            self.applied += 1;
            let entry = self.log.entry_at(self.applied);
            let entry_id = entry.id.expect("id");

            if let Some(Data::Payload(bytes)) = &entry.data {
                let payload = Bytes::from(bytes.clone());
                let outcome = self
                    .state_machine
                    .lock()
                    .await
                    .apply(self.applied, &payload)
                    .await;
                match outcome {
                    Ok(()) => debug!(entry = %display_id(&entry_id), "applied"),
                    Err(message) => {
                        // A rejected payload still counts as applied.
                        warn!(entry = %display_id(&entry_id), "failed to apply: {}", message);
                    }
                }
            }

            if let Some(diagnostics) = &self.diagnostics {
                let fingerprint = fingerprint(&entry);
                diagnostics
                    .lock()
                    .await
                    .report_applied(&entry_id, fingerprint);
            }
        }
    }

    // Completes every pending listener whose index has committed.
    fn resolve_listeners(&mut self) {
        while let Some(head) = self.listeners.first() {
            if head.index > self.committed {
                break;
            }
            let next = self.listeners.pop_first().expect("nonempty");
            let index = next.index;
            if next.sender.send(self.log.id_at(index)).is_err() {
                warn!("Listener for commit {} no longer listening", index);
            }
        }
    }
}

// Returns a stable digest of an entry's contents, used to cross-check that
// members apply identical entries at every index.
fn fingerprint(entry: &Entry) -> u64 {
    let mut hasher = DefaultHasher::new();
    match &entry.data {
        Some(Data::Payload(bytes)) => {
            0u8.hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
        Some(Data::Marker(_)) | None => {
            1u8.hash(&mut hasher);
        }
    }
    hasher.finish()
}

// A caller waiting for the commit point to reach a particular index.
// Ordered by index so the set can be drained front to back, with a uid
// keeping multiple waiters on the same index distinct.
#[derive(Debug)]
struct CommitListener {
    index: u64,
    sender: Sender<EntryId>,
    uid: u64,
}

impl CommitListener {
    fn sort_key(&self) -> (u64, u64) {
        (self.index, self.uid)
    }
}

impl Eq for CommitListener {}

impl PartialEq<Self> for CommitListener {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl PartialOrd<Self> for CommitListener {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CommitListener {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

fn display_id(entry_id: &EntryId) -> String {
    format!("(term={}, index={})", entry_id.term, entry_id.index)
}
