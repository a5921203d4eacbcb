use crate::raft::error::{RaftError, RaftResult};
use crate::raft::raft_common_proto::entry::Data;
use crate::raft::raft_common_proto::{Entry, EntryId};

// The replicated log of a single server. Entries are 1-based, contiguous
// and gap-free. Index 0 is a sentinel designating the empty log, so the id
// (term=0, index=0) always "matches" as the predecessor of the first entry.
pub struct Log {
    entries: Vec<Entry>,
}

impl Log {
    // Returns a new, empty instance.
    pub fn new_empty() -> Self {
        Log {
            entries: Vec::new(),
        }
    }

    // Returns a new instance holding the supplied entries, verifying that
    // they form a contiguous sequence starting at index 1. This is the
    // restore path for logs read back from durable storage.
    pub fn new(entries: Vec<Entry>) -> RaftResult<Self> {
        let mut next_index = 1;
        for entry in &entries {
            let id = entry
                .id
                .as_ref()
                .ok_or_else(|| RaftError::Internal("Log entry found with no id".to_string()))?;
            if id.index != next_index {
                return Err(RaftError::NonContiguousLog {
                    expected: next_index,
                    actual: id.index,
                });
            }
            next_index += 1;
        }
        Ok(Log { entries })
    }

    // Appends an entry holding the supplied data, assigning it the next
    // free index. Returns the id the entry ended up with.
    pub fn append(&mut self, term: u64, data: Data) -> EntryId {
        assert!(term >= self.last_id().term);

        let entry = new_entry(term, self.next_index(), data);
        let entry_id = entry.id.expect("id");
        self.entries.push(entry);
        entry_id
    }

    // Incorporates the supplied entries, which must attach to the log
    // without leaving a gap. Entries already present with a matching term
    // are left untouched, so replaying a batch (even an old one) never
    // modifies the log. The first entry present with a conflicting term
    // causes the log to be truncated from that index before the remainder
    // of the batch is appended.
    //
    // Returns the index of the first replaced entry if a conflict caused a
    // truncation, and None for a clean (or fully redundant) append.
    pub fn append_all(&mut self, entries: &[Entry]) -> RaftResult<Option<u64>> {
        let mut truncated = None;
        for entry in entries {
            let id = entry
                .id
                .as_ref()
                .ok_or_else(|| RaftError::missing("id"))?;
            if id.index == 0 {
                return Err(RaftError::InvalidArgument(
                    "Cannot append an entry at the sentinel index".to_string(),
                ));
            }
            if id.index > self.next_index() {
                return Err(RaftError::NonContiguousLog {
                    expected: self.next_index(),
                    actual: id.index,
                });
            }
            if id.index == self.next_index() {
                self.entries.push(entry.clone());
                continue;
            }

            // The index is already present. Replace the tail only if the
            // terms disagree.
            if self.conflict(id) {
                self.truncate_from(id.index);
                truncated.get_or_insert(id.index);
                self.entries.push(entry.clone());
            }
        }
        Ok(truncated)
    }

    // Removes the entry at the supplied index and everything after it.
    pub fn truncate_from(&mut self, index: u64) {
        assert!(index >= 1, "Cannot truncate the sentinel");
        let local = (index - 1) as usize;
        if local < self.entries.len() {
            self.entries.drain(local..);
        }
    }

    // Returns the id of the last entry, or the sentinel id if the log is
    // empty.
    pub fn last_id(&self) -> EntryId {
        match self.entries.last() {
            Some(entry) => entry.id.expect("id"),
            None => sentinel_id(),
        }
    }

    // The last entry's index, 0 while the log is empty.
    pub fn last_index(&self) -> u64 {
        self.last_id().index
    }

    // Returns the index the next appended entry will occupy.
    pub fn next_index(&self) -> u64 {
        self.last_index() + 1
    }

    // Whether a log ending in the supplied entry id is at least as current
    // as this one, the comparison used to decide whether a candidate may
    // receive a vote. A higher last term wins; equal last terms fall back
    // to the last index.
    pub fn is_up_to_date(&self, other_last: &EntryId) -> bool {
        let this_last = self.last_id();
        if this_last.term != other_last.term {
            return other_last.term > this_last.term;
        }
        other_last.index >= this_last.index
    }

    // Whether an entry with exactly the supplied id, term and index both
    // matching, is in the log. The sentinel id is always present.
    pub fn contains(&self, query: &EntryId) -> bool {
        if query.index == 0 {
            return query.term == 0;
        }
        match self.term_at(query.index) {
            Some(term) => term == query.term,
            None => false,
        }
    }

    // Whether the log holds a different entry where the supplied id claims
    // to be, meaning an entry at that index whose term disagrees.
    pub fn conflict(&self, id: &EntryId) -> bool {
        if id.index == 0 || id.index >= self.next_index() {
            return false;
        }
        self.id_at(id.index).term != id.term
    }

    // The term of the entry at the supplied index, None past the end of
    // the log. Index 0 resolves to the sentinel.
    pub fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        self.entries
            .get((index - 1) as usize)
            .map(|entry| entry.id.expect("id").term)
    }

    // The id of the entry at the supplied index, which must exist in the
    // log (or be the sentinel).
    pub fn id_at(&self, index: u64) -> EntryId {
        if index == 0 {
            return sentinel_id();
        }
        self.entries
            .get((index - 1) as usize)
            .unwrap_or_else(|| panic!("No entry at index {}", index))
            .id
            .expect("id")
    }

    // A copy of the entry at the supplied index, which must exist in the
    // log.
    pub fn entry_at(&self, index: u64) -> Entry {
        assert!(index >= 1, "The sentinel has no entry");
        self.entries
            .get((index - 1) as usize)
            .unwrap_or_else(|| panic!("No entry at index {}", index))
            .clone()
    }

    // Returns copies of all entries strictly after the supplied index.
    pub fn get_entries_after(&self, index: u64) -> Vec<Entry> {
        let local = index as usize;
        if local >= self.entries.len() {
            return Vec::new();
        }
        self.entries[local..].to_vec()
    }

    // Returns the full log contents.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

fn new_entry(term: u64, index: u64, data: Data) -> Entry {
    Entry {
        id: Some(EntryId { term, index }),
        data: Some(data),
    }
}

fn sentinel_id() -> EntryId {
    EntryId { term: 0, index: 0 }
}
