use crate::raft::{StateMachine, StateMachineResult};
use async_trait::async_trait;
use bytes::Bytes;

// In-memory state machine for tests. Remembers every applied payload
// together with the log index it arrived at.
pub struct FakeStateMachine {
    applied: Vec<(u64, Bytes)>,
}

impl FakeStateMachine {
    pub fn new() -> Self {
        FakeStateMachine {
            applied: Vec::new(),
        }
    }

    pub fn applied(&self) -> &[(u64, Bytes)] {
        self.applied.as_slice()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn last_applied_index(&self) -> Option<u64> {
        self.applied.last().map(|(index, _)| *index)
    }
}

#[async_trait]
impl StateMachine for FakeStateMachine {
    async fn apply(&mut self, index: u64, payload: &Bytes) -> StateMachineResult {
        self.applied.push((index, payload.clone()));
        Ok(())
    }
}
