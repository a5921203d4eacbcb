use async_trait::async_trait;
use bytes::Bytes;

pub type StateMachineResult = Result<(), String>;

// The replicated application every cluster member runs a copy of. The
// consensus layer hands it committed payloads in log order, exactly once
// per process lifetime. Every member sees the same sequence.
#[async_trait]
pub trait StateMachine {
    // Applies the payload committed at the supplied log index, folding it
    // into this member's application state. A failure is reported but does
    // not stop the applier.
    async fn apply(&mut self, index: u64, payload: &Bytes) -> StateMachineResult;
}
