use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use tracing::debug;

use crate::engine::engine_proto::record::Op;
use crate::engine::engine_proto::{Instance, InstanceState, Record};
use crate::raft::{StateMachine, StateMachineResult};

// The kind of operation held in a record, used as the dispatch key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum RecordKind {
    Create,
    Complete,
    Cancel,
}

impl RecordKind {
    fn of(op: &Op) -> Self {
        match op {
            Op::Create(_) => RecordKind::Create,
            Op::Complete(_) => RecordKind::Complete,
            Op::Cancel(_) => RecordKind::Cancel,
        }
    }
}

// Applies a single kind of record to the instance map. The index is the log
// position of the record being applied, which for creation doubles as the
// key of the new instance.
trait RecordHandler: Send {
    fn apply(
        &self,
        index: u64,
        op: &Op,
        instances: &mut im::HashMap<u64, Instance>,
    ) -> Result<(), String>;
}

struct CreateHandler;

impl RecordHandler for CreateHandler {
    fn apply(
        &self,
        index: u64,
        op: &Op,
        instances: &mut im::HashMap<u64, Instance>,
    ) -> Result<(), String> {
        let create = match op {
            Op::Create(create) => create,
            _ => return Err("Create handler invoked for a different operation".to_string()),
        };

        // Replaying the record that created an instance is a no-op.
        if let Some(existing) = instances.get(&index) {
            return if existing.process_id == create.process_id {
                Ok(())
            } else {
                Err(format!("Conflicting instance for key {}", index))
            };
        }

        instances.insert(
            index,
            Instance {
                key: index,
                process_id: create.process_id.clone(),
                state: InstanceState::Active.into(),
            },
        );
        debug!("Created instance {} for process [{}]", index, create.process_id);
        Ok(())
    }
}

struct CompleteHandler;

impl RecordHandler for CompleteHandler {
    fn apply(
        &self,
        _index: u64,
        op: &Op,
        instances: &mut im::HashMap<u64, Instance>,
    ) -> Result<(), String> {
        let key = match op {
            Op::Complete(complete) => complete.instance_key,
            _ => return Err("Complete handler invoked for a different operation".to_string()),
        };
        transition(instances, key, InstanceState::Completed)
    }
}

struct CancelHandler;

impl RecordHandler for CancelHandler {
    fn apply(
        &self,
        _index: u64,
        op: &Op,
        instances: &mut im::HashMap<u64, Instance>,
    ) -> Result<(), String> {
        let key = match op {
            Op::Cancel(cancel) => cancel.instance_key,
            _ => return Err("Cancel handler invoked for a different operation".to_string()),
        };
        transition(instances, key, InstanceState::Cancelled)
    }
}

// Moves the instance with the supplied key into the target terminal state.
// Only active instances can transition. Re-applying the terminal state the
// instance is already in is a no-op, a conflicting terminal state is an
// error.
fn transition(
    instances: &mut im::HashMap<u64, Instance>,
    key: u64,
    target: InstanceState,
) -> Result<(), String> {
    let instance = match instances.get_mut(&key) {
        Some(instance) => instance,
        None => return Err(format!("No instance with key {}", key)),
    };

    let current = instance.state();
    if current == target {
        return Ok(());
    }
    if current != InstanceState::Active {
        return Err(format!(
            "Instance {} is {}, cannot become {}",
            key,
            current.as_str_name(),
            target.as_str_name(),
        ));
    }

    instance.set_state(target);
    debug!("Instance {} is now {}", key, target.as_str_name());
    Ok(())
}

// Derives the workflow instances of a single member from the records applied
// off the shared log. Every member applies the same records in the same
// order, so all members hold identical instance state at the same applied
// index.
pub struct RecordProcessor {
    // The dispatch table, resolved once at construction.
    handlers: HashMap<RecordKind, Box<dyn RecordHandler>>,

    // All instances this member knows of, keyed by the log index of the
    // record which created them.
    instances: im::HashMap<u64, Instance>,
}

impl RecordProcessor {
    pub fn new() -> Self {
        let mut handlers: HashMap<RecordKind, Box<dyn RecordHandler>> = HashMap::new();
        handlers.insert(RecordKind::Create, Box::new(CreateHandler));
        handlers.insert(RecordKind::Complete, Box::new(CompleteHandler));
        handlers.insert(RecordKind::Cancel, Box::new(CancelHandler));
        RecordProcessor {
            handlers,
            instances: im::HashMap::new(),
        }
    }

    // Returns the instance with the supplied key, if present.
    pub fn instance(&self, key: u64) -> Option<Instance> {
        self.instances.get(&key).cloned()
    }

    // Returns a snapshot of all instances. The underlying map is a
    // persistent data structure, so this is cheap and the caller can walk
    // the snapshot without holding up the processor.
    pub fn instances(&self) -> im::HashMap<u64, Instance> {
        self.instances.clone()
    }

    fn apply_record(&mut self, index: u64, record: &Record) -> Result<(), String> {
        let op = match &record.op {
            Some(op) => op,
            None => return Err("Record with no operation".to_string()),
        };
        let handler = match self.handlers.get(&RecordKind::of(op)) {
            Some(handler) => handler,
            None => return Err(format!("No handler for operation {:?}", RecordKind::of(op))),
        };
        handler.apply(index, op, &mut self.instances)
    }
}

#[async_trait]
impl StateMachine for RecordProcessor {
    async fn apply(&mut self, index: u64, payload: &Bytes) -> StateMachineResult {
        let record = Record::decode(payload.clone())
            .map_err(|failure| format!("Failed to decode record: {}", failure))?;
        self.apply_record(index, &record)
    }
}
