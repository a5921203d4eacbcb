use async_std::sync::{Arc, Mutex};
use prost::Message;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::engine::engine_proto::engine_server::Engine;
use crate::engine::engine_proto::record::Op;
use crate::engine::engine_proto::{
    CancelInstanceRequest, CancelInstanceResponse, CancelOperation, CompleteInstanceRequest,
    CompleteInstanceResponse, CompleteOperation, CreateInstanceRequest, CreateInstanceResponse,
    CreateOperation, GetInstanceRequest, GetInstanceResponse, Instance, Record,
};
use crate::engine::processor::RecordProcessor;
use crate::raft::raft_common_proto::Server;
use crate::raft::{Client, StateMachine, new_client};

pub struct EngineService {
    name: String,
    processor: Arc<Mutex<RecordProcessor>>,
    raft: Box<dyn Client + Sync + Send>,
}

impl EngineService {
    // A new engine service backed by the supplied processor. Every member
    // hosting this service hosts the raft service on the same address, so
    // the raft client is pointed at our own address.
    pub fn new(name: &str, address: &Server, processor: Arc<Mutex<RecordProcessor>>) -> Self {
        EngineService {
            name: name.to_string(),
            processor,
            raft: new_client(name, address),
        }
    }

    // Returns the processor as the state machine the local raft participant
    // should apply committed entries to.
    pub fn raft_state_machine(&self) -> Arc<Mutex<dyn StateMachine + Send>> {
        self.processor.clone()
    }

    pub(crate) fn name(&self) -> &str {
        self.name.as_str()
    }

    // Returns a snapshot of the instances this member has applied so far.
    pub(crate) async fn instances(&self) -> im::HashMap<u64, Instance> {
        self.processor.lock().await.instances()
    }

    // Sends the supplied record through the shared log. Returns the log index
    // the record was committed at.
    async fn submit_record(&self, record: Record) -> Result<u64, Status> {
        let serialized = record.encode_to_vec();
        match self.raft.submit(&serialized).await {
            Ok(id) => Ok(id.index),
            Err(failure) => {
                warn!("[{}] Failed to submit record: {}", self.name, failure);
                Err(failure.into())
            }
        }
    }
}

#[tonic::async_trait]
impl Engine for EngineService {
    async fn create_instance(
        &self,
        request: Request<CreateInstanceRequest>,
    ) -> Result<Response<CreateInstanceResponse>, Status> {
        debug!("[{}] Handling CreateInstance request", self.name);
        let request = request.into_inner();
        if request.process_id.is_empty() {
            return Err(Status::invalid_argument("Empty process_id"));
        }

        let record = Record {
            op: Some(Op::Create(CreateOperation {
                process_id: request.process_id.clone(),
            })),
        };

        // The record's log index becomes the key of the new instance.
        let key = self.submit_record(record).await?;
        info!(
            "[{}] Created instance {} for process [{}]",
            self.name, key, request.process_id
        );
        Ok(Response::new(CreateInstanceResponse { key }))
    }

    async fn complete_instance(
        &self,
        request: Request<CompleteInstanceRequest>,
    ) -> Result<Response<CompleteInstanceResponse>, Status> {
        debug!("[{}] Handling CompleteInstance request", self.name);
        let request = request.into_inner();
        if request.key == 0 {
            return Err(Status::invalid_argument("Invalid instance key"));
        }

        let record = Record {
            op: Some(Op::Complete(CompleteOperation {
                instance_key: request.key,
            })),
        };

        let index = self.submit_record(record).await?;
        info!(
            "[{}] Committed completion of instance {} at index {}",
            self.name, request.key, index
        );
        Ok(Response::new(CompleteInstanceResponse {}))
    }

    async fn cancel_instance(
        &self,
        request: Request<CancelInstanceRequest>,
    ) -> Result<Response<CancelInstanceResponse>, Status> {
        debug!("[{}] Handling CancelInstance request", self.name);
        let request = request.into_inner();
        if request.key == 0 {
            return Err(Status::invalid_argument("Invalid instance key"));
        }

        let record = Record {
            op: Some(Op::Cancel(CancelOperation {
                instance_key: request.key,
            })),
        };

        let index = self.submit_record(record).await?;
        info!(
            "[{}] Committed cancellation of instance {} at index {}",
            self.name, request.key, index
        );
        Ok(Response::new(CancelInstanceResponse {}))
    }

    async fn get_instance(
        &self,
        request: Request<GetInstanceRequest>,
    ) -> Result<Response<GetInstanceResponse>, Status> {
        debug!("[{}] Handling GetInstance request", self.name);
        let request = request.into_inner();
        if request.key == 0 {
            return Err(Status::invalid_argument("Invalid instance key"));
        }

        let instance = self.processor.lock().await.instance(request.key);
        Ok(Response::new(GetInstanceResponse { instance }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use bytes::Bytes;
    use tonic::transport::Channel;

    use crate::engine::engine_proto::InstanceState;
    use crate::engine::engine_proto::engine_client::EngineClient;
    use crate::engine::engine_proto::engine_server::EngineServer;
    use crate::raft::RaftResult;
    use crate::raft::raft_common_proto::EntryId;
    use crate::testing::TestRpcServer;

    // A fake client which applies submitted payloads straight to the supplied
    // processor (rather than going through remote consensus), handing out
    // consecutive log indexes.
    struct FakeRaftClient {
        processor: Arc<Mutex<RecordProcessor>>,
        next_index: AtomicU64,
    }

    #[tonic::async_trait]
    impl Client for FakeRaftClient {
        async fn submit(&self, payload: &[u8]) -> RaftResult<EntryId> {
            let index = self.next_index.fetch_add(1, Ordering::SeqCst);
            let copy = Bytes::from(payload.to_vec());
            self.processor
                .lock()
                .await
                .apply(index, &copy)
                .await
                .expect("bad payload");
            Ok(EntryId { term: 1, index })
        }

        async fn preempt_leader(&self) -> RaftResult<Server> {
            unimplemented!();
        }
    }

    #[tokio::test]
    async fn test_create_instance() {
        let service = create_service();
        let response = service
            .create_instance(Request::new(CreateInstanceRequest {
                process_id: "order".to_string(),
            }))
            .await
            .expect("response")
            .into_inner();
        assert_eq!(1, response.key);

        let instance = service.processor.lock().await.instance(1).expect("instance");
        assert_eq!("order", instance.process_id);
        assert_eq!(InstanceState::Active, instance.state());
    }

    #[tokio::test]
    async fn test_create_instance_rejects_empty_process() {
        let service = create_service();
        let status = service
            .create_instance(Request::new(CreateInstanceRequest {
                process_id: "".to_string(),
            }))
            .await
            .expect_err("status");
        assert_eq!(tonic::Code::InvalidArgument, status.code());
    }

    #[tokio::test]
    async fn test_complete_instance() {
        let service = create_service();
        let created = service
            .create_instance(Request::new(CreateInstanceRequest {
                process_id: "order".to_string(),
            }))
            .await
            .expect("create")
            .into_inner();

        service
            .complete_instance(Request::new(CompleteInstanceRequest { key: created.key }))
            .await
            .expect("complete");

        let instance = service
            .processor
            .lock()
            .await
            .instance(created.key)
            .expect("instance");
        assert_eq!(InstanceState::Completed, instance.state());
    }

    #[tokio::test]
    async fn test_cancel_instance() {
        let service = create_service();
        let created = service
            .create_instance(Request::new(CreateInstanceRequest {
                process_id: "order".to_string(),
            }))
            .await
            .expect("create")
            .into_inner();

        service
            .cancel_instance(Request::new(CancelInstanceRequest { key: created.key }))
            .await
            .expect("cancel");

        let instance = service
            .processor
            .lock()
            .await
            .instance(created.key)
            .expect("instance");
        assert_eq!(InstanceState::Cancelled, instance.state());
    }

    #[tokio::test]
    async fn test_get_missing_instance() {
        let service = create_service();
        let response = service
            .get_instance(Request::new(GetInstanceRequest { key: 42 }))
            .await
            .expect("response")
            .into_inner();
        assert!(response.instance.is_none());
    }

    #[tokio::test]
    async fn test_grpc_roundtrip() {
        let server = TestRpcServer::run(EngineServer::new(create_service())).await;
        let mut client = create_grpc_client(server.port()).await;

        let created = client
            .create_instance(Request::new(CreateInstanceRequest {
                process_id: "order".to_string(),
            }))
            .await
            .expect("create")
            .into_inner();

        let response = client
            .get_instance(Request::new(GetInstanceRequest { key: created.key }))
            .await
            .expect("get")
            .into_inner();
        let instance = response.instance.expect("instance");
        assert_eq!("order", instance.process_id);
        assert_eq!(InstanceState::Active, instance.state());
    }

    // An engine service whose submissions feed the fake client above.
    fn create_service() -> EngineService {
        let processor = Arc::new(Mutex::new(RecordProcessor::new()));
        EngineService {
            name: "test-engine".to_string(),
            processor: processor.clone(),
            raft: Box::new(FakeRaftClient {
                processor,
                next_index: AtomicU64::new(1),
            }),
        }
    }

    async fn create_grpc_client(port: u16) -> EngineClient<Channel> {
        EngineClient::connect(format!("http://[::1]:{}", port))
            .await
            .expect("connect")
    }
}
