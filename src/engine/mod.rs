// The workflow engine grpc service that runs on every cluster member.
// Create/complete/cancel operations are committed as records to the shared
// log, and every member derives identical instance state by applying the
// records in log order. Callers embed the service in their grpc server or
// talk to it through the generated client.

pub use crate::engine::processor::RecordProcessor;
pub use http::HttpHandler;
pub use service::EngineService;

pub mod grpc {
    pub use crate::engine::engine_proto::engine_client::EngineClient;
    pub use crate::engine::engine_proto::engine_server::EngineServer;
    pub use crate::engine::engine_proto::{
        CancelInstanceRequest, CancelInstanceResponse, CompleteInstanceRequest,
        CompleteInstanceResponse, CreateInstanceRequest, CreateInstanceResponse,
        GetInstanceRequest, GetInstanceResponse, Instance, InstanceState,
    };
}

#[path = "generated/engine_proto.rs"]
pub(in crate::engine) mod engine_proto;
pub(in crate::engine) mod http;
pub(in crate::engine) mod processor;
pub(in crate::engine) mod service;
