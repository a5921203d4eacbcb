use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use tonic::Request;

use crate::engine::engine_proto::engine_server::Engine;
use crate::engine::engine_proto::{GetInstanceRequest, InstanceState};
use crate::engine::service::EngineService;

// Serves a plain-text debug surface for the engine, multiplexed onto the
// same port as the grpc services.
//
// > curl "http://[::1]:12345/engine/status"
// > curl "http://[::1]:12345/engine/instance?key=2"
pub struct HttpHandler {
    service: Arc<EngineService>,
}

impl HttpHandler {
    pub fn new(service: Arc<EngineService>) -> Self {
        HttpHandler { service }
    }

    // Returns the routes served by this handler. Callers are expected to
    // nest these under a path prefix of their choosing.
    pub fn routes(&self) -> Router {
        Router::new()
            .route("/status", get(status))
            .route("/instance", get(instance))
            .with_state(self.service.clone())
    }
}

async fn status(State(service): State<Arc<EngineService>>) -> (StatusCode, String) {
    let instances = service.instances().await;
    let mut active = 0;
    let mut completed = 0;
    let mut cancelled = 0;
    for instance in instances.values() {
        match instance.state() {
            InstanceState::Active => active += 1,
            InstanceState::Completed => completed += 1,
            InstanceState::Cancelled => cancelled += 1,
        }
    }

    let body = format!(
        "server={} instances={} active={} completed={} cancelled={}\n",
        service.name(),
        instances.len(),
        active,
        completed,
        cancelled,
    );
    (StatusCode::OK, body)
}

async fn instance(State(service): State<Arc<EngineService>>, uri: Uri) -> (StatusCode, String) {
    let key = match parse_key(uri.query().unwrap_or("")) {
        Some(key) => key,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "Missing or invalid key parameter\n".to_string(),
            );
        }
    };

    let result = service
        .get_instance(Request::new(GetInstanceRequest { key }))
        .await;
    match result {
        Ok(response) => match response.into_inner().instance {
            Some(instance) => (
                StatusCode::OK,
                format!(
                    "key={} process={} state={}\n",
                    instance.key,
                    instance.process_id,
                    instance.state().as_str_name(),
                ),
            ),
            None => (
                StatusCode::NOT_FOUND,
                format!("No instance with key {}\n", key),
            ),
        },
        Err(status) => {
            let code = match status.code() {
                tonic::Code::InvalidArgument => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, format!("{}\n", status.message()))
        }
    }
}

fn parse_key(query: &str) -> Option<u64> {
    for (name, value) in querystring::querify(query) {
        if name == "key" {
            return value.parse::<u64>().ok();
        }
    }
    None
}
