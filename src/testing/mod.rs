mod http_server;
mod rpc_server;

pub use http_server::TestHttpServer;
pub use rpc_server::TestRpcServer;
