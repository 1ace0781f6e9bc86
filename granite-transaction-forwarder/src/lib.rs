mod batch_sender;
mod cluster_rpc;
mod cluster_rpc_stub;
mod errors;
mod forwarder;
mod service_info;
mod tpu_info;
mod transaction_info;

pub use batch_sender::*;
pub use cluster_rpc::*;
pub use cluster_rpc_stub::*;
pub use errors::*;
pub use forwarder::*;
pub use service_info::*;
pub use tpu_info::*;
pub use transaction_info::*;
