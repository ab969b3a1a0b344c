pub mod component;
pub mod descriptor;
pub mod error;
pub mod execution_guard;
pub mod routing;
pub mod rpc_table;
pub mod static_rpcs;
pub mod target;

pub use descriptor::{RpcDescriptor, SendTo};
