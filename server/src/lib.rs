//! # EasyCells Server
//! A server that accepts EasyCells clients over length-framed TCP, plus an
//! optional UDP datagram channel, assigns each a client id and feeds their
//! messages to the shared RPC dispatch.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use easycells_shared::{
        Args, ClientId, DeliveryMode, NetId, NetworkConfig, NetworkContext, RpcDescriptor,
        SendTo, SERVER_ID,
    };
}

mod error;
mod server_config;

pub use error::ServerError;
pub use server_config::{ServerConfig, DEFAULT_PORT};
pub use transport::ServerSocket;

use easycells_shared::{NetworkConfig, NetworkContext};

/// Binds a `ServerSocket` and wraps it in a ready-to-tick server context.
pub fn listen(
    server_config: ServerConfig,
    network_config: NetworkConfig,
) -> Result<NetworkContext, ServerError> {
    let socket = ServerSocket::listen(&server_config)?;
    Ok(NetworkContext::new(socket, network_config))
}
