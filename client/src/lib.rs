//! # EasyCells Client
//! A client that connects to an EasyCells server over length-framed TCP,
//! plus an optional UDP datagram channel, and takes part in replicated RPCs
//! and network variables.

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

mod client_config;
mod error;

pub use client_config::ClientConfig;
pub use error::ClientError;
pub use transport::ClientSocket;

use easycells_shared::{NetworkConfig, NetworkContext};

/// Starts connecting and wraps the socket in a client context. The context
/// stays `Connecting` until a tick sees the id the server assigned.
pub fn connect(
    client_config: ClientConfig,
    network_config: NetworkConfig,
) -> Result<NetworkContext, ClientError> {
    let socket = ClientSocket::connect(&client_config)?;
    Ok(NetworkContext::new(socket, network_config))
}
