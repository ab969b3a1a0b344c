use std::{
    default::Default,
    net::{SocketAddr, ToSocketAddrs},
};

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

pub const DEFAULT_PORT: u16 = 5000;

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the reliable (TCP) listener binds to
    pub listen_addr: SocketAddr,
    /// Address the datagram (UDP) socket binds to. `None` disables the
    /// unreliable channel; unreliable sends then use the reliable one.
    pub datagram_addr: Option<SocketAddr>,
    /// Largest reliable frame accepted from a client. A client announcing a
    /// larger frame is disconnected. `None` means unlimited.
    pub max_message_size: Option<usize>,
}

impl ServerConfig {
    /// Resolves `host` (e.g. `"localhost"`, `"0.0.0.0"`, `"::1"`) and uses
    /// `port` for both the reliable and the datagram channel.
    pub fn new(host: &str, port: u16) -> Result<Self, ServerError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|error| ServerError::Resolve {
                host: host.to_string(),
                reason: error.to_string(),
            })?
            .next()
            .ok_or_else(|| ServerError::Resolve {
                host: host.to_string(),
                reason: "no addresses found".to_string(),
            })?;

        Ok(Self {
            listen_addr: addr,
            datagram_addr: Some(addr),
            max_message_size: None,
        })
    }

    pub fn with_datagrams(mut self, datagram_addr: Option<SocketAddr>) -> Self {
        self.datagram_addr = datagram_addr;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            datagram_addr: None,
            max_message_size: None,
        }
    }
}
