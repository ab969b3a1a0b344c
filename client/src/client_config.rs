use std::{
    default::Default,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Contains Config properties which will be used by the Client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the server's reliable (TCP) listener
    pub server_addr: SocketAddr,
    /// Address of the server's datagram socket. `None` disables the
    /// unreliable channel.
    pub datagram_server_addr: Option<SocketAddr>,
    /// How long to wait for the TCP connection before giving up
    pub connect_timeout: Duration,
    /// Delay between two datagram handshake attempts
    pub handshake_interval: Duration,
    /// Handshake attempts before the client stays on the reliable channel
    pub handshake_attempts: u32,
    /// Largest reliable frame accepted from the server. `None` means
    /// unlimited.
    pub max_message_size: Option<usize>,
}

impl ClientConfig {
    /// Resolves `host` and uses `port` for both channels.
    pub fn new(host: &str, port: u16) -> Result<Self, ClientError> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|error| ClientError::Resolve {
                host: host.to_string(),
                reason: error.to_string(),
            })?
            .next()
            .ok_or_else(|| ClientError::Resolve {
                host: host.to_string(),
                reason: "no addresses found".to_string(),
            })?;

        Ok(Self {
            server_addr: addr,
            datagram_server_addr: Some(addr),
            ..Self::default()
        })
    }

    pub fn with_datagrams(mut self, datagram_server_addr: Option<SocketAddr>) -> Self {
        self.datagram_server_addr = datagram_server_addr;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            datagram_server_addr: None,
            connect_timeout: Duration::from_secs(5),
            handshake_interval: Duration::from_millis(250),
            handshake_attempts: 20,
            max_message_size: None,
        }
    }
}
