use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur while starting a server socket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// Host name could not be resolved to a socket address
    #[error("Could not resolve '{host}': {reason}")]
    Resolve {
        host: String,
        reason: String,
    },

    /// Listener or datagram socket could not be bound
    #[error("Could not bind {addr}: {reason}")]
    Bind {
        addr: SocketAddr,
        reason: String,
    },

    /// Background runtime or thread could not be started
    #[error("Could not start the server runtime: {reason}")]
    Runtime {
        reason: String,
    },
}
