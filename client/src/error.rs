use thiserror::Error;

/// Errors that can occur while starting a client socket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Server host name could not be resolved to a socket address
    #[error("Could not resolve '{host}': {reason}")]
    Resolve {
        host: String,
        reason: String,
    },

    /// Local datagram socket could not be created
    #[error("Could not open the datagram socket: {reason}")]
    Bind {
        reason: String,
    },

    /// Background runtime or thread could not be started
    #[error("Could not start the client runtime: {reason}")]
    Runtime {
        reason: String,
    },
}
