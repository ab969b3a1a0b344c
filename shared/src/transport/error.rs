use thiserror::Error;

use crate::{messages::error::WireError, types::ClientId};

/// Errors that can occur while moving bytes through a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No connection exists for this peer id
    #[error("Unknown peer {peer}. The peer never connected or was already dropped")]
    UnknownPeer {
        peer: ClientId,
    },

    /// The peer's connection has been torn down
    #[error("Connection to peer {peer} is closed")]
    PeerClosed {
        peer: ClientId,
    },

    /// A client tried to send before its connection exists
    #[error("Not connected to the server yet")]
    NotConnected,

    /// The transport itself has been closed
    #[error("Transport is closed")]
    Closed,

    /// Payload could not be framed
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Socket level failure
    #[error("Socket error: {reason}")]
    Io {
        reason: String,
    },
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            reason: error.to_string(),
        }
    }
}
