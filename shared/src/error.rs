use thiserror::Error;

use crate::{rpc::error::DispatchError, transport::error::TransportError};

/// Errors surfaced to collaborators through `NetworkEvents`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// An inbound packet was dropped
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A send failed at the transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
