use thiserror::Error;

use crate::{
    messages::error::ArgsError,
    types::{ClientId, NetId},
};

/// Errors returned to code that invokes an RPC or a network variable locally
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Method name is not in the object's table
    #[error("RPC '{method}' is not registered on object {identifier}")]
    UnknownMethod {
        identifier: NetId,
        method: String,
    },

    /// Arguments could not be converted
    #[error("RPC arguments error: {0}")]
    Args(#[from] ArgsError),

    /// Object is already mutably borrowed by a running call
    #[error("Object {identifier} is busy executing another call. Use the call handle passed to the running handler instead")]
    Busy {
        identifier: NetId,
    },

    /// Operation is only meaningful on the server
    #[error("{operation} can only be performed by the server")]
    ServerOnly {
        operation: &'static str,
    },

    /// The RPC body reported a failure
    #[error("RPC handler failed: {reason}")]
    Handler {
        reason: String,
    },
}

impl RpcError {
    pub fn handler(reason: impl Into<String>) -> Self {
        RpcError::Handler {
            reason: reason.into(),
        }
    }
}

/// Errors raised while dispatching an inbound packet. All of them are
/// logged and dropped; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Payload failed to decode or arguments did not match the handler
    #[error("Malformed packet from peer {sender}: {reason}")]
    MalformedPacket {
        sender: ClientId,
        reason: String,
    },

    /// No live object is registered under the identifier
    #[error("Packet from peer {sender} targets unknown object {target}")]
    UnknownTarget {
        sender: ClientId,
        target: NetId,
    },

    /// Target exists but has no such RPC
    #[error("Packet from peer {sender} calls unknown RPC '{method}' on object {target}")]
    UnknownMethod {
        sender: ClientId,
        target: NetId,
        method: String,
    },

    /// Sender is not the owner of a require_owner object
    #[error("Denied: peer {sender} is not the owner of object {target} (owner: {owner})")]
    OwnershipViolation {
        sender: ClientId,
        target: NetId,
        owner: ClientId,
    },

    /// Target is mutably borrowed elsewhere
    #[error("Object {target} is busy and cannot receive packets right now")]
    TargetBusy {
        target: NetId,
    },

    /// RPC body returned an error; nothing is relayed
    #[error("RPC '{method}' on object {target} failed: {reason}")]
    Handler {
        target: NetId,
        method: String,
        reason: String,
    },
}

impl DispatchError {
    pub(crate) fn from_rpc(sender: ClientId, target: NetId, method: &str, error: RpcError) -> Self {
        match error {
            RpcError::Args(error) => DispatchError::MalformedPacket {
                sender,
                reason: error.to_string(),
            },
            RpcError::UnknownMethod { method, .. } => DispatchError::UnknownMethod {
                sender,
                target,
                method,
            },
            RpcError::Busy { identifier } => DispatchError::TargetBusy { target: identifier },
            other => DispatchError::Handler {
                target,
                method: method.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
