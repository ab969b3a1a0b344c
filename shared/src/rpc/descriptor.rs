use crate::transport::DeliveryMode;

/// Who an RPC is meant to reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendTo {
    /// Every peer, the server included.
    All,
    Server,
    /// Every client.
    Clients,
    /// Only the peer owning the object.
    Owner,
    /// Every peer except the caller.
    NotMe,
}

/// Immutable routing metadata attached to one named RPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcDescriptor {
    pub send_to: SendTo,
    pub require_owner: bool,
    pub delivery: DeliveryMode,
}

impl RpcDescriptor {
    /// Owner-only, reliable.
    pub const fn new(send_to: SendTo) -> Self {
        Self {
            send_to,
            require_owner: true,
            delivery: DeliveryMode::Reliable,
        }
    }

    pub const fn require_owner(mut self, require_owner: bool) -> Self {
        self.require_owner = require_owner;
        self
    }

    pub const fn delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub const fn unreliable(self) -> Self {
        self.delivery(DeliveryMode::Unreliable)
    }
}
