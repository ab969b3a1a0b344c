pub mod error;
pub mod local;

use crate::types::{ClientId, HostType};

use self::error::TransportError;

/// Channel a message travels on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Length-framed stream: exactly once, in order.
    #[default]
    Reliable,
    /// One message per datagram: may be lost, duplicated or reordered.
    Unreliable,
}

/// Connection changes reported by a transport's background loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Client side: the server assigned us this id.
    Connected(ClientId),
    /// Server side: a new client was accepted and given this id.
    PeerConnected(ClientId),
    /// Server side: a client's connection ended.
    PeerDisconnected(ClientId),
    /// Client side: the connection to the server ended.
    Closed,
}

/// Byte-level connection owned by a `NetworkManager`.
///
/// Payloads handed to `send` are unframed; reliable implementations add the
/// length prefix themselves. `try_read` never blocks and yields at most one
/// complete message. On a client the only peer is `SERVER_ID`.
pub trait Transport {
    fn host_type(&self) -> HostType;

    fn poll_event(&mut self) -> Option<TransportEvent>;

    fn peers(&self) -> Vec<ClientId>;

    fn send(
        &mut self,
        peer: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError>;

    fn broadcast(&mut self, payload: &[u8], delivery: DeliveryMode) -> Result<(), TransportError> {
        let mut first_error = None;
        for peer in self.peers() {
            if let Err(error) = self.send(peer, payload, delivery) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Peers that may still have messages to read: every connected peer,
    /// plus disconnected ones whose last messages have not all been read.
    fn readable_peers(&self) -> Vec<ClientId> {
        self.peers()
    }

    fn try_read(&mut self, peer: ClientId) -> Option<Vec<u8>>;

    fn supports(&self, delivery: DeliveryMode) -> bool;

    fn disconnect(&mut self, peer: ClientId);

    fn close(&mut self);
}
