use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket as StdUdpSocket},
};

use log::{debug, error, info, trace, warn};
use tokio::{net::UdpSocket, sync::watch};

use easycells_shared::{DatagramTicket, TransportError, WireMessage, MAX_DATAGRAM_SIZE};

use super::{lock, SharedState};
use crate::error::ServerError;

/// Game-thread side of the datagram channel. Sends go straight out of a
/// non-blocking std socket; a clone of it feeds the receive loop.
pub(crate) struct DatagramSocket {
    socket: StdUdpSocket,
    local_addr: SocketAddr,
}

impl DatagramSocket {
    pub(crate) fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let to_error = |error: std::io::Error| ServerError::Bind {
            addr,
            reason: error.to_string(),
        };
        let socket = StdUdpSocket::bind(addr).map_err(to_error)?;
        socket.set_nonblocking(true).map_err(to_error)?;
        let local_addr = socket.local_addr().map_err(to_error)?;
        Ok(Self { socket, local_addr })
    }

    pub(crate) fn receiver(&self) -> Result<StdUdpSocket, ServerError> {
        self.socket.try_clone().map_err(|error| ServerError::Bind {
            addr: self.local_addr,
            reason: error.to_string(),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A full send buffer drops the datagram, which unreliable delivery
    /// allows.
    pub(crate) fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        match self.socket.send_to(payload, addr) {
            Ok(_) => Ok(()),
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                trace!("Datagram to {} dropped: send buffer full", addr);
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

pub(crate) async fn receive_loop(
    socket: StdUdpSocket,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) {
    let socket = match UdpSocket::from_std(socket) {
        Ok(socket) => socket,
        Err(error) => {
            error!("Failed to register datagram socket with the runtime: {}", error);
            return;
        }
    };
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = socket.recv_from(&mut buffer) => {
                let (length, addr) = match received {
                    Ok(received) => received,
                    Err(error) => {
                        debug!("Datagram receive failed: {}", error);
                        continue;
                    }
                };
                if let Some(reply) = route_datagram(&state, addr, &buffer[..length]) {
                    if let Err(error) = socket.send_to(&reply, addr).await {
                        debug!("Handshake reply to {} failed: {}", addr, error);
                    }
                }
            }
        }
    }
}

/// Queues an ordinary datagram for its peer, or handles a handshake and
/// returns the reply to send.
fn route_datagram(state: &SharedState, addr: SocketAddr, payload: &[u8]) -> Option<Vec<u8>> {
    if let Ok(WireMessage::Handshake(ticket)) = WireMessage::decode(payload) {
        return register(state, addr, ticket);
    }

    let state = lock(state);
    let peer = state
        .datagram_peers
        .get(&addr)
        .and_then(|client_id| state.peers.get(client_id));
    match peer {
        Some(peer) => lock(&peer.inbox).push_back(payload.to_vec()),
        None => trace!("Dropping datagram from unregistered address {}", addr),
    }
    None
}

/// Pairs `addr` with the reliable connection named by `ticket`. The key must
/// match the one sent over that connection and the datagram must come from
/// the connection's IP. Once bound, the address never changes; repeated
/// handshakes from it are answered again.
fn register(
    state: &SharedState,
    addr: SocketAddr,
    ticket: Option<DatagramTicket>,
) -> Option<Vec<u8>> {
    let ticket = match ticket {
        Some(ticket) => ticket,
        None => {
            debug!("Ignoring handshake without a client id from {}", addr);
            return None;
        }
    };
    let client_id = ticket.client_id;

    {
        let mut guard = lock(state);
        let state = &mut *guard;
        let peer = match state.peers.get_mut(&client_id) {
            Some(peer) => peer,
            None => {
                debug!("Ignoring handshake from {} for unknown client {}", addr, client_id);
                return None;
            }
        };
        if peer.datagram_key != ticket.key || peer.remote_ip != addr.ip() {
            warn!(
                "Rejecting handshake from {} claiming client {}",
                addr, client_id
            );
            return None;
        }
        match peer.datagram_addr {
            Some(bound) if bound == addr => {}
            Some(bound) => {
                warn!(
                    "Rejecting handshake from {}: client {} is bound to {}",
                    addr, client_id, bound
                );
                return None;
            }
            None => {
                peer.datagram_addr = Some(addr);
                state.datagram_peers.insert(addr, client_id);
                info!("Client {} registered datagram address {}", client_id, addr);
            }
        }
    }

    match WireMessage::AssignId(client_id).encode() {
        Ok(reply) => Some(reply),
        Err(error) => {
            warn!("Could not encode handshake reply: {}", error);
            None
        }
    }
}
