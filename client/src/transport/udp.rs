use std::{net::UdpSocket as StdUdpSocket, time::Duration};

use log::{debug, error, info, trace, warn};
use tokio::{net::UdpSocket, sync::watch};

use easycells_shared::{ClientId, DatagramTicket, WireMessage, MAX_DATAGRAM_SIZE};

use super::{lock, SharedState};

/// Background half of the datagram channel. The game thread keeps a clone
/// of the same socket for sending.
pub(crate) struct DatagramLink {
    pub(crate) socket: StdUdpSocket,
    pub(crate) interval: Duration,
    pub(crate) attempts: u32,
}

/// Sends `["HANDSHAKE", id, key]` every `interval` until the server echoes
/// the id back, then keeps receiving datagrams until shutdown.
pub(crate) async fn run(
    link: DatagramLink,
    ticket: DatagramTicket,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) {
    let socket = match UdpSocket::from_std(link.socket) {
        Ok(socket) => socket,
        Err(error) => {
            error!("Failed to register datagram socket with the runtime: {}", error);
            return;
        }
    };
    let handshake = match WireMessage::Handshake(Some(ticket)).encode() {
        Ok(handshake) => handshake,
        Err(error) => {
            warn!("Could not encode datagram handshake: {}", error);
            return;
        }
    };

    let mut ticker = tokio::time::interval(link.interval);
    let mut attempts = 0;
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let handshaking = !lock(&state).datagram_ready && attempts < link.attempts;
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick(), if handshaking => {
                attempts += 1;
                trace!("Datagram handshake attempt {}", attempts);
                if let Err(error) = socket.send(&handshake).await {
                    debug!("Datagram handshake failed: {}", error);
                }
                if attempts == link.attempts {
                    warn!(
                        "No datagram handshake reply after {} attempts, staying on the reliable channel",
                        attempts
                    );
                }
            }
            received = socket.recv(&mut buffer) => {
                let length = match received {
                    Ok(length) => length,
                    Err(error) => {
                        debug!("Datagram receive failed: {}", error);
                        continue;
                    }
                };
                handle_datagram(&state, ticket.client_id, &buffer[..length]);
            }
        }
    }
}

fn handle_datagram(state: &SharedState, client_id: ClientId, payload: &[u8]) {
    let mut state = lock(state);
    if let Ok(WireMessage::AssignId(assigned)) = WireMessage::decode(payload) {
        if assigned == client_id && !state.datagram_ready {
            state.datagram_ready = true;
            info!("Datagram channel ready");
        }
        return;
    }
    state.inbox.push_back(payload.to_vec());
}
