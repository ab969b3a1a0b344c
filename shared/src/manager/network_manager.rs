use log::{debug, info, trace, warn};

use crate::{
    events::NetworkEvents,
    messages::wire_message::WireMessage,
    transport::{error::TransportError, DeliveryMode, Transport, TransportEvent},
    types::{ClientId, HostType, SERVER_ID},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Closed,
}

/// Owns the transport of one peer and tracks its connection state.
pub struct NetworkManager {
    transport: Box<dyn Transport>,
    host_type: HostType,
    client_id: Option<ClientId>,
    state: ConnectionState,
    // set once this side shut its transport down
    shut_down: bool,
}

impl NetworkManager {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let host_type = transport.host_type();
        Self {
            transport,
            host_type,
            client_id: None,
            state: ConnectionState::Uninitialized,
            shut_down: false,
        }
    }

    /// A server is connected as soon as it listens. A client waits for its
    /// id to arrive.
    pub fn start(&mut self) {
        if self.state != ConnectionState::Uninitialized {
            return;
        }
        match self.host_type {
            HostType::Server => {
                self.client_id = Some(SERVER_ID);
                self.state = ConnectionState::Connected;
                info!("Server started");
            }
            HostType::Client => {
                self.state = ConnectionState::Connecting;
                info!("Client connecting");
            }
        }
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peers(&self) -> Vec<ClientId> {
        self.transport.peers()
    }

    /// Applies pending transport events. Returns the peers that connected
    /// since the last call: on a client, its own freshly assigned id.
    pub fn maintain_connection(&mut self, events: &mut NetworkEvents) -> Vec<ClientId> {
        let mut connected = Vec::new();
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Connected(client_id) => {
                    if self.host_type.is_server() || self.state == ConnectionState::Closed {
                        continue;
                    }
                    info!("Connected to server with id {}", client_id);
                    self.client_id = Some(client_id);
                    self.state = ConnectionState::Connected;
                    events.push_connection(client_id);
                    connected.push(client_id);
                }
                TransportEvent::PeerConnected(client_id) => {
                    info!("Client {} connected", client_id);
                    events.push_connection(client_id);
                    connected.push(client_id);
                }
                TransportEvent::PeerDisconnected(client_id) => {
                    info!("Client {} disconnected", client_id);
                    events.push_disconnection(client_id);
                }
                TransportEvent::Closed => {
                    if self.state != ConnectionState::Closed {
                        info!("Connection to server closed");
                        self.state = ConnectionState::Closed;
                        events.push_disconnection(SERVER_ID);
                    }
                }
            }
        }
        connected
    }

    /// Drains every peer's inbound queue, oldest message first per peer.
    /// Messages that arrived before a connection ended are still returned,
    /// until this side closes its own transport.
    pub fn receive_messages(&mut self) -> Vec<(ClientId, Vec<u8>)> {
        let mut messages = Vec::new();
        if self.shut_down {
            return messages;
        }
        for peer in self.transport.readable_peers() {
            while let Some(payload) = self.transport.try_read(peer) {
                trace!("Received {} bytes from {}", payload.len(), peer);
                messages.push((peer, payload));
            }
        }
        messages
    }

    pub fn send_to_server(
        &mut self,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        self.send(SERVER_ID, payload, delivery)
    }

    pub fn send_to_client(
        &mut self,
        client_id: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        self.send(client_id, payload, delivery)
    }

    pub fn broadcast(&mut self, payload: &[u8], delivery: DeliveryMode) -> Result<(), TransportError> {
        self.ensure_open()?;
        let delivery = self.effective_delivery(delivery);
        self.transport.broadcast(payload, delivery)
    }

    /// Sends to every client except `except`. Every peer is attempted; the
    /// first failure is returned.
    pub fn broadcast_except(
        &mut self,
        except: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let delivery = self.effective_delivery(delivery);
        let mut first_error = None;
        for peer in self.transport.peers() {
            if peer == except {
                continue;
            }
            if let Err(error) = self.transport.send(peer, payload, delivery) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Handles a `"close"` message. From the server it ends this client's
    /// connection; from a client it drops that peer.
    pub fn handle_close(&mut self, sender: ClientId, events: &mut NetworkEvents) {
        match self.host_type {
            HostType::Server => {
                info!("Client {} closed its connection", sender);
                self.transport.disconnect(sender);
            }
            HostType::Client => {
                if self.state == ConnectionState::Closed {
                    return;
                }
                info!("Server closed the connection");
                self.state = ConnectionState::Closed;
                self.shut_down = true;
                self.transport.close();
                events.push_disconnection(SERVER_ID);
            }
        }
    }

    /// Announces `"close"` to the other side, then shuts the transport down.
    /// Calling it again does nothing.
    pub fn close(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Closed | ConnectionState::Uninitialized
        ) {
            return;
        }

        match WireMessage::Close.encode() {
            Ok(payload) => {
                let result = match self.host_type {
                    HostType::Server => self.transport.broadcast(&payload, DeliveryMode::Reliable),
                    HostType::Client => {
                        self.transport
                            .send(SERVER_ID, &payload, DeliveryMode::Reliable)
                    }
                };
                if let Err(error) = result {
                    debug!("Could not announce close: {}", error);
                }
            }
            Err(error) => warn!("Could not encode close message: {}", error),
        }

        self.transport.close();
        self.state = ConnectionState::Closed;
        self.shut_down = true;
        info!("Network manager closed");
    }

    fn send(
        &mut self,
        peer: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let delivery = self.effective_delivery(delivery);
        self.transport.send(peer, payload, delivery)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        match self.state {
            ConnectionState::Closed => Err(TransportError::Closed),
            ConnectionState::Uninitialized => Err(TransportError::NotConnected),
            _ => Ok(()),
        }
    }

    fn effective_delivery(&self, delivery: DeliveryMode) -> DeliveryMode {
        if self.transport.supports(delivery) {
            delivery
        } else {
            DeliveryMode::Reliable
        }
    }
}

impl Drop for NetworkManager {
    fn drop(&mut self) {
        self.close();
    }
}
