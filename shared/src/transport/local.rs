//! In-process transport.
//! Routes payloads between a server and any number of clients living in the
//! same thread without network I/O, and records every send for inspection.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap, VecDeque},
    rc::Rc,
};

use super::{error::TransportError, DeliveryMode, Transport, TransportEvent};
use crate::{
    messages::{error::WireError, wire_message::WireMessage},
    types::{ClientId, HostType, SERVER_ID},
};

/// One payload handed to a `LocalTransport`, as seen by the hub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentFrame {
    pub from: ClientId,
    pub to: ClientId,
    pub delivery: DeliveryMode,
    pub payload: Vec<u8>,
}

impl SentFrame {
    pub fn message(&self) -> Result<WireMessage, WireError> {
        WireMessage::decode(&self.payload)
    }
}

struct HubState {
    next_client_id: ClientId,
    datagrams: bool,
    connected: BTreeSet<ClientId>,
    to_server: HashMap<ClientId, VecDeque<Vec<u8>>>,
    to_client: HashMap<ClientId, VecDeque<Vec<u8>>>,
    server_events: VecDeque<TransportEvent>,
    client_events: HashMap<ClientId, VecDeque<TransportEvent>>,
    sent: Vec<SentFrame>,
}

impl HubState {
    /// Messages already queued in either direction stay readable; nothing
    /// new can be queued for or from `client`.
    fn drop_client(&mut self, client: ClientId) -> bool {
        if !self.connected.remove(&client) {
            return false;
        }
        if self.to_server.get(&client).is_some_and(VecDeque::is_empty) {
            self.to_server.remove(&client);
        }
        if self.to_client.get(&client).is_some_and(VecDeque::is_empty) {
            self.to_client.remove(&client);
        }
        self.server_events
            .push_back(TransportEvent::PeerDisconnected(client));
        self.client_events
            .entry(client)
            .or_default()
            .push_back(TransportEvent::Closed);
        true
    }
}

#[derive(Clone)]
pub struct LocalHub {
    state: Rc<RefCell<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::with_datagrams(true)
    }

    /// A hub whose endpoints report no unreliable channel, so unreliable
    /// sends are expected to fall back to reliable delivery.
    pub fn without_datagrams() -> Self {
        Self::with_datagrams(false)
    }

    fn with_datagrams(datagrams: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                next_client_id: 1,
                datagrams,
                connected: BTreeSet::new(),
                to_server: HashMap::new(),
                to_client: HashMap::new(),
                server_events: VecDeque::new(),
                client_events: HashMap::new(),
                sent: Vec::new(),
            })),
        }
    }

    pub fn server(&self) -> LocalTransport {
        LocalTransport {
            hub: self.clone(),
            host_type: HostType::Server,
            local_id: SERVER_ID,
            closed: false,
        }
    }

    /// Accepts a new client. The server sees `PeerConnected` and the client
    /// sees `Connected` with the same id on their next poll.
    pub fn connect(&self) -> LocalTransport {
        let mut state = self.state.borrow_mut();
        let client_id = state.next_client_id;
        state.next_client_id += 1;
        state.connected.insert(client_id);
        state.to_server.insert(client_id, VecDeque::new());
        state.to_client.insert(client_id, VecDeque::new());
        state
            .server_events
            .push_back(TransportEvent::PeerConnected(client_id));
        state
            .client_events
            .entry(client_id)
            .or_default()
            .push_back(TransportEvent::Connected(client_id));

        LocalTransport {
            hub: self.clone(),
            host_type: HostType::Client,
            local_id: client_id,
            closed: false,
        }
    }

    /// Simulates a dropped connection.
    pub fn disconnect(&self, client: ClientId) {
        self.state.borrow_mut().drop_client(client);
    }

    pub fn connected_clients(&self) -> Vec<ClientId> {
        self.state.borrow().connected.iter().copied().collect()
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.state.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// Messages queued for `client` that it has not read yet.
    pub fn pending_for(&self, client: ClientId) -> usize {
        self.state
            .borrow()
            .to_client
            .get(&client)
            .map_or(0, VecDeque::len)
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LocalTransport {
    hub: LocalHub,
    host_type: HostType,
    local_id: ClientId,
    closed: bool,
}

impl LocalTransport {
    pub fn local_id(&self) -> ClientId {
        self.local_id
    }
}

impl Transport for LocalTransport {
    fn host_type(&self) -> HostType {
        self.host_type
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let mut state = self.hub.state.borrow_mut();
        match self.host_type {
            HostType::Server => state.server_events.pop_front(),
            HostType::Client => state
                .client_events
                .get_mut(&self.local_id)
                .and_then(VecDeque::pop_front),
        }
    }

    fn peers(&self) -> Vec<ClientId> {
        let state = self.hub.state.borrow();
        match self.host_type {
            HostType::Server => state.connected.iter().copied().collect(),
            HostType::Client if state.connected.contains(&self.local_id) => vec![SERVER_ID],
            HostType::Client => Vec::new(),
        }
    }

    fn send(
        &mut self,
        peer: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut state = self.hub.state.borrow_mut();
        let delivery = if state.datagrams {
            delivery
        } else {
            DeliveryMode::Reliable
        };

        let queue = match self.host_type {
            HostType::Server => {
                if !state.connected.contains(&peer) {
                    return Err(TransportError::UnknownPeer { peer });
                }
                state.to_client.get_mut(&peer)
            }
            HostType::Client => {
                if peer != SERVER_ID {
                    return Err(TransportError::UnknownPeer { peer });
                }
                if !state.connected.contains(&self.local_id) {
                    return Err(TransportError::NotConnected);
                }
                state.to_server.get_mut(&self.local_id)
            }
        };
        let queue = match queue {
            Some(queue) => queue,
            None => return Err(TransportError::PeerClosed { peer }),
        };
        queue.push_back(payload.to_vec());

        state.sent.push(SentFrame {
            from: self.local_id,
            to: peer,
            delivery,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn readable_peers(&self) -> Vec<ClientId> {
        let state = self.hub.state.borrow();
        match self.host_type {
            HostType::Server => {
                let mut readable: Vec<ClientId> = state
                    .to_server
                    .iter()
                    .filter(|(client, queue)| state.connected.contains(client) || !queue.is_empty())
                    .map(|(client, _)| *client)
                    .collect();
                readable.sort_unstable();
                readable
            }
            HostType::Client => {
                let pending = state
                    .to_client
                    .get(&self.local_id)
                    .is_some_and(|queue| !queue.is_empty());
                if pending || state.connected.contains(&self.local_id) {
                    vec![SERVER_ID]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn try_read(&mut self, peer: ClientId) -> Option<Vec<u8>> {
        let mut guard = self.hub.state.borrow_mut();
        let state = &mut *guard;
        let (queues, client) = match self.host_type {
            HostType::Server => (&mut state.to_server, peer),
            HostType::Client if peer == SERVER_ID => (&mut state.to_client, self.local_id),
            HostType::Client => return None,
        };
        let queue = queues.get_mut(&client)?;
        let message = queue.pop_front();
        // a dropped client's queue goes away once it is read dry
        if queue.is_empty() && !state.connected.contains(&client) {
            queues.remove(&client);
        }
        message
    }

    fn supports(&self, delivery: DeliveryMode) -> bool {
        match delivery {
            DeliveryMode::Reliable => true,
            DeliveryMode::Unreliable => self.hub.state.borrow().datagrams,
        }
    }

    fn disconnect(&mut self, peer: ClientId) {
        match self.host_type {
            HostType::Server => self.hub.disconnect(peer),
            HostType::Client if peer == SERVER_ID => self.close(),
            HostType::Client => {}
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.hub.state.borrow_mut();
        match self.host_type {
            HostType::Server => {
                let clients: Vec<ClientId> = state.connected.iter().copied().collect();
                for client in clients {
                    state.drop_client(client);
                }
                state.to_server.clear();
            }
            HostType::Client => {
                state.drop_client(self.local_id);
                state.to_client.remove(&self.local_id);
            }
        }
    }
}
