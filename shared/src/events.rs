use std::{mem, vec::IntoIter};

use crate::{error::NetworkError, types::ClientId};

/// Everything that happened during one `NetworkContext::tick`.
pub struct NetworkEvents {
    connections: Vec<ClientId>,
    disconnections: Vec<ClientId>,
    errors: Vec<NetworkError>,

    empty: bool,
}

impl NetworkEvents {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            errors: Vec::new(),

            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: NetworkEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: NetworkEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_connection(&mut self, client_id: ClientId) {
        self.connections.push(client_id);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, client_id: ClientId) {
        self.disconnections.push(client_id);
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: NetworkError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait NetworkEvent {
    type Iter;

    fn iter(events: &mut NetworkEvents) -> Self::Iter;

    fn has(events: &NetworkEvents) -> bool;
}

/// On a client: the id the server assigned us. On a server: each newly
/// accepted client.
pub struct ConnectEvent;
impl NetworkEvent for ConnectEvent {
    type Iter = IntoIter<ClientId>;

    fn iter(events: &mut NetworkEvents) -> Self::Iter {
        let list = mem::take(&mut events.connections);
        IntoIterator::into_iter(list)
    }

    fn has(events: &NetworkEvents) -> bool {
        !events.connections.is_empty()
    }
}

/// On a client: `SERVER_ID` once the connection ends. On a server: each
/// client that left.
pub struct DisconnectEvent;
impl NetworkEvent for DisconnectEvent {
    type Iter = IntoIter<ClientId>;

    fn iter(events: &mut NetworkEvents) -> Self::Iter {
        let list = mem::take(&mut events.disconnections);
        IntoIterator::into_iter(list)
    }

    fn has(events: &NetworkEvents) -> bool {
        !events.disconnections.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl NetworkEvent for ErrorEvent {
    type Iter = IntoIter<NetworkError>;

    fn iter(events: &mut NetworkEvents) -> Self::Iter {
        let list = mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &NetworkEvents) -> bool {
        !events.errors.is_empty()
    }
}
