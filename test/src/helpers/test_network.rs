use std::collections::BTreeMap;

use easycells_shared::{
    ClientId, ConnectEvent, DisconnectEvent, ErrorEvent, LocalHub, NetworkConfig,
    NetworkContext, NetworkError, NetworkEvents,
};

use super::init_logger;

// server -> client -> server -> client covers a client call, its relay and
// one nested reply
const PUMP_ROUNDS: usize = 4;

/// What every context reported while the network was pumped.
#[derive(Debug, Default)]
pub struct Pumped {
    pub server_errors: Vec<NetworkError>,
    pub client_errors: Vec<(ClientId, NetworkError)>,
    pub server_connections: Vec<ClientId>,
    pub server_disconnections: Vec<ClientId>,
    pub client_connections: Vec<ClientId>,
    pub client_disconnections: Vec<ClientId>,
}

impl Pumped {
    pub fn is_clean(&self) -> bool {
        self.server_errors.is_empty() && self.client_errors.is_empty()
    }

    fn absorb_server(&mut self, mut events: NetworkEvents) {
        self.server_connections.extend(events.read::<ConnectEvent>());
        self.server_disconnections
            .extend(events.read::<DisconnectEvent>());
        self.server_errors.extend(events.read::<ErrorEvent>());
    }

    fn absorb_client(&mut self, client_id: ClientId, mut events: NetworkEvents) {
        self.client_connections.extend(events.read::<ConnectEvent>());
        self.client_disconnections
            .extend(events.read::<DisconnectEvent>());
        for error in events.read::<ErrorEvent>() {
            self.client_errors.push((client_id, error));
        }
    }

    fn merge(&mut self, other: Pumped) {
        self.server_errors.extend(other.server_errors);
        self.client_errors.extend(other.client_errors);
        self.server_connections.extend(other.server_connections);
        self.server_disconnections
            .extend(other.server_disconnections);
        self.client_connections.extend(other.client_connections);
        self.client_disconnections
            .extend(other.client_disconnections);
    }
}

/// A server and its clients over one `LocalHub`, all on the test thread.
pub struct TestNetwork {
    hub: LocalHub,
    config: NetworkConfig,
    server: NetworkContext,
    clients: BTreeMap<ClientId, NetworkContext>,
}

impl TestNetwork {
    /// Server plus `client_count` connected clients, ids `1..=client_count`.
    pub fn new(client_count: usize) -> Self {
        Self::build(LocalHub::new(), NetworkConfig::default(), client_count)
    }

    pub fn with_config(client_count: usize, config: NetworkConfig) -> Self {
        Self::build(LocalHub::new(), config, client_count)
    }

    /// Same as `new`, but unreliable sends fall back to the reliable channel.
    pub fn without_datagrams(client_count: usize) -> Self {
        Self::build(LocalHub::without_datagrams(), NetworkConfig::default(), client_count)
    }

    fn build(hub: LocalHub, config: NetworkConfig, client_count: usize) -> Self {
        init_logger();

        let server = NetworkContext::new(hub.server(), config.clone());
        let mut network = Self {
            hub,
            config,
            server,
            clients: BTreeMap::new(),
        };
        for _ in 0..client_count {
            network.connect_client();
        }
        network.pump();
        network.hub.take_sent();
        network
    }

    /// Accepts one more client without ticking anyone. The client learns its
    /// id on its next tick.
    pub fn connect_client(&mut self) -> ClientId {
        let transport = self.hub.connect();
        let client_id = transport.local_id();
        self.clients
            .insert(client_id, NetworkContext::new(transport, self.config.clone()));
        client_id
    }

    pub fn hub(&self) -> &LocalHub {
        &self.hub
    }

    pub fn server(&mut self) -> &mut NetworkContext {
        &mut self.server
    }

    pub fn client(&mut self, client_id: ClientId) -> &mut NetworkContext {
        match self.clients.get_mut(&client_id) {
            Some(client) => client,
            None => panic!("No client with id {}", client_id),
        }
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Takes a client out of the network. It is no longer ticked.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<NetworkContext> {
        self.clients.remove(&client_id)
    }

    /// One round: the server ticks, then every client in id order.
    pub fn step(&mut self, delta_time: f64) -> Pumped {
        let mut pumped = Pumped::default();
        pumped.absorb_server(self.server.tick(delta_time));
        for (client_id, client) in self.clients.iter_mut() {
            pumped.absorb_client(*client_id, client.tick(delta_time));
        }
        pumped
    }

    /// Delivers everything in flight without advancing the clock.
    pub fn pump(&mut self) -> Pumped {
        let mut pumped = Pumped::default();
        for _ in 0..PUMP_ROUNDS {
            pumped.merge(self.step(0.0));
        }
        pumped
    }

    /// Advances every clock by `seconds` in steps of `step_size`, then pumps.
    pub fn advance(&mut self, seconds: f64, step_size: f64) -> Pumped {
        let mut pumped = Pumped::default();
        let mut elapsed = 0.0;
        while elapsed < seconds {
            pumped.merge(self.step(step_size));
            elapsed += step_size;
        }
        pumped.merge(self.pump());
        pumped
    }
}
