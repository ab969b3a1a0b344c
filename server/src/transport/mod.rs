//! Socket-backed `Transport` for the server.
//! A background thread runs a single-threaded tokio runtime with the accept
//! loop, one reader and one writer task per client and, when the
//! `transport_udp` feature is on and a datagram address is configured, the
//! datagram loop. The game thread only touches the shared state below.

mod tcp;
mod udp;

cfg_if! {
    if #[cfg(feature = "transport_udp")] {
        const DATAGRAMS_ENABLED: bool = true;
    } else {
        const DATAGRAMS_ENABLED: bool = false;
    }
}

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch, Notify};

use easycells_shared::{ClientId, DeliveryMode, HostType, Transport, TransportError, TransportEvent};

use self::udp::DatagramSocket;
use crate::{error::ServerError, server_config::ServerConfig};

pub(crate) type Inbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One accepted client as seen from the game thread.
pub(crate) struct PeerHandle {
    pub(crate) outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pub(crate) inbox: Inbox,
    pub(crate) kill: Arc<Notify>,
    /// Handed to the client over its reliable connection; a handshake must
    /// present it, from the connection's IP, to bind `datagram_addr`.
    pub(crate) datagram_key: u64,
    pub(crate) remote_ip: IpAddr,
    pub(crate) datagram_addr: Option<SocketAddr>,
}

#[derive(Default)]
pub(crate) struct ServerState {
    pub(crate) peers: BTreeMap<ClientId, PeerHandle>,
    /// Inboxes of clients that left before the game thread read everything
    /// they sent.
    pub(crate) departed: BTreeMap<ClientId, Inbox>,
    pub(crate) datagram_peers: HashMap<SocketAddr, ClientId>,
    pub(crate) events: VecDeque<TransportEvent>,
}

impl ServerState {
    /// Forgets `client_id`. Returns false if it was already gone.
    ///
    /// Messages that already arrived stay readable; `PeerDisconnected` is
    /// queued once the last of them has been read.
    pub(crate) fn remove_peer(&mut self, client_id: ClientId) -> bool {
        let peer = match self.peers.remove(&client_id) {
            Some(peer) => peer,
            None => return false,
        };
        if let Some(addr) = peer.datagram_addr {
            self.datagram_peers.remove(&addr);
        }
        peer.kill.notify_one();
        if lock(&peer.inbox).is_empty() {
            self.events
                .push_back(TransportEvent::PeerDisconnected(client_id));
        } else {
            self.departed.insert(client_id, peer.inbox);
        }
        true
    }

    fn read_departed(&mut self, client_id: ClientId) -> Option<Vec<u8>> {
        let inbox = self.departed.get(&client_id)?.clone();
        let (message, drained) = {
            let mut queue = lock(&inbox);
            let message = queue.pop_front();
            (message, queue.is_empty())
        };
        if drained {
            self.departed.remove(&client_id);
            self.events
                .push_back(TransportEvent::PeerDisconnected(client_id));
        }
        message
    }
}

pub(crate) type SharedState = Arc<Mutex<ServerState>>;

pub struct ServerSocket {
    state: SharedState,
    local_addr: SocketAddr,
    datagrams: Option<DatagramSocket>,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl ServerSocket {
    /// Binds every configured socket on the calling thread, so bind errors
    /// are returned here, then starts the background thread.
    pub fn listen(config: &ServerConfig) -> Result<Self, ServerError> {
        let listener = tcp::bind(config.listen_addr)?;
        let local_addr = listener.local_addr().map_err(|error| ServerError::Bind {
            addr: config.listen_addr,
            reason: error.to_string(),
        })?;

        let datagrams = match config.datagram_addr {
            Some(addr) if DATAGRAMS_ENABLED => Some(DatagramSocket::bind(addr)?),
            Some(_) => {
                debug!("Datagram address ignored: built without the transport_udp feature");
                None
            }
            None => None,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| ServerError::Runtime {
                reason: error.to_string(),
            })?;

        let state: SharedState = Arc::new(Mutex::new(ServerState::default()));
        let (shutdown, shutdown_receiver) = watch::channel(false);

        let thread_state = state.clone();
        let max_message_size = config.max_message_size;
        let offers_datagrams = datagrams.is_some();
        let datagram_receiver = match &datagrams {
            Some(socket) => Some(socket.receiver()?),
            None => None,
        };

        let thread = std::thread::Builder::new()
            .name("easycells-server".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if let Some(receiver) = datagram_receiver {
                        tokio::spawn(udp::receive_loop(
                            receiver,
                            thread_state.clone(),
                            shutdown_receiver.clone(),
                        ));
                    }
                    tcp::accept_loop(
                        listener,
                        thread_state,
                        max_message_size,
                        offers_datagrams,
                        shutdown_receiver,
                    )
                    .await;
                });
                debug!("Server socket thread finished");
            })
            .map_err(|error| ServerError::Runtime {
                reason: error.to_string(),
            })?;

        info!("Server listening on {}", local_addr);
        Ok(Self {
            state,
            local_addr,
            datagrams,
            shutdown,
            thread: Some(thread),
            closed: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound address of the datagram socket, if the unreliable channel is on.
    pub fn datagram_addr(&self) -> Option<SocketAddr> {
        self.datagrams.as_ref().map(DatagramSocket::local_addr)
    }

    fn send_datagram(&self, peer: ClientId, payload: &[u8]) -> Option<Result<(), TransportError>> {
        let socket = self.datagrams.as_ref()?;
        let addr = lock(&self.state).peers.get(&peer)?.datagram_addr?;
        Some(socket.send_to(payload, addr))
    }
}

impl Transport for ServerSocket {
    fn host_type(&self) -> HostType {
        HostType::Server
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        lock(&self.state).events.pop_front()
    }

    fn peers(&self) -> Vec<ClientId> {
        lock(&self.state).peers.keys().copied().collect()
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

        if delivery == DeliveryMode::Unreliable {
            // peers without a completed handshake fall through to the stream
            if let Some(result) = self.send_datagram(peer, payload) {
                return result;
            }
        }

        let state = lock(&self.state);
        let handle = state
            .peers
            .get(&peer)
            .ok_or(TransportError::UnknownPeer { peer })?;
        handle
            .outgoing
            .send(payload.to_vec())
            .map_err(|_| TransportError::PeerClosed { peer })
    }

    fn readable_peers(&self) -> Vec<ClientId> {
        let state = lock(&self.state);
        let mut readable: Vec<ClientId> = state
            .peers
            .keys()
            .chain(state.departed.keys())
            .copied()
            .collect();
        readable.sort_unstable();
        readable
    }

    fn try_read(&mut self, peer: ClientId) -> Option<Vec<u8>> {
        let mut state = lock(&self.state);
        let inbox = match state.peers.get(&peer) {
            Some(handle) => handle.inbox.clone(),
            None => return state.read_departed(peer),
        };
        drop(state);
        let message = lock(&inbox).pop_front();
        message
    }

    fn supports(&self, delivery: DeliveryMode) -> bool {
        match delivery {
            DeliveryMode::Reliable => true,
            DeliveryMode::Unreliable => self.datagram_addr().is_some(),
        }
    }

    fn disconnect(&mut self, peer: ClientId) {
        if lock(&self.state).remove_peer(peer) {
            info!("Disconnected client {}", peer);
        }
    }

    /// Drops every client after flushing what was already queued for it,
    /// then stops the background thread.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        {
            let mut state = lock(&self.state);
            for (_, peer) in std::mem::take(&mut state.peers) {
                peer.kill.notify_one();
            }
            state.departed.clear();
            state.datagram_peers.clear();
        }

        if self.shutdown.send(true).is_err() {
            debug!("Server socket thread already stopped");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Server socket thread panicked");
            }
        }
        info!("Server socket on {} closed", self.local_addr);
    }
}

impl Drop for ServerSocket {
    fn drop(&mut self) {
        self.close();
    }
}
