//! Socket-backed `Transport` for the client.
//! Connecting, reading, writing and the datagram handshake all run on a
//! background thread with a single-threaded tokio runtime. Sends made
//! before the connection is up are queued and flushed once it is.

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
    collections::VecDeque,
    io::ErrorKind,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket as StdUdpSocket},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, watch};

use easycells_shared::{
    ClientId, DeliveryMode, HostType, Transport, TransportError, TransportEvent, SERVER_ID,
};

use self::udp::DatagramLink;
use crate::{client_config::ClientConfig, error::ClientError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum LinkState {
    #[default]
    Connecting,
    Open,
    Closed,
}

#[derive(Default)]
pub(crate) struct ClientState {
    pub(crate) client_id: Option<ClientId>,
    pub(crate) link: LinkState,
    pub(crate) datagram_ready: bool,
    pub(crate) inbox: VecDeque<Vec<u8>>,
    pub(crate) events: VecDeque<TransportEvent>,
    // `Closed` waits until the inbox has been read dry
    close_pending: bool,
}

impl ClientState {
    pub(crate) fn close_link(&mut self) {
        if self.link == LinkState::Closed {
            return;
        }
        self.link = LinkState::Closed;
        if self.inbox.is_empty() {
            self.events.push_back(TransportEvent::Closed);
        } else {
            self.close_pending = true;
        }
    }

    fn pop_message(&mut self) -> Option<Vec<u8>> {
        let message = self.inbox.pop_front();
        if self.close_pending && self.inbox.is_empty() {
            self.close_pending = false;
            self.events.push_back(TransportEvent::Closed);
        }
        message
    }

    fn discard_inbox(&mut self) {
        self.inbox.clear();
        if self.close_pending {
            self.close_pending = false;
            self.events.push_back(TransportEvent::Closed);
        }
    }
}

pub(crate) type SharedState = Arc<Mutex<ClientState>>;

pub struct ClientSocket {
    state: SharedState,
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    datagrams: Option<StdUdpSocket>,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl ClientSocket {
    /// Starts connecting in the background. Only local setup errors are
    /// returned; a refused connection shows up as a `Closed` event.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let (datagrams, datagram_link) = match config.datagram_server_addr {
            Some(addr) if DATAGRAMS_ENABLED => {
                let socket = bind_datagram_socket(addr)?;
                let receiver = socket.try_clone().map_err(|error| ClientError::Bind {
                    reason: error.to_string(),
                })?;
                let link = DatagramLink {
                    socket: receiver,
                    interval: config.handshake_interval,
                    attempts: config.handshake_attempts,
                };
                (Some(socket), Some(link))
            }
            Some(_) => {
                debug!("Datagram address ignored: built without the transport_udp feature");
                (None, None)
            }
            None => (None, None),
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| ClientError::Runtime {
                reason: error.to_string(),
            })?;

        let state: SharedState = Arc::new(Mutex::new(ClientState::default()));
        let (outgoing, outgoing_receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_receiver) = watch::channel(false);

        let connection = tcp::Connection {
            server_addr: config.server_addr,
            connect_timeout: config.connect_timeout,
            max_message_size: config.max_message_size,
            state: state.clone(),
            outgoing: outgoing_receiver,
            datagram_link,
            shutdown: shutdown_receiver,
        };

        let thread = std::thread::Builder::new()
            .name("easycells-client".to_string())
            .spawn(move || {
                runtime.block_on(connection.run());
                debug!("Client socket thread finished");
            })
            .map_err(|error| ClientError::Runtime {
                reason: error.to_string(),
            })?;

        info!("Connecting to {}", config.server_addr);
        Ok(Self {
            state,
            outgoing: Some(outgoing),
            datagrams,
            shutdown,
            thread: Some(thread),
            closed: false,
        })
    }

    /// Whether the datagram handshake has completed.
    pub fn datagrams_ready(&self) -> bool {
        lock(&self.state).datagram_ready
    }

    fn send_datagram(&self, payload: &[u8]) -> Option<Result<(), TransportError>> {
        let socket = self.datagrams.as_ref()?;
        if !lock(&self.state).datagram_ready {
            return None;
        }
        Some(match socket.send(payload) {
            Ok(_) => Ok(()),
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                trace!("Datagram dropped: send buffer full");
                Ok(())
            }
            Err(error) => Err(error.into()),
        })
    }
}

fn bind_datagram_socket(server_addr: SocketAddr) -> Result<StdUdpSocket, ClientError> {
    let local_addr: SocketAddr = if server_addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let to_error = |error: std::io::Error| ClientError::Bind {
        reason: error.to_string(),
    };
    let socket = StdUdpSocket::bind(local_addr).map_err(to_error)?;
    socket.connect(server_addr).map_err(to_error)?;
    socket.set_nonblocking(true).map_err(to_error)?;
    Ok(socket)
}

impl Transport for ClientSocket {
    fn host_type(&self) -> HostType {
        HostType::Client
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        lock(&self.state).events.pop_front()
    }

    fn peers(&self) -> Vec<ClientId> {
        let state = lock(&self.state);
        if state.client_id.is_some() && state.link == LinkState::Open {
            vec![SERVER_ID]
        } else {
            Vec::new()
        }
    }

    fn send(
        &mut self,
        peer: ClientId,
        payload: &[u8],
        delivery: DeliveryMode,
    ) -> Result<(), TransportError> {
        if peer != SERVER_ID {
            return Err(TransportError::UnknownPeer { peer });
        }
        let outgoing = match (&self.outgoing, self.closed) {
            (Some(outgoing), false) => outgoing,
            _ => return Err(TransportError::Closed),
        };
        if lock(&self.state).link == LinkState::Closed {
            return Err(TransportError::PeerClosed { peer });
        }

        if delivery == DeliveryMode::Unreliable {
            if let Some(result) = self.send_datagram(payload) {
                return result;
            }
        }

        outgoing
            .send(payload.to_vec())
            .map_err(|_| TransportError::PeerClosed { peer })
    }

    /// Stays `[SERVER_ID]` after the link drops until everything the
    /// server sent before it has been read.
    fn readable_peers(&self) -> Vec<ClientId> {
        let state = lock(&self.state);
        let readable = state.link == LinkState::Open || !state.inbox.is_empty();
        if state.client_id.is_some() && readable {
            vec![SERVER_ID]
        } else {
            Vec::new()
        }
    }

    fn try_read(&mut self, peer: ClientId) -> Option<Vec<u8>> {
        if peer != SERVER_ID {
            return None;
        }
        lock(&self.state).pop_message()
    }

    fn supports(&self, delivery: DeliveryMode) -> bool {
        match delivery {
            DeliveryMode::Reliable => true,
            DeliveryMode::Unreliable => self.datagrams.is_some(),
        }
    }

    fn disconnect(&mut self, peer: ClientId) {
        if peer == SERVER_ID {
            self.close();
        }
    }

    /// Flushes queued sends, then stops the background thread.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.outgoing = None;

        if self.shutdown.send(true).is_err() {
            debug!("Client socket thread already stopped");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Client socket thread panicked");
            }
        }
        {
            let mut state = lock(&self.state);
            state.discard_inbox();
            state.close_link();
        }
        info!("Client socket closed");
    }
}

impl Drop for ClientSocket {
    fn drop(&mut self) {
        self.close();
    }
}
