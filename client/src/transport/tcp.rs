use std::{net::SocketAddr, time::Duration};

use log::{debug, info, trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, watch},
};

use easycells_shared::{encode_frame, DatagramTicket, FrameDecoder, TransportEvent, WireMessage};

use super::{lock, udp, udp::DatagramLink, LinkState, SharedState};

const READ_BUFFER_SIZE: usize = 8 * 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Everything the background thread needs to drive one connection.
pub(crate) struct Connection {
    pub(crate) server_addr: SocketAddr,
    pub(crate) connect_timeout: Duration,
    pub(crate) max_message_size: Option<usize>,
    pub(crate) state: SharedState,
    pub(crate) outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    pub(crate) datagram_link: Option<DatagramLink>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub(crate) async fn run(self) {
        let Connection {
            server_addr,
            connect_timeout,
            max_message_size,
            state,
            outgoing,
            mut datagram_link,
            mut shutdown,
        } = self;

        let connect = tokio::time::timeout(connect_timeout, TcpStream::connect(server_addr));
        let stream = tokio::select! {
            _ = shutdown.changed() => return,
            connected = connect => match connected {
                Ok(Ok(stream)) => stream,
                Ok(Err(error)) => {
                    warn!("Could not connect to {}: {}", server_addr, error);
                    lock(&state).close_link();
                    return;
                }
                Err(_) => {
                    warn!("Timed out connecting to {}", server_addr);
                    lock(&state).close_link();
                    return;
                }
            },
        };
        if let Err(error) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle: {}", error);
        }
        info!("Connected to {}, waiting for an id", server_addr);

        let (reader, writer) = stream.into_split();
        let mut writer = tokio::spawn(write_loop(writer, outgoing));
        let datagram_shutdown = shutdown.clone();
        let read = read_loop(
            reader,
            &state,
            max_message_size,
            &mut datagram_link,
            &datagram_shutdown,
        );

        tokio::select! {
            _ = read => {
                lock(&state).close_link();
                writer.abort();
            }
            _ = shutdown.changed() => {
                if tokio::time::timeout(SHUTDOWN_GRACE, &mut writer).await.is_err() {
                    debug!("Pending messages were not flushed before shutdown");
                }
            }
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    state: &SharedState,
    max_message_size: Option<usize>,
    datagram_link: &mut Option<DatagramLink>,
    shutdown: &watch::Receiver<bool>,
) {
    let mut decoder = FrameDecoder::new(max_message_size);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Server closed the stream");
                return;
            }
            Ok(read) => read,
            Err(error) => {
                debug!("Read from server failed: {}", error);
                return;
            }
        };
        decoder.push(&buffer[..read]);

        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => handle_frame(state, frame, datagram_link, shutdown),
                Ok(None) => break,
                Err(error) => {
                    warn!("Dropping connection: {}", error);
                    return;
                }
            }
        }
    }
}

/// The first frame carries our id and, when the server offers datagrams, the
/// next one our datagram key. Everything else is for the game thread.
fn handle_frame(
    state: &SharedState,
    frame: Vec<u8>,
    datagram_link: &mut Option<DatagramLink>,
    shutdown: &watch::Receiver<bool>,
) {
    let mut guard = lock(state);
    let client_id = match guard.client_id {
        Some(client_id) => client_id,
        None => {
            if let Ok(WireMessage::AssignId(client_id)) = WireMessage::decode(&frame) {
                guard.client_id = Some(client_id);
                guard.link = LinkState::Open;
                guard.events.push_back(TransportEvent::Connected(client_id));
                info!("Server assigned id {}", client_id);
                return;
            }
            warn!("Server sent a message before assigning an id");
            guard.inbox.push_back(frame);
            return;
        }
    };

    if datagram_link.is_some() {
        if let Ok(WireMessage::DatagramKey(key)) = WireMessage::decode(&frame) {
            drop(guard);
            if let Some(link) = datagram_link.take() {
                let ticket = DatagramTicket { client_id, key };
                tokio::spawn(udp::run(link, ticket, state.clone(), shutdown.clone()));
            }
            return;
        }
    }
    trace!("Server sent {} bytes", frame.len());
    guard.inbox.push_back(frame);
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(payload) = outgoing.recv().await {
        let frame = match encode_frame(&payload) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("Dropping outgoing message: {}", error);
                continue;
            }
        };
        if let Err(error) = writer.write_all(&frame).await {
            debug!("Write to server failed: {}", error);
            return;
        }
    }
    if let Err(error) = writer.shutdown().await {
        trace!("Stream shutdown failed: {}", error);
    }
}
