use std::{
    collections::VecDeque,
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::{mpsc, watch, Notify},
    task::JoinSet,
};

use easycells_shared::{encode_frame, ClientId, FrameDecoder, TransportEvent, WireMessage};

use super::{lock, Inbox, PeerHandle, SharedState};
use crate::error::ServerError;

const READ_BUFFER_SIZE: usize = 8 * 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub(crate) fn bind(addr: SocketAddr) -> Result<StdTcpListener, ServerError> {
    let to_error = |error: std::io::Error| ServerError::Bind {
        addr,
        reason: error.to_string(),
    };
    let listener = StdTcpListener::bind(addr).map_err(to_error)?;
    listener.set_nonblocking(true).map_err(to_error)?;
    Ok(listener)
}

/// Accepts clients until shutdown, handing out ids 1, 2, 3... Each client's
/// first frame is its id, followed by its datagram key when the server
/// offers datagrams.
pub(crate) async fn accept_loop(
    listener: StdTcpListener,
    state: SharedState,
    max_message_size: Option<usize>,
    offers_datagrams: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(error) => {
            error!("Failed to register listener with the runtime: {}", error);
            return;
        }
    };

    let mut connections = JoinSet::new();
    let mut next_client_id: ClientId = 1;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        warn!("Accept failed: {}", error);
                        continue;
                    }
                };
                let client_id = next_client_id;
                next_client_id += 1;

                if let Err(error) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle for client {}: {}", client_id, error);
                }

                let datagram_key = fastrand::u64(..);
                let mut greeting = vec![WireMessage::AssignId(client_id)];
                if offers_datagrams {
                    greeting.push(WireMessage::DatagramKey(datagram_key));
                }
                let greeting = match greeting
                    .iter()
                    .map(WireMessage::encode)
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(payloads) => payloads,
                    Err(error) => {
                        warn!("Could not encode greeting for client {}: {}", client_id, error);
                        continue;
                    }
                };
                let (outgoing, outgoing_receiver) = mpsc::unbounded_channel();
                if greeting
                    .into_iter()
                    .any(|payload| outgoing.send(payload).is_err())
                {
                    continue;
                }

                let inbox: Inbox = Arc::new(Mutex::new(VecDeque::new()));
                let kill = Arc::new(Notify::new());
                {
                    let mut state = lock(&state);
                    state.peers.insert(
                        client_id,
                        PeerHandle {
                            outgoing,
                            inbox: inbox.clone(),
                            kill: kill.clone(),
                            datagram_key,
                            remote_ip: addr.ip(),
                            datagram_addr: None,
                        },
                    );
                    state
                        .events
                        .push_back(TransportEvent::PeerConnected(client_id));
                }
                info!("Accepted client {} from {}", client_id, addr);

                connections.spawn(serve_client(
                    stream,
                    client_id,
                    state.clone(),
                    inbox,
                    kill,
                    outgoing_receiver,
                    max_message_size,
                ));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        debug!("Some client connections did not flush before shutdown");
    }
}

async fn serve_client(
    stream: TcpStream,
    client_id: ClientId,
    state: SharedState,
    inbox: Inbox,
    kill: Arc<Notify>,
    outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    max_message_size: Option<usize>,
) {
    let (reader, writer) = stream.into_split();
    let writer = tokio::spawn(write_loop(writer, outgoing, client_id));

    tokio::select! {
        _ = read_loop(reader, client_id, inbox, max_message_size) => {}
        _ = kill.notified() => {}
    }

    if lock(&state).remove_peer(client_id) {
        info!("Client {} disconnected", client_id);
    }
    if writer.await.is_err() {
        debug!("Writer for client {} was cancelled", client_id);
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    client_id: ClientId,
    inbox: Inbox,
    max_message_size: Option<usize>,
) {
    let mut decoder = FrameDecoder::new(max_message_size);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Client {} closed its stream", client_id);
                return;
            }
            Ok(read) => read,
            Err(error) => {
                debug!("Read from client {} failed: {}", client_id, error);
                return;
            }
        };
        decoder.push(&buffer[..read]);

        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    trace!("Client {} sent {} bytes", client_id, frame.len());
                    lock(&inbox).push_back(frame);
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("Dropping client {}: {}", client_id, error);
                    return;
                }
            }
        }
    }
}

/// Frames and writes queued payloads until every sender is gone, then
/// shuts the write half down.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    client_id: ClientId,
) {
    while let Some(payload) = outgoing.recv().await {
        let frame = match encode_frame(&payload) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("Dropping message for client {}: {}", client_id, error);
                continue;
            }
        };
        if let Err(error) = writer.write_all(&frame).await {
            debug!("Write to client {} failed: {}", client_id, error);
            return;
        }
    }
    if let Err(error) = writer.shutdown().await {
        trace!("Shutdown of client {} stream failed: {}", client_id, error);
    }
}
