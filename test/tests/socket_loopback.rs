use std::{
    net::SocketAddr,
    thread::sleep,
    time::{Duration, Instant},
};

use easycells_client::{ClientConfig, ClientSocket};
use easycells_server::{ServerConfig, ServerSocket};
use easycells_shared::{
    ConnectionState, DeliveryMode, NetworkConfig, NetworkContext, NetworkVariable, Transport,
    TransportEvent, SERVER_ID,
};
use easycells_test::{init_logger, spawn_probe};

const POLL: Duration = Duration::from_millis(5);
const TIMEOUT: Duration = Duration::from_secs(5);

struct Addrs {
    reliable: SocketAddr,
    datagram: Option<SocketAddr>,
}

fn bind_server(max_message_size: Option<usize>) -> (ServerSocket, Addrs) {
    init_logger();
    let config = ServerConfig::new("127.0.0.1", 0)
        .unwrap()
        .with_max_message_size(max_message_size);
    let socket = ServerSocket::listen(&config).unwrap();
    let addrs = Addrs {
        reliable: socket.local_addr(),
        datagram: socket.datagram_addr(),
    };
    (socket, addrs)
}

fn client_config(addrs: &Addrs) -> ClientConfig {
    ClientConfig {
        server_addr: addrs.reliable,
        handshake_interval: Duration::from_millis(20),
        ..ClientConfig::default()
    }
    .with_datagrams(addrs.datagram)
}

/// Ticks every context until `done` holds or the timeout expires.
fn tick_until(
    server: &mut NetworkContext,
    clients: &mut [&mut NetworkContext],
    mut done: impl FnMut(&mut NetworkContext, &mut [&mut NetworkContext]) -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        server.tick(POLL.as_secs_f64());
        for client in clients.iter_mut() {
            client.tick(POLL.as_secs_f64());
        }
        if done(server, clients) {
            return true;
        }
        sleep(POLL);
    }
    false
}

fn poll_until<T: Transport>(transport: &mut T, mut done: impl FnMut(&mut T) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if done(transport) {
            return true;
        }
        sleep(POLL);
    }
    false
}

// ========================================================================
// Through NetworkContext
// ========================================================================

#[test]
fn client_connects_and_receives_an_id() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();

    let connected = tick_until(&mut server, &mut [&mut client], |server, clients| {
        clients[0].state() == ConnectionState::Connected && server.peers() == vec![1]
    });

    assert!(connected);
    assert_eq!(client.client_id(), Some(1));
    assert_eq!(client.peers(), vec![SERVER_ID]);
}

#[test]
fn rpc_round_trip_over_tcp() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut first = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    let mut second = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();

    let server_probe = spawn_probe(&mut server, 5, SERVER_ID).unwrap();
    let first_probe = spawn_probe(&mut first, 5, SERVER_ID).unwrap();
    let second_probe = spawn_probe(&mut second, 5, SERVER_ID).unwrap();

    assert!(tick_until(&mut server, &mut [&mut first, &mut second], |server, _| {
        server.peers().len() == 2
    }));

    first_probe.call(&mut first, "damage", (12,)).unwrap();
    let delivered = tick_until(&mut server, &mut [&mut first, &mut second], |_, _| {
        [&server_probe, &first_probe, &second_probe]
            .iter()
            .all(|probe| probe.with_state(|probe| probe.life == -12).unwrap_or(false))
    });

    assert!(delivered);
}

#[test]
fn variable_created_while_connecting_gets_the_server_value() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let _server_copy = NetworkVariable::new(&mut server, 100i64, 9, SERVER_ID, true).unwrap();

    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    // the GET is queued until the connection is up
    let client_copy = NetworkVariable::new(&mut client, 0i64, 9, SERVER_ID, true).unwrap();

    assert!(tick_until(&mut server, &mut [&mut client], |_, _| {
        client_copy.value() == 100
    }));
}

#[test]
fn client_close_is_seen_by_the_server() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    assert!(tick_until(&mut server, &mut [&mut client], |server, _| {
        server.peers().len() == 1
    }));

    client.close();

    assert!(tick_until(&mut server, &mut [], |server, _| server.peers().is_empty()));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn server_close_is_seen_by_the_client() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    assert!(tick_until(&mut server, &mut [&mut client], |_, clients| {
        clients[0].state() == ConnectionState::Connected
    }));

    server.close();

    assert!(tick_until(&mut server, &mut [&mut client], |_, clients| {
        clients[0].state() == ConnectionState::Closed
    }));
}

#[test]
fn reliable_rpc_sent_right_before_client_close_still_runs() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    let server_probe = spawn_probe(&mut server, 5, SERVER_ID).unwrap();
    let client_probe = spawn_probe(&mut client, 5, SERVER_ID).unwrap();
    assert!(tick_until(&mut server, &mut [&mut client], |server, clients| {
        server.peers().len() == 1 && clients[0].state() == ConnectionState::Connected
    }));

    client_probe.call(&mut client, "damage", (7,)).unwrap();
    client.close();
    // let the stream end reach the server before it reads anything
    sleep(Duration::from_millis(300));

    assert!(tick_until(&mut server, &mut [], |_, _| {
        server_probe
            .with_state(|probe| probe.life == -7)
            .unwrap_or(false)
    }));
    assert!(tick_until(&mut server, &mut [], |server, _| server.peers().is_empty()));
}

#[test]
fn reliable_rpc_sent_right_before_server_close_still_runs() {
    let (socket, addrs) = bind_server(None);
    let mut server = NetworkContext::new(socket, NetworkConfig::default());
    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    let server_probe = spawn_probe(&mut server, 5, SERVER_ID).unwrap();
    let client_probe = spawn_probe(&mut client, 5, SERVER_ID).unwrap();
    assert!(tick_until(&mut server, &mut [&mut client], |_, clients| {
        clients[0].state() == ConnectionState::Connected
    }));

    server_probe.call(&mut server, "open_all", ()).unwrap();
    server.close();
    sleep(Duration::from_millis(300));

    let start = Instant::now();
    while client.state() != ConnectionState::Closed && start.elapsed() < TIMEOUT {
        client.tick(POLL.as_secs_f64());
        sleep(POLL);
    }
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(
        client_probe.with_state(|probe| probe.count("open_all")).unwrap(),
        1
    );
}

#[test]
fn refused_connection_closes_the_client() {
    let (socket, addrs) = bind_server(None);
    drop(socket);

    let mut client = easycells_client::connect(client_config(&addrs), NetworkConfig::default())
        .unwrap();
    let start = Instant::now();
    while client.state() != ConnectionState::Closed && start.elapsed() < TIMEOUT {
        client.tick(POLL.as_secs_f64());
        sleep(POLL);
    }

    assert_eq!(client.state(), ConnectionState::Closed);
}

// ========================================================================
// Raw transports
// ========================================================================

#[test]
fn oversized_frame_drops_the_client() {
    let (mut server, addrs) = bind_server(Some(64));
    let mut client = ClientSocket::connect(&client_config(&addrs)).unwrap();
    assert!(poll_until(&mut client, |client| client.peers() == vec![SERVER_ID]));

    client
        .send(SERVER_ID, &[b'x'; 1024], DeliveryMode::Reliable)
        .unwrap();

    assert!(poll_until(&mut server, |server| {
        matches!(server.poll_event(), Some(TransportEvent::PeerDisconnected(1)))
    }));
}

#[test]
fn reliable_payloads_arrive_in_order() {
    let (mut server, addrs) = bind_server(None);
    let mut client = ClientSocket::connect(&client_config(&addrs)).unwrap();

    // queued before the connection is up
    for index in 0..50u8 {
        client
            .send(SERVER_ID, &[index], DeliveryMode::Reliable)
            .unwrap();
    }

    let mut received = Vec::new();
    assert!(poll_until(&mut server, |server| {
        while let Some(payload) = server.try_read(1) {
            received.push(payload[0]);
        }
        received.len() == 50
    }));
    assert_eq!(received, (0..50).collect::<Vec<u8>>());
}

#[cfg(feature = "transport_udp")]
#[test]
fn datagram_channel_completes_handshake_and_carries_payloads() {
    let (mut server, addrs) = bind_server(None);
    assert!(addrs.datagram.is_some());
    let mut client = ClientSocket::connect(&client_config(&addrs)).unwrap();

    assert!(poll_until(&mut client, |client| client.datagrams_ready()));
    assert!(client.supports(DeliveryMode::Unreliable));

    client
        .send(SERVER_ID, b"over udp", DeliveryMode::Unreliable)
        .unwrap();
    let mut payload = None;
    assert!(poll_until(&mut server, |server| {
        payload = server.try_read(1);
        payload.is_some()
    }));
    assert_eq!(payload, Some(b"over udp".to_vec()));

    server
        .send(1, b"back again", DeliveryMode::Unreliable)
        .unwrap();
    let mut reply = None;
    assert!(poll_until(&mut client, |client| {
        reply = client.try_read(SERVER_ID);
        reply.is_some()
    }));
    assert_eq!(reply, Some(b"back again".to_vec()));
}

#[cfg(feature = "transport_udp")]
#[test]
fn datagram_handshake_with_a_guessed_key_is_ignored() {
    let (mut server, addrs) = bind_server(None);
    let datagram_addr = addrs.datagram.unwrap();
    // a client that never claims its own datagram channel
    let reliable_only = Addrs {
        reliable: addrs.reliable,
        datagram: None,
    };
    let _client = ClientSocket::connect(&client_config(&reliable_only)).unwrap();
    assert!(poll_until(&mut server, |server| server.peers() == vec![1]));

    let forger = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    forger
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    forger
        .send_to(br#"["HANDSHAKE",1,0]"#, datagram_addr)
        .unwrap();
    let mut reply = [0u8; 64];
    assert!(forger.recv_from(&mut reply).is_err());

    forger
        .send_to(br#"[1,5,"to_all",[]]"#, datagram_addr)
        .unwrap();
    sleep(Duration::from_millis(200));

    assert_eq!(server.try_read(1), None);
    assert_eq!(server.peers(), vec![1]);
}

#[cfg(feature = "transport_udp")]
#[test]
fn datagram_handshake_without_a_key_is_ignored() {
    let (mut server, addrs) = bind_server(None);
    let datagram_addr = addrs.datagram.unwrap();
    let mut client = ClientSocket::connect(&client_config(&addrs)).unwrap();
    assert!(poll_until(&mut client, |client| client.datagrams_ready()));

    let forger = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    forger
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    forger.send_to(br#"["HANDSHAKE",1]"#, datagram_addr).unwrap();
    let mut reply = [0u8; 64];
    assert!(forger.recv_from(&mut reply).is_err());

    // the real client keeps its channel
    client
        .send(SERVER_ID, b"still mine", DeliveryMode::Unreliable)
        .unwrap();
    let mut payload = None;
    assert!(poll_until(&mut server, |server| {
        payload = server.try_read(1);
        payload.is_some()
    }));
    assert_eq!(payload, Some(b"still mine".to_vec()));
}

#[test]
fn server_without_datagrams_falls_back_to_reliable() {
    init_logger();
    let config = ServerConfig::new("127.0.0.1", 0)
        .unwrap()
        .with_datagrams(None);
    let mut server = ServerSocket::listen(&config).unwrap();
    assert!(!server.supports(DeliveryMode::Unreliable));

    let addrs = Addrs {
        reliable: server.local_addr(),
        datagram: None,
    };
    let mut client = ClientSocket::connect(&client_config(&addrs)).unwrap();
    assert!(poll_until(&mut server, |server| server.peers() == vec![1]));

    server
        .send(1, b"fallback", DeliveryMode::Unreliable)
        .unwrap();
    let mut payload = None;
    assert!(poll_until(&mut client, |client| {
        payload = client.try_read(SERVER_ID);
        payload.is_some()
    }));
    assert_eq!(payload, Some(b"fallback".to_vec()));
}
