use std::{cell::RefCell, rc::Rc};

use easycells_shared::{
    ConnectionState, DispatchError, NetworkError, TransportError, SERVER_ID,
};
use easycells_test::{spawn_probe, TestNetwork};

#[test]
fn connecting_client_learns_its_id() {
    let mut network = TestNetwork::new(0);
    let client_id = network.connect_client();
    assert_eq!(network.client(client_id).state(), ConnectionState::Connecting);
    assert_eq!(network.client(client_id).client_id(), None);

    let pumped = network.pump();

    assert_eq!(pumped.server_connections, vec![client_id]);
    assert_eq!(pumped.client_connections, vec![client_id]);
    assert_eq!(network.client(client_id).client_id(), Some(client_id));
    assert_eq!(network.client(client_id).state(), ConnectionState::Connected);
    assert_eq!(network.client(client_id).peers(), vec![SERVER_ID]);
    assert_eq!(network.server().peers(), vec![client_id]);
    assert_eq!(network.server().client_id(), Some(SERVER_ID));
}

#[test]
fn connect_callbacks_fire_on_both_sides() {
    let mut network = TestNetwork::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let server_seen = seen.clone();
    network.server().on_connect(move |_ctx, client_id| {
        server_seen.borrow_mut().push(("server", client_id));
    });
    let client_id = network.connect_client();
    let client_seen = seen.clone();
    network.client(client_id).on_connect(move |_ctx, assigned| {
        client_seen.borrow_mut().push(("client", assigned));
    });

    network.pump();

    assert_eq!(*seen.borrow(), vec![("server", 1), ("client", 1)]);
}

#[test]
fn dropped_connection_is_reported_on_both_sides() {
    let mut network = TestNetwork::new(2);

    network.hub().disconnect(2);
    let pumped = network.pump();

    assert_eq!(pumped.server_disconnections, vec![2]);
    assert_eq!(pumped.client_disconnections, vec![SERVER_ID]);
    assert_eq!(network.server().peers(), vec![1]);
    assert_eq!(network.client(2).state(), ConnectionState::Closed);
    assert_eq!(network.client(1).state(), ConnectionState::Connected);
}

#[test]
fn closing_a_client_disconnects_it_once() {
    let mut network = TestNetwork::new(2);

    network.client(1).close();
    network.client(1).close();
    let pumped = network.pump();

    assert_eq!(pumped.server_disconnections, vec![1]);
    assert_eq!(network.client(1).state(), ConnectionState::Closed);
    assert_eq!(network.hub().connected_clients(), vec![2]);
}

#[test]
fn closing_the_server_disconnects_every_client() {
    let mut network = TestNetwork::new(2);

    network.server().close();
    let pumped = network.pump();

    assert_eq!(pumped.client_disconnections, vec![SERVER_ID, SERVER_ID]);
    assert_eq!(network.server().state(), ConnectionState::Closed);
    assert!(network.hub().connected_clients().is_empty());
}

#[test]
fn sending_after_close_is_reported_not_raised() {
    let mut network = TestNetwork::new(1);
    let probe = spawn_probe(network.client(1), 5, 1).unwrap();

    network.client(1).close();
    probe.call(network.client(1), "to_all", ()).unwrap();
    let pumped = network.pump();

    assert_eq!(
        pumped.client_errors,
        vec![(1, NetworkError::Transport(TransportError::Closed))]
    );
}

#[test]
fn messages_for_a_dropped_client_are_discarded() {
    let mut network = TestNetwork::new(2);
    let probe = spawn_probe(network.server(), 5, SERVER_ID).unwrap();
    let remaining = spawn_probe(network.client(2), 5, SERVER_ID).unwrap();

    network.hub().disconnect(1);
    probe.call(network.server(), "open_all", ()).unwrap();
    let pumped = network.pump();

    assert!(pumped.is_clean());
    assert_eq!(network.hub().pending_for(1), 0);
    assert_eq!(remaining.with_state(|probe| probe.count("open_all")).unwrap(), 1);
}

#[test]
fn garbage_does_not_close_the_connection() {
    let mut network = TestNetwork::new(1);
    let probe = spawn_probe(network.server(), 5, SERVER_ID).unwrap();
    let client_probe = spawn_probe(network.client(1), 5, SERVER_ID).unwrap();

    // a packet for an object only the server knows
    spawn_probe(network.server(), 6, SERVER_ID)
        .unwrap()
        .call(network.server(), "open_all", ())
        .unwrap();
    let pumped = network.pump();
    assert_eq!(
        pumped.client_errors,
        vec![(
            1,
            NetworkError::Dispatch(DispatchError::UnknownTarget {
                sender: SERVER_ID,
                target: 6,
            })
        )]
    );

    probe.call(network.server(), "open_all", ()).unwrap();
    network.pump();
    assert_eq!(
        client_probe.with_state(|probe| probe.count("open_all")).unwrap(),
        1
    );
}
