use easycells_shared::{
    ClientId, DeliveryMode, DispatchError, NetworkConfig, NetworkError, NetworkVariable,
    ObjectKind, RegistryError, VarOp, SERVER_ID,
};
use easycells_test::{var_sends, TestNetwork};

type Copies = Vec<(ClientId, NetworkVariable<i64>)>;

/// Creates variable `var_id` on the server with `value`, then on every
/// client with a stale initial value of 0, and lets the GET replies land.
fn create_everywhere(
    network: &mut TestNetwork,
    var_id: u64,
    value: i64,
    owner: ClientId,
    require_owner: bool,
) -> Copies {
    let mut copies = vec![(
        SERVER_ID,
        NetworkVariable::new(network.server(), value, var_id, owner, require_owner).unwrap(),
    )];
    for client_id in network.client_ids() {
        let variable =
            NetworkVariable::new(network.client(client_id), 0, var_id, owner, require_owner)
                .unwrap();
        copies.push((client_id, variable));
    }
    network.pump();
    network.hub().take_sent();
    copies
}

fn values(copies: &Copies) -> Vec<(ClientId, i64)> {
    copies
        .iter()
        .map(|(peer, variable)| (*peer, variable.value()))
        .collect()
}

// ========================================================================
// Late join
// ========================================================================

#[test]
fn new_client_requests_value_and_adopts_server_reply() {
    let mut network = TestNetwork::new(0);
    let server_copy = NetworkVariable::new(network.server(), 100i64, 9, SERVER_ID, true).unwrap();

    let client_id = network.connect_client();
    let client_copy = NetworkVariable::new(network.client(client_id), 0i64, 9, SERVER_ID, true)
        .unwrap();

    // the request leaves right away, before anyone ticks
    let sent = network.hub().sent();
    let gets = var_sends(&sent, VarOp::Get);
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].from, client_id);
    assert_eq!(gets[0].to, SERVER_ID);
    assert_eq!(client_copy.value(), 0);

    let pumped = network.pump();

    assert!(pumped.is_clean());
    assert_eq!(client_copy.value(), 100);
    assert_eq!(server_copy.value(), 100);
    let sent = network.hub().sent();
    let replies = var_sends(&sent, VarOp::Set);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to, client_id);
}

#[test]
fn server_side_creation_sends_nothing() {
    let mut network = TestNetwork::new(2);
    NetworkVariable::new(network.server(), 1i64, 9, SERVER_ID, true).unwrap();

    assert!(network.hub().sent().is_empty());
}

// ========================================================================
// Writes
// ========================================================================

#[test]
fn server_write_reaches_every_client() {
    let mut network = TestNetwork::new(2);
    let copies = create_everywhere(&mut network, 9, 100, SERVER_ID, true);

    copies[0].1.set(network.server(), 250).unwrap();
    network.pump();

    assert_eq!(values(&copies), vec![(0, 250), (1, 250), (2, 250)]);
}

#[test]
fn owner_write_is_applied_locally_first_and_relayed_to_others() {
    let mut network = TestNetwork::new(3);
    let copies = create_everywhere(&mut network, 9, 100, 1, true);

    copies[1].1.set(network.client(1), 7).unwrap();
    assert_eq!(copies[1].1.value(), 7);
    assert_eq!(copies[0].1.value(), 100);

    let pumped = network.pump();

    assert!(pumped.is_clean());
    assert_eq!(values(&copies), vec![(0, 7), (1, 7), (2, 7), (3, 7)]);
    let sent = network.hub().sent();
    let relays: Vec<ClientId> = var_sends(&sent, VarOp::Set)
        .iter()
        .filter(|frame| frame.from == SERVER_ID)
        .map(|frame| frame.to)
        .collect();
    assert_eq!(relays, vec![2, 3]);
}

#[test]
fn non_owner_write_is_rejected_silently() {
    let mut network = TestNetwork::new(2);
    let copies = create_everywhere(&mut network, 9, 100, 1, true);

    copies[2].1.set(network.client(2), 666).unwrap();
    let pumped = network.pump();

    assert_eq!(
        pumped.server_errors,
        vec![NetworkError::Dispatch(DispatchError::OwnershipViolation {
            sender: 2,
            target: 9,
            owner: 1,
        })]
    );
    // the writer keeps its optimistic value; nobody else sees it
    assert_eq!(values(&copies), vec![(0, 100), (1, 100), (2, 666)]);
    let sent = network.hub().sent();
    assert!(var_sends(&sent, VarOp::Set)
        .iter()
        .all(|frame| frame.from != SERVER_ID));
}

#[test]
fn rejected_write_is_rolled_back_when_configured() {
    let config = NetworkConfig {
        rollback_rejected_writes: true,
    };
    let mut network = TestNetwork::with_config(2, config);
    let copies = create_everywhere(&mut network, 9, 100, 1, true);

    copies[2].1.set(network.client(2), 666).unwrap();
    let pumped = network.pump();

    assert_eq!(pumped.server_errors.len(), 1);
    assert_eq!(values(&copies), vec![(0, 100), (1, 100), (2, 100)]);
}

#[test]
fn open_variable_accepts_any_writer() {
    let mut network = TestNetwork::new(2);
    let copies = create_everywhere(&mut network, 9, 100, SERVER_ID, false);

    copies[2].1.set(network.client(2), 3).unwrap();
    let pumped = network.pump();

    assert!(pumped.is_clean());
    assert_eq!(values(&copies), vec![(0, 3), (1, 3), (2, 3)]);
}

#[test]
fn repeated_identical_write_is_relayed_once() {
    let mut network = TestNetwork::new(2);
    let copies = create_everywhere(&mut network, 9, 100, 1, true);

    copies[1].1.set(network.client(1), 42).unwrap();
    copies[1].1.set(network.client(1), 42).unwrap();
    network.pump();

    assert_eq!(values(&copies), vec![(0, 42), (1, 42), (2, 42)]);
    let sent = network.hub().sent();
    let relays = var_sends(&sent, VarOp::Set)
        .iter()
        .filter(|frame| frame.from == SERVER_ID)
        .count();
    assert_eq!(relays, 1);
}

#[test]
fn variable_traffic_is_always_reliable() {
    let mut network = TestNetwork::new(2);
    let copies = create_everywhere(&mut network, 9, 100, 1, true);

    copies[1].1.set(network.client(1), 1).unwrap();
    copies[0].1.set(network.server(), 2).unwrap();
    network.pump();

    let sent = network.hub().sent();
    assert!(!sent.is_empty());
    assert!(sent
        .iter()
        .all(|frame| frame.delivery == DeliveryMode::Reliable));
}

#[test]
fn structured_values_replicate() {
    let mut network = TestNetwork::new(1);
    let server_copy =
        NetworkVariable::new(network.server(), vec!["ana".to_string()], 4, SERVER_ID, true)
            .unwrap();
    let client_copy =
        NetworkVariable::new(network.client(1), Vec::<String>::new(), 4, SERVER_ID, true)
            .unwrap();
    network.pump();
    assert_eq!(client_copy.value(), vec!["ana".to_string()]);

    server_copy
        .set(network.server(), vec!["ana".to_string(), "bo".to_string()])
        .unwrap();
    network.pump();
    assert_eq!(client_copy.with(Vec::len), 2);
}

#[test]
fn mistyped_write_is_malformed() {
    let mut network = TestNetwork::new(1);
    let _server_copy = NetworkVariable::new(network.server(), 1i64, 9, SERVER_ID, false).unwrap();
    let client_copy =
        NetworkVariable::new(network.client(1), "text".to_string(), 9, SERVER_ID, false).unwrap();
    let pumped = network.pump();
    // the GET reply carries an integer the client cannot read as text
    match &pumped.client_errors[..] {
        [(1, NetworkError::Dispatch(DispatchError::MalformedPacket { .. }))] => {}
        other => panic!("Expected one MalformedPacket error, got {:?}", other),
    }

    client_copy.set(network.client(1), "other".to_string()).unwrap();
    let pumped = network.pump();
    match &pumped.server_errors[..] {
        [NetworkError::Dispatch(DispatchError::MalformedPacket { sender: 1, .. })] => {}
        other => panic!("Expected one MalformedPacket error, got {:?}", other),
    }
}

// ========================================================================
// Lifecycle
// ========================================================================

#[test]
fn destroyed_variable_drops_packets() {
    let mut network = TestNetwork::new(1);
    let mut copies = create_everywhere(&mut network, 9, 100, SERVER_ID, false);

    let (_, server_copy) = copies.remove(0);
    server_copy.destroy(network.server());
    assert!(!network.server().registry().contains(ObjectKind::Variable, 9));

    copies[0].1.set(network.client(1), 5).unwrap();
    let pumped = network.pump();

    assert_eq!(
        pumped.server_errors,
        vec![NetworkError::Dispatch(DispatchError::UnknownTarget {
            sender: 1,
            target: 9,
        })]
    );
}

#[test]
fn dropping_every_copy_frees_the_identifier() {
    let mut network = TestNetwork::new(0);
    let first = NetworkVariable::new(network.server(), 1i64, 9, SERVER_ID, true).unwrap();
    let second = first.clone();

    drop(first);
    assert!(network.server().registry().contains(ObjectKind::Variable, 9));
    drop(second);
    assert!(!network.server().registry().contains(ObjectKind::Variable, 9));

    NetworkVariable::new(network.server(), 2i64, 9, SERVER_ID, true).unwrap();
}

#[test]
fn live_identifier_cannot_be_reused() {
    let mut network = TestNetwork::new(0);
    let _first = NetworkVariable::new(network.server(), 1i64, 9, SERVER_ID, true).unwrap();

    let result = NetworkVariable::new(network.server(), 2i64, 9, SERVER_ID, true);
    match result {
        Err(RegistryError::IdentifierInUse {
            kind: ObjectKind::Variable,
            identifier: 9,
        }) => {}
        _ => panic!("Expected IdentifierInUse error"),
    }
}
