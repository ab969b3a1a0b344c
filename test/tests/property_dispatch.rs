/// Property tests for the packet codec and the server's authority rule.
use proptest::prelude::*;
use serde_json::Value;

use easycells_shared::{
    encode_frame, Args, DispatchError, FrameDecoder, NetworkError, Packet, VarOp, WireMessage,
    SERVER_ID,
};
use easycells_test::{spawn_probe, TestNetwork};

const CLIENTS: u64 = 4;
const OWNER_ONLY: [&str; 5] = ["to_all", "to_server", "to_clients", "to_owner", "to_not_me"];

fn arg_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn args_strategy() -> impl Strategy<Value = Args> {
    prop::collection::vec(arg_value(), 0..6).prop_map(Args::from_values)
}

fn packet_strategy() -> impl Strategy<Value = Packet> {
    let identifier = 0u64..(1 << 53);
    prop_oneof![
        (identifier.clone(), "[a-zA-Z_]{1,24}", args_strategy())
            .prop_map(|(target, method, args)| Packet::rpc(target, method, args)),
        (
            identifier,
            prop_oneof![Just(VarOp::Set), Just(VarOp::Get)],
            args_strategy()
        )
            .prop_map(|(target, op, args)| Packet::var(target, op, args)),
    ]
}

proptest! {
    /// Encoding then decoding any packet gives back the same packet
    #[test]
    fn prop_packet_round_trip(packet in packet_strategy()) {
        let bytes = packet.encode().unwrap();
        let decoded = WireMessage::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, WireMessage::Packet(packet));
    }

    /// Frames survive arbitrary splitting of the byte stream
    #[test]
    fn prop_frames_survive_any_split(
        packets in prop::collection::vec(packet_strategy(), 1..5),
        chunk in 1usize..17,
    ) {
        let mut stream = Vec::new();
        for packet in &packets {
            stream.extend(encode_frame(&packet.encode().unwrap()).unwrap());
        }

        let mut decoder = FrameDecoder::new(None);
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            decoder.push(piece);
            while let Some(frame) = decoder.next_frame().unwrap() {
                decoded.push(WireMessage::decode(&frame).unwrap());
            }
        }

        let expected: Vec<WireMessage> = packets.into_iter().map(WireMessage::Packet).collect();
        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(decoder.buffered(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// An owner-only RPC from a client runs only when the client owns the
    /// object; otherwise it runs nowhere and the server reports the denial
    #[test]
    fn prop_owner_only_calls_respect_ownership(
        owner in 0..=CLIENTS,
        sender in 1..=CLIENTS,
        method in prop::sample::select(OWNER_ONLY.to_vec()),
    ) {
        let mut network = TestNetwork::new(CLIENTS as usize);
        let mut copies = vec![spawn_probe(network.server(), 5, owner).unwrap()];
        for client_id in network.client_ids() {
            copies.push(spawn_probe(network.client(client_id), 5, owner).unwrap());
        }

        copies[sender as usize].call(network.client(sender), method, ()).unwrap();
        let pumped = network.pump();

        let executions: usize = copies
            .iter()
            .map(|copy| copy.with_state(|probe| probe.count(method)).unwrap())
            .sum();
        let on_server = copies[0].with_state(|probe| probe.count(method)).unwrap();

        if sender == owner {
            prop_assert!(pumped.is_clean());
            prop_assert_eq!(on_server, 1);
        } else {
            prop_assert_eq!(executions, 0);
            prop_assert_eq!(
                pumped.server_errors,
                vec![NetworkError::Dispatch(DispatchError::OwnershipViolation {
                    sender,
                    target: 5,
                    owner,
                })]
            );
        }
    }

    /// An open ALL call from any peer runs exactly once on every peer
    #[test]
    fn prop_open_all_runs_once_everywhere(caller in 0..=CLIENTS) {
        let mut network = TestNetwork::new(CLIENTS as usize);
        let mut copies = vec![spawn_probe(network.server(), 5, SERVER_ID).unwrap()];
        for client_id in network.client_ids() {
            copies.push(spawn_probe(network.client(client_id), 5, SERVER_ID).unwrap());
        }

        let ctx = if caller == SERVER_ID {
            network.server()
        } else {
            network.client(caller)
        };
        copies[caller as usize].call(ctx, "open_all", ()).unwrap();
        network.pump();

        for copy in &copies {
            prop_assert_eq!(copy.with_state(|probe| probe.count("open_all")).unwrap(), 1);
        }
    }
}
