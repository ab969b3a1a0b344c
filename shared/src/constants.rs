pub const OP_RPC: u64 = 1;
pub const OP_VAR: u64 = 2;

pub const VAR_SET: u64 = 1;
pub const VAR_GET: u64 = 2;

/// Sentinel a client sends over the datagram channel to register its address.
pub const HANDSHAKE_SENTINEL: &str = "HANDSHAKE";
/// Sentinel of the per-connection key the server hands out over the
/// reliable channel. Only the holder of the key can claim the datagram
/// channel of that connection.
pub const DATAGRAM_KEY_SENTINEL: &str = "DATAGRAM_KEY";
/// Sentinel either side sends before tearing a connection down.
pub const CLOSE_SENTINEL: &str = "close";

/// Size of the big-endian length header in front of every reliable frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const MAX_DATAGRAM_SIZE: usize = 65_535;
