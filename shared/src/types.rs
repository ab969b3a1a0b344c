/// Connection-scoped peer id. The server is always [`SERVER_ID`], clients
/// are numbered from 1 in accept order and never reused within a session.
pub type ClientId = u64;
/// Identifier of a distributed object (component or variable).
pub type NetId = u64;

pub const SERVER_ID: ClientId = 0;
/// Routes RPCs that are not bound to any instance.
pub const STATIC_IDENTIFIER: NetId = 0;

// keeps random ids exactly representable as JSON doubles
const MAX_RANDOM_IDENTIFIER: NetId = (1 << 53) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }

    pub fn is_server(self) -> bool {
        self == HostType::Server
    }
}

/// Picks a random, non-static object identifier. Game code uses this when
/// any peer may spawn objects and sequential ids would collide.
pub fn random_identifier() -> NetId {
    fastrand::u64(1..=MAX_RANDOM_IDENTIFIER)
}
