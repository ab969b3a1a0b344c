//! # EasyCells Shared
//! Replicated RPC routing, network variables and the object registry shared
//! between easycells-server & easycells-client.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod components;
mod constants;
mod context;
mod error;
mod events;
mod manager;
mod messages;
mod registry;
mod rpc;
mod time;
mod transport;
mod types;
mod variable;

pub use components::{NetworkTransform, SyncSettings, Transform, TransformState};
pub use constants::{
    CLOSE_SENTINEL, DATAGRAM_KEY_SENTINEL, HANDSHAKE_SENTINEL, LENGTH_PREFIX_SIZE,
    MAX_DATAGRAM_SIZE, OP_RPC, OP_VAR, VAR_GET, VAR_SET,
};
pub use context::NetworkContext;
pub use error::NetworkError;
pub use events::{ConnectEvent, DisconnectEvent, ErrorEvent, NetworkEvent, NetworkEvents};
pub use manager::{ConnectionState, NetworkConfig, NetworkManager};
pub use messages::{
    args::Args,
    error::{ArgsError, WireError},
    framing::{encode_frame, FrameDecoder},
    packet::{Packet, VarOp},
    wire_message::{DatagramTicket, WireMessage},
};
pub use registry::{NetworkObject, ObjectKind, ObjectRegistry, RegistryError};
pub use rpc::{
    component::{ComponentCall, ComponentHandle, NetworkComponent, WeakComponentHandle},
    error::{DispatchError, RpcError},
    execution_guard::ExecutionGuard,
    routing::{plan_local_call, plan_relay, LocalCallPlan, LocalExecution, Recipients},
    rpc_table::RpcTable,
    static_rpcs::{StaticCall, StaticRpcs},
    target::RpcTarget,
    RpcDescriptor, SendTo,
};
pub use time::{GameTime, Scheduler, TaskId};
pub use transport::{
    error::TransportError,
    local::{LocalHub, LocalTransport, SentFrame},
    DeliveryMode, Transport, TransportEvent,
};
pub use types::{random_identifier, ClientId, HostType, NetId, SERVER_ID, STATIC_IDENTIFIER};
pub use variable::network_variable::{NetworkVariable, VariableSlot};
