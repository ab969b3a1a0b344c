use super::descriptor::SendTo;
use crate::types::{ClientId, HostType, SERVER_ID};

/// Peers a packet is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipients {
    Nobody,
    Server,
    AllClients,
    AllClientsExcept(ClientId),
    Client(ClientId),
}

/// How the calling process runs the body of a locally invoked RPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalExecution {
    /// Body runs elsewhere; the network delivers it.
    Skip,
    /// Body runs now as a plain local call.
    Direct,
    /// Body runs now as if it had arrived from the server itself.
    AsInbound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalCallPlan {
    pub recipients: Recipients,
    pub execution: LocalExecution,
}

/// Routing of an RPC invoked by game code (not from the network).
pub fn plan_local_call(host: HostType, send_to: SendTo, owner: ClientId) -> LocalCallPlan {
    if host == HostType::Client {
        return LocalCallPlan {
            recipients: Recipients::Server,
            execution: LocalExecution::Skip,
        };
    }

    let (recipients, execution) = match send_to {
        SendTo::All => (Recipients::AllClients, LocalExecution::Direct),
        SendTo::Clients | SendTo::NotMe => (Recipients::AllClients, LocalExecution::Skip),
        SendTo::Server => (Recipients::Nobody, LocalExecution::AsInbound),
        SendTo::Owner if owner == SERVER_ID => (Recipients::Nobody, LocalExecution::Skip),
        SendTo::Owner => (Recipients::Client(owner), LocalExecution::Skip),
    };
    LocalCallPlan {
        recipients,
        execution,
    }
}

/// Where the server forwards an inbound RPC it accepted from `sender`.
pub fn plan_relay(send_to: SendTo, owner: ClientId, sender: ClientId) -> Recipients {
    match send_to {
        SendTo::All | SendTo::Clients => Recipients::AllClients,
        SendTo::NotMe => Recipients::AllClientsExcept(sender),
        SendTo::Owner if owner == SERVER_ID => Recipients::Nobody,
        SendTo::Owner => Recipients::Client(owner),
        SendTo::Server => Recipients::Nobody,
    }
}
