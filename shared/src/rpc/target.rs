use super::{descriptor::RpcDescriptor, error::RpcError};
use crate::{
    context::NetworkContext,
    messages::args::Args,
    types::{ClientId, NetId},
};

/// An RPC-bearing object as seen by the registry and the dispatcher.
pub trait RpcTarget {
    fn identifier(&self) -> NetId;

    fn owner(&self) -> ClientId;

    fn descriptor(&self, method: &str) -> Option<RpcDescriptor>;

    /// Runs the body of `method` on behalf of `sender` with the object's
    /// `executing_from_network` flag raised. Ownership has already been
    /// checked by the caller.
    fn execute(
        &mut self,
        ctx: &mut NetworkContext,
        method: &str,
        args: &Args,
        sender: ClientId,
    ) -> Result<(), RpcError>;
}
