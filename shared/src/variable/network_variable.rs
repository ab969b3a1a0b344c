use std::{cell::RefCell, rc::Rc};

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    context::NetworkContext,
    messages::{
        args::Args,
        error::ArgsError,
        packet::{Packet, VarOp},
    },
    registry::{NetworkObject, RegistryError},
    rpc::{error::RpcError, routing::Recipients},
    transport::DeliveryMode,
    types::{ClientId, NetId},
};

/// Type-erased view of a variable used by the registry and dispatcher.
pub trait VariableSlot {
    fn var_id(&self) -> NetId;

    fn owner(&self) -> ClientId;

    fn require_owner(&self) -> bool;

    /// The current value as a one-element argument list.
    fn current_args(&self) -> Result<Args, ArgsError>;

    /// Overwrites the value from a SET payload. Returns whether it changed.
    fn apply(&mut self, args: &Args) -> Result<bool, ArgsError>;
}

struct VariableCell<T> {
    var_id: NetId,
    owner: ClientId,
    require_owner: bool,
    value: T,
}

impl<T> VariableSlot for VariableCell<T>
where
    T: Serialize + DeserializeOwned + PartialEq,
{
    fn var_id(&self) -> NetId {
        self.var_id
    }

    fn owner(&self) -> ClientId {
        self.owner
    }

    fn require_owner(&self) -> bool {
        self.require_owner
    }

    fn current_args(&self) -> Result<Args, ArgsError> {
        Args::encode(&(&self.value,))
    }

    fn apply(&mut self, args: &Args) -> Result<bool, ArgsError> {
        let (value,): (T,) = args.decode()?;
        let changed = value != self.value;
        self.value = value;
        Ok(changed)
    }
}

/// Replicated value with owner-gated writes.
///
/// Writes are applied locally first and then sent: the server broadcasts to
/// every client, a client forwards to the server which validates and relays.
/// A variable created on a client asks the server for the current value
/// right away; until the reply arrives the local value is the initial one.
/// Variable traffic always uses the reliable channel.
pub struct NetworkVariable<T> {
    var_id: NetId,
    owner: ClientId,
    require_owner: bool,
    inner: Rc<RefCell<VariableCell<T>>>,
}

impl<T> Clone for NetworkVariable<T> {
    fn clone(&self) -> Self {
        Self {
            var_id: self.var_id,
            owner: self.owner,
            require_owner: self.require_owner,
            inner: self.inner.clone(),
        }
    }
}

impl<T> NetworkVariable<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    pub fn new(
        ctx: &mut NetworkContext,
        value: T,
        var_id: NetId,
        owner: ClientId,
        require_owner: bool,
    ) -> Result<Self, RegistryError> {
        let inner = Rc::new(RefCell::new(VariableCell {
            var_id,
            owner,
            require_owner,
            value,
        }));

        let slot: Rc<RefCell<dyn VariableSlot>> = inner.clone();
        ctx.on_object_registered(NetworkObject::Variable(slot))?;

        if !ctx.is_server() {
            debug!("Requesting current value of variable {}", var_id);
            let packet = Packet::var(var_id, VarOp::Get, Args::empty());
            ctx.route_packet(Recipients::Server, &packet, DeliveryMode::Reliable);
        }

        Ok(Self {
            var_id,
            owner,
            require_owner,
            inner,
        })
    }

    pub fn var_id(&self) -> NetId {
        self.var_id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn require_owner(&self) -> bool {
        self.require_owner
    }

    pub fn value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    pub fn set(&self, ctx: &mut NetworkContext, value: T) -> Result<(), RpcError> {
        let args = Args::encode(&(&value,))?;
        self.inner
            .try_borrow_mut()
            .map_err(|_| RpcError::Busy {
                identifier: self.var_id,
            })?
            .value = value;

        let recipients = if ctx.is_server() {
            Recipients::AllClients
        } else {
            Recipients::Server
        };
        let packet = Packet::var(self.var_id, VarOp::Set, args);
        ctx.route_packet(recipients, &packet, DeliveryMode::Reliable);
        Ok(())
    }

    pub fn destroy(self, ctx: &mut NetworkContext) {
        let slot: Rc<RefCell<dyn VariableSlot>> = self.inner;
        ctx.on_object_destroyed(self.var_id, NetworkObject::Variable(slot));
    }
}
