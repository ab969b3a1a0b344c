use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use serde::Serialize;

use super::{
    error::RpcError,
    execution_guard::ExecutionGuard,
    routing::{plan_local_call, LocalExecution, Recipients},
    rpc_table::{RpcEntry, RpcTable},
    target::RpcTarget,
    RpcDescriptor,
};
use crate::{
    context::NetworkContext,
    messages::{args::Args, packet::Packet},
    registry::{NetworkObject, RegistryError},
    types::{ClientId, NetId, SERVER_ID},
};

/// A distributed object with an RPC table and user state `S`.
pub struct NetworkComponent<S> {
    identifier: NetId,
    owner: ClientId,
    executing_from_network: Rc<Cell<bool>>,
    rpcs: Rc<RpcTable<S>>,
    state: S,
}

impl<S: 'static> NetworkComponent<S> {
    fn parts(&mut self) -> Parts<'_, S> {
        Parts {
            identifier: self.identifier,
            owner: self.owner,
            flag: &self.executing_from_network,
            rpcs: &self.rpcs,
            state: &mut self.state,
        }
    }
}

impl<S: 'static> RpcTarget for NetworkComponent<S> {
    fn identifier(&self) -> NetId {
        self.identifier
    }

    fn owner(&self) -> ClientId {
        self.owner
    }

    fn descriptor(&self, method: &str) -> Option<RpcDescriptor> {
        self.rpcs.descriptor(method)
    }

    fn execute(
        &mut self,
        ctx: &mut NetworkContext,
        method: &str,
        args: &Args,
        sender: ClientId,
    ) -> Result<(), RpcError> {
        let parts = self.parts();
        let entry = parts.entry(method)?;
        let _guard = ExecutionGuard::enter(parts.flag);
        run_body(ctx, parts, &entry, args, sender)
    }
}

// Borrowed view over a component's fields, so the same dispatch code serves
// both the handle and a running handler's nested calls.
struct Parts<'a, S> {
    identifier: NetId,
    owner: ClientId,
    flag: &'a Rc<Cell<bool>>,
    rpcs: &'a Rc<RpcTable<S>>,
    state: &'a mut S,
}

impl<'a, S: 'static> Parts<'a, S> {
    fn entry(&self, method: &str) -> Result<RpcEntry<S>, RpcError> {
        self.rpcs.entry(method).ok_or_else(|| RpcError::UnknownMethod {
            identifier: self.identifier,
            method: method.to_string(),
        })
    }
}

fn invoke<S: 'static>(
    ctx: &mut NetworkContext,
    parts: Parts<'_, S>,
    method: &str,
    args: Args,
    nested_sender: ClientId,
) -> Result<(), RpcError> {
    let entry = parts.entry(method)?;

    if parts.flag.get() {
        return run_body(ctx, parts, &entry, &args, nested_sender);
    }

    let descriptor = entry.descriptor;
    let plan = plan_local_call(ctx.host_type(), descriptor.send_to, parts.owner);
    let packet = Packet::rpc(parts.identifier, method, args.clone());
    ctx.route_packet(plan.recipients, &packet, descriptor.delivery);

    match plan.execution {
        LocalExecution::Skip => Ok(()),
        LocalExecution::Direct => run_body(ctx, parts, &entry, &args, SERVER_ID),
        LocalExecution::AsInbound => {
            let _guard = ExecutionGuard::enter(parts.flag);
            run_body(ctx, parts, &entry, &args, SERVER_ID)
        }
    }
}

fn run_body<S: 'static>(
    ctx: &mut NetworkContext,
    parts: Parts<'_, S>,
    entry: &RpcEntry<S>,
    args: &Args,
    sender: ClientId,
) -> Result<(), RpcError> {
    let mut call = ComponentCall {
        ctx,
        identifier: parts.identifier,
        owner: parts.owner,
        sender,
        flag: parts.flag,
        rpcs: parts.rpcs,
        state: parts.state,
    };
    (entry.handler)(&mut call, args)
}

/// Handed to an RPC body while it runs.
pub struct ComponentCall<'a, S> {
    ctx: &'a mut NetworkContext,
    identifier: NetId,
    owner: ClientId,
    sender: ClientId,
    flag: &'a Rc<Cell<bool>>,
    rpcs: &'a Rc<RpcTable<S>>,
    state: &'a mut S,
}

impl<'a, S: 'static> ComponentCall<'a, S> {
    pub fn identifier(&self) -> NetId {
        self.identifier
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    /// Peer the call came from. Local server execution reports the server.
    pub fn sender(&self) -> ClientId {
        self.sender
    }

    pub fn state(&self) -> &S {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut *self.state
    }

    pub fn context(&mut self) -> &mut NetworkContext {
        &mut *self.ctx
    }

    pub fn is_executing_from_network(&self) -> bool {
        self.flag.get()
    }

    /// Invokes another RPC on this same object. Inside a network-driven
    /// body it runs directly; otherwise it is routed like any local call.
    pub fn call<A: Serialize>(&mut self, method: &str, args: A) -> Result<(), RpcError> {
        let args = Args::encode(&args)?;
        let parts = Parts {
            identifier: self.identifier,
            owner: self.owner,
            flag: self.flag,
            rpcs: self.rpcs,
            state: &mut *self.state,
        };
        invoke(&mut *self.ctx, parts, method, args, self.sender)
    }
}

/// Shared handle to a registered component. The registry only keeps a weak
/// reference, so the component lives exactly as long as its handles.
pub struct ComponentHandle<S> {
    identifier: NetId,
    owner: ClientId,
    flag: Rc<Cell<bool>>,
    rpcs: Rc<RpcTable<S>>,
    inner: Rc<RefCell<NetworkComponent<S>>>,
}

impl<S> Clone for ComponentHandle<S> {
    fn clone(&self) -> Self {
        Self {
            identifier: self.identifier,
            owner: self.owner,
            flag: self.flag.clone(),
            rpcs: self.rpcs.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> ComponentHandle<S> {
    /// Creates the component and registers it under `identifier`.
    pub fn spawn(
        ctx: &mut NetworkContext,
        identifier: NetId,
        owner: ClientId,
        rpcs: Rc<RpcTable<S>>,
        state: S,
    ) -> Result<Self, RegistryError> {
        let flag = Rc::new(Cell::new(false));
        let inner = Rc::new(RefCell::new(NetworkComponent {
            identifier,
            owner,
            executing_from_network: flag.clone(),
            rpcs: rpcs.clone(),
            state,
        }));

        let target: Rc<RefCell<dyn RpcTarget>> = inner.clone();
        ctx.on_object_registered(NetworkObject::Component(target))?;

        Ok(Self {
            identifier,
            owner,
            flag,
            rpcs,
            inner,
        })
    }

    pub fn identifier(&self) -> NetId {
        self.identifier
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn rpcs(&self) -> &Rc<RpcTable<S>> {
        &self.rpcs
    }

    pub fn is_executing_from_network(&self) -> bool {
        self.flag.get()
    }

    /// Invokes `method` from game code.
    pub fn call<A: Serialize>(
        &self,
        ctx: &mut NetworkContext,
        method: &str,
        args: A,
    ) -> Result<(), RpcError> {
        let args = Args::encode(&args)?;
        let mut component = self.inner.try_borrow_mut().map_err(|_| RpcError::Busy {
            identifier: self.identifier,
        })?;
        let parts = component.parts();
        invoke(ctx, parts, method, args, SERVER_ID)
    }

    /// Server only: sends `method` to exactly one client, bypassing the
    /// descriptor's normal routing. Used to replay state to late joiners.
    pub fn call_on_client<A: Serialize>(
        &self,
        ctx: &mut NetworkContext,
        client: ClientId,
        method: &str,
        args: A,
    ) -> Result<(), RpcError> {
        if !ctx.is_server() {
            return Err(RpcError::ServerOnly {
                operation: "call_on_client",
            });
        }
        let descriptor = self
            .rpcs
            .descriptor(method)
            .ok_or_else(|| RpcError::UnknownMethod {
                identifier: self.identifier,
                method: method.to_string(),
            })?;
        let packet = Packet::rpc(self.identifier, method, Args::encode(&args)?);
        ctx.route_packet(Recipients::Client(client), &packet, descriptor.delivery);
        Ok(())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, RpcError> {
        let component = self.inner.try_borrow().map_err(|_| RpcError::Busy {
            identifier: self.identifier,
        })?;
        Ok(f(&component.state))
    }

    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, RpcError> {
        let mut component = self.inner.try_borrow_mut().map_err(|_| RpcError::Busy {
            identifier: self.identifier,
        })?;
        Ok(f(&mut component.state))
    }

    pub fn downgrade(&self) -> WeakComponentHandle<S> {
        WeakComponentHandle {
            identifier: self.identifier,
            owner: self.owner,
            flag: self.flag.clone(),
            rpcs: self.rpcs.clone(),
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Removes the component from the registry. Packets that arrive for it
    /// afterwards are dropped as `UnknownTarget`. Does nothing if another
    /// component has taken the identifier since.
    pub fn destroy(self, ctx: &mut NetworkContext) {
        let target: Rc<RefCell<dyn RpcTarget>> = self.inner;
        ctx.on_object_destroyed(self.identifier, NetworkObject::Component(target));
    }
}

/// Non-owning handle, used by scheduled work that must not keep a
/// destroyed component alive.
pub struct WeakComponentHandle<S> {
    identifier: NetId,
    owner: ClientId,
    flag: Rc<Cell<bool>>,
    rpcs: Rc<RpcTable<S>>,
    inner: Weak<RefCell<NetworkComponent<S>>>,
}

impl<S> Clone for WeakComponentHandle<S> {
    fn clone(&self) -> Self {
        Self {
            identifier: self.identifier,
            owner: self.owner,
            flag: self.flag.clone(),
            rpcs: self.rpcs.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> WeakComponentHandle<S> {
    pub fn identifier(&self) -> NetId {
        self.identifier
    }

    pub fn upgrade(&self) -> Option<ComponentHandle<S>> {
        Some(ComponentHandle {
            identifier: self.identifier,
            owner: self.owner,
            flag: self.flag.clone(),
            rpcs: self.rpcs.clone(),
            inner: self.inner.upgrade()?,
        })
    }
}
