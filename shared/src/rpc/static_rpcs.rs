use std::{cell::Cell, collections::HashMap, rc::Rc};

use log::warn;
use serde::Serialize;

use super::{descriptor::RpcDescriptor, error::RpcError};
use crate::{
    context::NetworkContext,
    messages::args::Args,
    types::{ClientId, SERVER_ID},
};

pub(crate) type StaticRpcHandler = Rc<dyn Fn(&mut StaticCall<'_>, &Args) -> Result<(), RpcError>>;

#[derive(Clone)]
pub(crate) struct StaticRpcEntry {
    pub(crate) descriptor: RpcDescriptor,
    pub(crate) handler: StaticRpcHandler,
}

/// Table of free-function RPCs routed through the static identifier.
/// Its owner is always the server.
pub struct StaticRpcs {
    entries: HashMap<String, StaticRpcEntry>,
    executing_from_network: Rc<Cell<bool>>,
}

impl StaticRpcs {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            executing_from_network: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn insert(&mut self, name: &str, entry: StaticRpcEntry) {
        if self.entries.insert(name.to_string(), entry).is_some() {
            warn!("Static RPC '{}' registered twice, keeping the latest handler", name);
        }
    }

    pub(crate) fn entry(&self, name: &str) -> Option<StaticRpcEntry> {
        self.entries.get(name).cloned()
    }

    pub(crate) fn flag(&self) -> Rc<Cell<bool>> {
        self.executing_from_network.clone()
    }

    pub fn owner(&self) -> ClientId {
        SERVER_ID
    }

    pub fn descriptor(&self, name: &str) -> Option<RpcDescriptor> {
        self.entries.get(name).map(|entry| entry.descriptor)
    }

    pub fn is_executing_from_network(&self) -> bool {
        self.executing_from_network.get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handed to a static RPC body while it runs.
pub struct StaticCall<'a> {
    pub(crate) ctx: &'a mut NetworkContext,
    pub(crate) sender: ClientId,
}

impl<'a> StaticCall<'a> {
    /// Peer the call came from; the local id for direct local execution.
    pub fn sender(&self) -> ClientId {
        self.sender
    }

    pub fn context(&mut self) -> &mut NetworkContext {
        &mut *self.ctx
    }

    pub fn is_executing_from_network(&mut self) -> bool {
        self.ctx.registry_mut().static_rpcs().is_executing_from_network()
    }

    /// Invokes another static RPC. While executing from the network the
    /// body runs directly without any routing.
    pub fn call<A: Serialize>(&mut self, name: &str, args: A) -> Result<(), RpcError> {
        let args = Args::encode(&args)?;
        self.ctx.invoke_static(name, args, self.sender)
    }
}
