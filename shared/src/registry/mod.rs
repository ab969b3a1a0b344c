pub mod error;
mod object_registry;

use std::{cell::RefCell, rc::Rc};

pub use error::{ObjectKind, RegistryError};
pub use object_registry::ObjectRegistry;

use crate::{rpc::target::RpcTarget, variable::network_variable::VariableSlot};

/// A distributed object handed to the registry.
pub enum NetworkObject {
    Component(Rc<RefCell<dyn RpcTarget>>),
    Variable(Rc<RefCell<dyn VariableSlot>>),
}

impl NetworkObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            NetworkObject::Component(_) => ObjectKind::Component,
            NetworkObject::Variable(_) => ObjectKind::Variable,
        }
    }
}
