use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use log::trace;

use super::{error::ObjectKind, NetworkObject, RegistryError};
use crate::{
    rpc::{static_rpcs::StaticRpcs, target::RpcTarget},
    types::{NetId, STATIC_IDENTIFIER},
    variable::network_variable::VariableSlot,
};

/// Routes inbound packets to live distributed objects.
///
/// Entries are weak: the registry never keeps an object alive. At most one
/// live object of each kind owns an identifier; an entry whose object was
/// dropped counts as vacant and is pruned on lookup. Components and
/// variables use separate identifier spaces.
pub struct ObjectRegistry {
    components: HashMap<NetId, Weak<RefCell<dyn RpcTarget>>>,
    variables: HashMap<NetId, Weak<RefCell<dyn VariableSlot>>>,
    static_rpcs: Option<StaticRpcs>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
            variables: HashMap::new(),
            static_rpcs: None,
        }
    }

    /// Registers `object`, returning its identifier.
    pub fn register(&mut self, object: &NetworkObject) -> Result<NetId, RegistryError> {
        match object {
            NetworkObject::Component(target) => self.register_component(target),
            NetworkObject::Variable(slot) => self.register_variable(slot),
        }
    }

    pub fn register_component(
        &mut self,
        target: &Rc<RefCell<dyn RpcTarget>>,
    ) -> Result<NetId, RegistryError> {
        let identifier = target.borrow().identifier();
        if identifier == STATIC_IDENTIFIER {
            return Err(RegistryError::ReservedIdentifier { identifier });
        }
        if let Some(existing) = self.components.get(&identifier).and_then(Weak::upgrade) {
            if !Rc::ptr_eq(&existing, target) {
                return Err(RegistryError::IdentifierInUse {
                    kind: ObjectKind::Component,
                    identifier,
                });
            }
        }
        self.components.insert(identifier, Rc::downgrade(target));
        Ok(identifier)
    }

    pub fn register_variable(
        &mut self,
        slot: &Rc<RefCell<dyn VariableSlot>>,
    ) -> Result<NetId, RegistryError> {
        let identifier = slot.borrow().var_id();
        if let Some(existing) = self.variables.get(&identifier).and_then(Weak::upgrade) {
            if !Rc::ptr_eq(&existing, slot) {
                return Err(RegistryError::IdentifierInUse {
                    kind: ObjectKind::Variable,
                    identifier,
                });
            }
        }
        self.variables.insert(identifier, Rc::downgrade(slot));
        Ok(identifier)
    }

    /// Removes the entry under `identifier`, but only if that entry is
    /// `object` itself. Returns whether an entry was removed. Never borrows
    /// the object, which may be mid-dispatch.
    pub fn unregister(&mut self, identifier: NetId, object: &NetworkObject) -> bool {
        match object {
            NetworkObject::Component(target) => self.unregister_component(identifier, target),
            NetworkObject::Variable(slot) => self.unregister_variable(identifier, slot),
        }
    }

    pub fn unregister_component(
        &mut self,
        identifier: NetId,
        target: &Rc<RefCell<dyn RpcTarget>>,
    ) -> bool {
        let registered = self
            .components
            .get(&identifier)
            .is_some_and(|entry| Weak::ptr_eq(entry, &Rc::downgrade(target)));
        registered && self.components.remove(&identifier).is_some()
    }

    pub fn unregister_variable(
        &mut self,
        identifier: NetId,
        slot: &Rc<RefCell<dyn VariableSlot>>,
    ) -> bool {
        let registered = self
            .variables
            .get(&identifier)
            .is_some_and(|entry| Weak::ptr_eq(entry, &Rc::downgrade(slot)));
        registered && self.variables.remove(&identifier).is_some()
    }

    pub fn component(&mut self, identifier: NetId) -> Option<Rc<RefCell<dyn RpcTarget>>> {
        let entry = self.components.get(&identifier)?;
        match entry.upgrade() {
            Some(target) => Some(target),
            None => {
                trace!("Pruning dead component entry {}", identifier);
                self.components.remove(&identifier);
                None
            }
        }
    }

    pub fn variable(&mut self, identifier: NetId) -> Option<Rc<RefCell<dyn VariableSlot>>> {
        let entry = self.variables.get(&identifier)?;
        match entry.upgrade() {
            Some(slot) => Some(slot),
            None => {
                trace!("Pruning dead variable entry {}", identifier);
                self.variables.remove(&identifier);
                None
            }
        }
    }

    pub fn contains(&self, kind: ObjectKind, identifier: NetId) -> bool {
        match kind {
            ObjectKind::Component => self
                .components
                .get(&identifier)
                .is_some_and(|entry| entry.strong_count() > 0),
            ObjectKind::Variable => self
                .variables
                .get(&identifier)
                .is_some_and(|entry| entry.strong_count() > 0),
        }
    }

    /// Number of live objects of `kind`.
    pub fn len(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Component => self
                .components
                .values()
                .filter(|entry| entry.strong_count() > 0)
                .count(),
            ObjectKind::Variable => self
                .variables
                .values()
                .filter(|entry| entry.strong_count() > 0)
                .count(),
        }
    }

    /// Drops every dead entry, returning how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.components.len() + self.variables.len();
        self.components.retain(|_, entry| entry.strong_count() > 0);
        self.variables.retain(|_, entry| entry.strong_count() > 0);
        before - self.components.len() - self.variables.len()
    }

    /// The static-RPC pseudo-object, created on first access.
    pub fn static_rpcs(&mut self) -> &mut StaticRpcs {
        self.static_rpcs.get_or_insert_with(StaticRpcs::new)
    }

    pub fn has_static_rpcs(&self) -> bool {
        self.static_rpcs.is_some()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
