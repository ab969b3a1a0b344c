use std::{collections::HashMap, rc::Rc};

use log::warn;
use serde::de::DeserializeOwned;

use super::{component::ComponentCall, descriptor::RpcDescriptor, error::RpcError};
use crate::messages::args::Args;

pub(crate) type RpcHandler<S> = Rc<dyn Fn(&mut ComponentCall<'_, S>, &Args) -> Result<(), RpcError>>;

pub(crate) struct RpcEntry<S> {
    pub(crate) descriptor: RpcDescriptor,
    pub(crate) handler: RpcHandler<S>,
}

impl<S> Clone for RpcEntry<S> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            handler: self.handler.clone(),
        }
    }
}

/// Method-name table for one component type, built once and shared by every
/// instance through an `Rc`.
///
/// ```
/// use easycells_shared::{RpcDescriptor, RpcTable, SendTo};
///
/// struct Ship {
///     life: i64,
/// }
///
/// let rpcs = RpcTable::<Ship>::new()
///     .rpc("take_damage", RpcDescriptor::new(SendTo::All), |call, (amount,): (i64,)| {
///         call.state_mut().life -= amount;
///         Ok(())
///     })
///     .build();
/// assert!(rpcs.contains("take_damage"));
/// ```
pub struct RpcTable<S> {
    entries: HashMap<String, RpcEntry<S>>,
}

impl<S: 'static> RpcTable<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds a method whose arguments decode as `A` (usually a tuple).
    pub fn rpc<A, F>(mut self, name: &str, descriptor: RpcDescriptor, handler: F) -> Self
    where
        A: DeserializeOwned + 'static,
        F: Fn(&mut ComponentCall<'_, S>, A) -> Result<(), RpcError> + 'static,
    {
        let handler: RpcHandler<S> = Rc::new(move |call: &mut ComponentCall<'_, S>, args: &Args| {
            let decoded = args.decode::<A>()?;
            handler(call, decoded)
        });
        let previous = self.entries.insert(
            name.to_string(),
            RpcEntry {
                descriptor,
                handler,
            },
        );
        if previous.is_some() {
            warn!("RPC '{}' registered twice, keeping the latest handler", name);
        }
        self
    }

    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    pub fn descriptor(&self, name: &str) -> Option<RpcDescriptor> {
        self.entries.get(name).map(|entry| entry.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, name: &str) -> Option<RpcEntry<S>> {
        self.entries.get(name).cloned()
    }
}

impl<S: 'static> Default for RpcTable<S> {
    fn default() -> Self {
        Self::new()
    }
}
