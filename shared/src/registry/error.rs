use std::fmt;

use thiserror::Error;

use crate::types::NetId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Component,
    Variable,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Component => write!(f, "component"),
            ObjectKind::Variable => write!(f, "variable"),
        }
    }
}

/// Errors that can occur while registering distributed objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A live object of the same kind already owns this identifier
    #[error("Identifier {identifier} is already used by a live {kind}. Destroy it first or pick another identifier")]
    IdentifierInUse {
        kind: ObjectKind,
        identifier: NetId,
    },

    /// Identifier 0 routes static RPCs and cannot name a component
    #[error("Identifier {identifier} is reserved for static RPCs")]
    ReservedIdentifier {
        identifier: NetId,
    },
}
