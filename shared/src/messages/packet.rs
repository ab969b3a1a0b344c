use serde_json::{json, Value};

use super::{args::Args, error::WireError};
use crate::{
    constants::{OP_RPC, OP_VAR, VAR_GET, VAR_SET},
    types::NetId,
};

const PACKET_FIELDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarOp {
    Set,
    Get,
}

impl VarOp {
    pub fn code(self) -> u64 {
        match self {
            VarOp::Set => VAR_SET,
            VarOp::Get => VAR_GET,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            VAR_SET => Some(VarOp::Set),
            VAR_GET => Some(VarOp::Get),
            _ => None,
        }
    }
}

/// Application packet routed through the object registry.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    Rpc {
        target: NetId,
        method: String,
        args: Args,
    },
    Var {
        target: NetId,
        op: VarOp,
        args: Args,
    },
}

impl Packet {
    pub fn rpc(target: NetId, method: impl Into<String>, args: Args) -> Self {
        Packet::Rpc {
            target,
            method: method.into(),
            args,
        }
    }

    pub fn var(target: NetId, op: VarOp, args: Args) -> Self {
        Packet::Var { target, op, args }
    }

    pub fn target(&self) -> NetId {
        match self {
            Packet::Rpc { target, .. } | Packet::Var { target, .. } => *target,
        }
    }

    pub fn op_code(&self) -> u64 {
        match self {
            Packet::Rpc { .. } => OP_RPC,
            Packet::Var { .. } => OP_VAR,
        }
    }

    pub fn args(&self) -> &Args {
        match self {
            Packet::Rpc { args, .. } | Packet::Var { args, .. } => args,
        }
    }

    /// Same bytes as `WireMessage::Packet(..).encode()`, without the clone.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(&self.to_value()).map_err(|error| WireError::Encode {
            reason: error.to_string(),
        })
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            Packet::Rpc {
                target,
                method,
                args,
            } => json!([OP_RPC, target, method, args]),
            Packet::Var { target, op, args } => json!([OP_VAR, target, op.code(), args]),
        }
    }

    pub(crate) fn from_fields(fields: Vec<Value>) -> Result<Self, WireError> {
        let [op, target, payload, args]: [Value; PACKET_FIELDS] =
            fields.try_into().map_err(|fields: Vec<Value>| WireError::Arity {
                expected: PACKET_FIELDS,
                found: fields.len(),
            })?;

        let target = target.as_u64().ok_or_else(|| WireError::InvalidField {
            field: "target",
            found: target.to_string(),
        })?;
        let args = match args {
            Value::Array(values) => Args::from_values(values),
            other => {
                return Err(WireError::InvalidField {
                    field: "args",
                    found: other.to_string(),
                })
            }
        };

        match op.as_u64() {
            Some(OP_RPC) => match payload {
                Value::String(method) => Ok(Packet::Rpc {
                    target,
                    method,
                    args,
                }),
                other => Err(WireError::InvalidField {
                    field: "method",
                    found: other.to_string(),
                }),
            },
            Some(OP_VAR) => {
                let op = payload
                    .as_u64()
                    .and_then(VarOp::from_code)
                    .ok_or_else(|| WireError::UnknownVarOp {
                        sub_op: payload.to_string(),
                    })?;
                Ok(Packet::Var { target, op, args })
            }
            _ => Err(WireError::UnknownOpCode { op: op.to_string() }),
        }
    }
}
