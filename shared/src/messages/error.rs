use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Message could not be serialized
    #[error("Failed to encode wire message: {reason}")]
    Encode {
        reason: String,
    },

    /// Payload is not a valid serialized value
    #[error("Failed to decode wire message: {reason}. Payload is not valid JSON")]
    Decode {
        reason: String,
    },

    /// First packet field is neither OP_RPC nor OP_VAR
    #[error("Unknown op code {op} in packet. Expected 1 (RPC) or 2 (VAR)")]
    UnknownOpCode {
        op: String,
    },

    /// Variable packet carries a sub-op other than SET or GET
    #[error("Unknown variable sub-op {sub_op}. Expected 1 (SET) or 2 (GET)")]
    UnknownVarOp {
        sub_op: String,
    },

    /// Packet tuple has the wrong number of fields
    #[error("Packet has {found} fields but {expected} are required")]
    Arity {
        expected: usize,
        found: usize,
    },

    /// A packet field has the wrong type
    #[error("Invalid {field} field in packet: found {found}")]
    InvalidField {
        field: &'static str,
        found: String,
    },

    /// Payload decoded but is not any known message shape
    #[error("Unexpected message shape: {found}")]
    UnexpectedShape {
        found: String,
    },

    /// Reliable frame length exceeds the configured maximum
    #[error("Frame of {size} bytes exceeds the maximum of {max} bytes. The connection must be dropped")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },
}

/// Errors that can occur while converting RPC / variable arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    /// Arguments could not be serialized
    #[error("Failed to encode arguments: {reason}")]
    Encode {
        reason: String,
    },

    /// Arguments do not match the expected types or arity
    #[error("Failed to decode arguments as {expected}: {reason}")]
    Decode {
        expected: &'static str,
        reason: String,
    },
}
