use serde_json::{json, Value};

use super::{error::WireError, packet::Packet};
use crate::{
    constants::{CLOSE_SENTINEL, DATAGRAM_KEY_SENTINEL, HANDSHAKE_SENTINEL},
    types::ClientId,
};

/// What a client presents to claim the datagram channel of its reliable
/// connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatagramTicket {
    pub client_id: ClientId,
    pub key: u64,
}

/// Everything that can travel in one reliable frame or one datagram.
#[derive(Clone, Debug, PartialEq)]
pub enum WireMessage {
    /// First message on a fresh reliable connection, and the server's reply
    /// to a datagram handshake. Encoded as a bare integer.
    AssignId(ClientId),
    Close,
    /// Datagram registration, `["HANDSHAKE", id, key]`. Carries what the
    /// client learned over the reliable channel so the server can pair both
    /// channels of one peer. A bare `"HANDSHAKE"` decodes to `None`.
    Handshake(Option<DatagramTicket>),
    /// Reliable-channel message right after `AssignId` when the server
    /// accepts datagrams: `["DATAGRAM_KEY", key]`.
    DatagramKey(u64),
    Packet(Packet),
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(&self.to_value()).map_err(|error| WireError::Encode {
            reason: error.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|error| WireError::Decode {
            reason: error.to_string(),
        })?;
        Self::from_value(value)
    }

    fn to_value(&self) -> Value {
        match self {
            WireMessage::AssignId(id) => json!(id),
            WireMessage::Close => json!(CLOSE_SENTINEL),
            WireMessage::Handshake(None) => json!(HANDSHAKE_SENTINEL),
            WireMessage::Handshake(Some(ticket)) => {
                json!([HANDSHAKE_SENTINEL, ticket.client_id, ticket.key])
            }
            WireMessage::DatagramKey(key) => json!([DATAGRAM_KEY_SENTINEL, key]),
            WireMessage::Packet(packet) => packet.to_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self, WireError> {
        match value {
            Value::Number(number) => number
                .as_u64()
                .map(WireMessage::AssignId)
                .ok_or_else(|| WireError::UnexpectedShape {
                    found: number.to_string(),
                }),
            Value::String(sentinel) if sentinel == CLOSE_SENTINEL => Ok(WireMessage::Close),
            Value::String(sentinel) if sentinel == HANDSHAKE_SENTINEL => {
                Ok(WireMessage::Handshake(None))
            }
            Value::Array(fields) if is_tagged(&fields, HANDSHAKE_SENTINEL) => {
                if fields.len() != 3 {
                    return Err(WireError::UnexpectedShape {
                        found: Value::Array(fields).to_string(),
                    });
                }
                Ok(WireMessage::Handshake(Some(DatagramTicket {
                    client_id: unsigned_field(&fields[1], "client id")?,
                    key: unsigned_field(&fields[2], "datagram key")?,
                })))
            }
            Value::Array(fields) if is_tagged(&fields, DATAGRAM_KEY_SENTINEL) => {
                if fields.len() != 2 {
                    return Err(WireError::UnexpectedShape {
                        found: Value::Array(fields).to_string(),
                    });
                }
                unsigned_field(&fields[1], "datagram key").map(WireMessage::DatagramKey)
            }
            Value::Array(fields) => Packet::from_fields(fields).map(WireMessage::Packet),
            other => Err(WireError::UnexpectedShape {
                found: other.to_string(),
            }),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, WireMessage::Close)
    }
}

impl From<Packet> for WireMessage {
    fn from(packet: Packet) -> Self {
        WireMessage::Packet(packet)
    }
}

fn is_tagged(fields: &[Value], sentinel: &str) -> bool {
    fields.first().and_then(Value::as_str) == Some(sentinel)
}

fn unsigned_field(value: &Value, field: &'static str) -> Result<u64, WireError> {
    value.as_u64().ok_or_else(|| WireError::InvalidField {
        field,
        found: value.to_string(),
    })
}
