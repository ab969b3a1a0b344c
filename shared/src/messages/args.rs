use std::any::type_name;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::error::ArgsError;

/// Ordered, self-describing argument list carried by RPC and variable packets.
///
/// Typed values cross this boundary as tuples: `(a, b)` encodes to two
/// arguments, `()` to none and a bare value to one. Decoding accepts the
/// same shapes back, so a handler taking `(i64,)` or `i64` both read `[5]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn encode<A: Serialize + ?Sized>(args: &A) -> Result<Self, ArgsError> {
        let value = serde_json::to_value(args).map_err(|error| ArgsError::Encode {
            reason: error.to_string(),
        })?;

        Ok(match value {
            Value::Null => Self::empty(),
            Value::Array(values) => Self(values),
            other => Self(vec![other]),
        })
    }

    pub fn decode<A: DeserializeOwned>(&self) -> Result<A, ArgsError> {
        let error = match serde_json::from_value::<A>(Value::Array(self.0.clone())) {
            Ok(decoded) => return Ok(decoded),
            Err(error) => error,
        };

        let fallback = match self.0.as_slice() {
            [] => Some(Value::Null),
            [single] => Some(single.clone()),
            _ => None,
        };

        fallback
            .and_then(|value| serde_json::from_value::<A>(value).ok())
            .ok_or_else(|| ArgsError::Decode {
                expected: type_name::<A>(),
                reason: error.to_string(),
            })
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
