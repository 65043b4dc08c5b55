use crate::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The single wire record, used for both requests and responses.
///
/// On a request, `args` holds the call arguments and `err` is empty. On a
/// response, `args` holds the results and `err` carries the stringified
/// failure, if any; results are dropped when `err` is set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Envelope {
    /// Target function on a request, echoed back on the response.
    pub name: String,
    pub args: Vec<Value>,
    /// Empty means no error.
    pub err: String,
}

impl Envelope {
    pub fn request(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            err: String::new(),
        }
    }

    /// Successful response: results, no error.
    pub fn reply(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            err: String::new(),
        }
    }

    /// Failed response: no results, stringified error.
    pub fn fault(name: impl Into<String>, err: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            err: err.into(),
        }
    }

    pub fn is_err(&self) -> bool {
        !self.err.is_empty()
    }

    /// Serialize to an opaque byte payload, variant tags included.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(bincode::serialize(self)?)
    }

    /// Reverse of [`encode`](Self::encode). Rejects truncated or corrupted
    /// payloads.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Debug, Error)]
#[error("encoding envelope: {0}")]
pub struct EncodeError(#[from] bincode::Error);

#[derive(Debug, Error)]
#[error("decoding envelope: {0}")]
pub struct DecodeError(#[from] bincode::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Envelope {
        let mut map = BTreeMap::new();
        map.insert("id".to_owned(), Value::Int(42));
        map.insert("name".to_owned(), Value::from("ankur"));
        Envelope::request(
            "query_user",
            vec![
                Value::Int(42),
                Value::Float(2.5),
                Value::from("hello"),
                Value::Bytes(vec![0, 1, 2]),
                Value::List(vec![Value::Nil, Value::Bool(true)]),
                Value::Map(map),
            ],
        )
    }

    #[test]
    fn round_trip_preserves_values_and_tags() {
        let envelope = sample();
        let bytes = envelope.encode().unwrap();
        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn round_trip_preserves_err() {
        let envelope = Envelope::fault("divide", "division by zero");
        let bytes = envelope.encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert!(decoded.is_err());
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = sample().encode().unwrap();
        assert!(Envelope::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut bytes = Envelope::request("f", vec![Value::Int(1)]).encode().unwrap();
        let n = bytes.len();
        for b in &mut bytes[n - 12..] {
            *b = 0xFF;
        }
        assert!(Envelope::decode(&bytes).is_err());
    }
}
