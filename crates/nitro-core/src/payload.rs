//! The wire unit and its JSON envelope.
//!
//! A [`Payload`] is encoded as the positional array `[request_id, method,
//! params, timestamp]`. A [`Request`]/[`Response`] wraps a payload with its
//! signature set and serializes as `{"req"|"res": [...], "sig": [...],
//! "sid"?: ...}`.

use alloy_primitives::{keccak256, B256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// The reserved params key an error response carries its message under.
pub const ERROR_PARAM_KEY: &str = "error";

/// Schemaless `string -> raw JSON` bag. Every handler knows its own target
/// shape and calls [`Params::translate`]; unknown fields are ignored and
/// missing required fields surface as [`CoreError::MissingParam`] (via the
/// target type's `Deserialize` impl failing).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(pub Map<String, Value>);

impl Params {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Serialize a structured value to JSON and re-parse it as a params map.
    pub fn new(value: impl Serialize) -> Result<Self, CoreError> {
        let v = serde_json::to_value(value)?;
        match v {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::empty()),
            other => Err(CoreError::Malformed(format!(
                "params must serialize to a JSON object, got {other}"
            ))),
        }
    }

    /// The inverse of [`Params::new`]: deserialize the bag into `T`.
    pub fn translate<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| CoreError::Malformed(format!("params translation failed: {e}")))
    }

    /// Checks for the reserved `"error"` key; present on every error response.
    pub fn error(&self) -> Option<String> {
        self.0.get(ERROR_PARAM_KEY).and_then(|v| v.as_str()).map(String::from)
    }

    pub fn error_params(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ERROR_PARAM_KEY.to_string(), Value::String(message.into()));
        Self(map)
    }
}

/// The wire unit. Immutable once constructed — building a new state means
/// building a new `Payload`, never mutating one in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    pub request_id: u64,
    pub method: String,
    pub params: Params,
    pub timestamp: u64,
}

impl Payload {
    pub fn new(request_id: u64, method: impl Into<String>, params: Params, timestamp: u64) -> Self {
        Self { request_id, method: method.into(), params, timestamp }
    }

    /// Emits the positional 4-element array form, e.g.
    /// `[1, "ping", {}, 1700000000000]`.
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::from(self.request_id),
            Value::String(self.method.clone()),
            Value::Object(self.params.0.clone()),
            Value::from(self.timestamp),
        ])
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&self.to_value()).map_err(CoreError::from)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Malformed(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let arr = value
            .as_array()
            .ok_or_else(|| CoreError::Malformed("payload must be a 4-element array".into()))?;
        if arr.len() != 4 {
            return Err(CoreError::Malformed(format!(
                "payload array must have exactly 4 elements, got {}",
                arr.len()
            )));
        }
        let request_id = arr[0]
            .as_u64()
            .ok_or_else(|| CoreError::Malformed("request_id must be a u64".into()))?;
        let method = arr[1]
            .as_str()
            .ok_or_else(|| CoreError::Malformed("method must be a string".into()))?
            .to_string();
        let params = match arr[2].clone() {
            Value::Object(map) => Params(map),
            Value::Null => Params::empty(),
            _ => return Err(CoreError::Malformed("params must be an object".into())),
        };
        let timestamp = arr[3]
            .as_u64()
            .ok_or_else(|| CoreError::Malformed("timestamp must be a u64".into()))?;
        Ok(Self { request_id, method, params, timestamp })
    }

    /// Keccak256 of the canonical encoding — the domain-separated message
    /// both plain ECDSA signing and verification operate over.
    pub fn hash(&self) -> Result<B256, CoreError> {
        Ok(keccak256(self.encode()?))
    }
}

/// `{payload, signatures[]}`, wire-tagged `"req"` on the way in and `"res"`
/// on the way out. `session_id`, when present, routes a push event to an
/// app-session's subscriber set.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub payload: Payload,
    pub signatures: Vec<String>,
    pub session_id: Option<String>,
}

impl Envelope {
    pub fn new(payload: Payload) -> Self {
        Self { payload, signatures: Vec::new(), session_id: None }
    }

    pub fn with_signature(mut self, sig_hex: impl Into<String>) -> Self {
        self.signatures.push(sig_hex.into());
        self
    }

    pub fn with_session_id(mut self, sid: impl Into<String>) -> Self {
        self.session_id = Some(sid.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.payload.method == "error"
    }

    pub fn error_message(&self) -> Option<String> {
        if self.is_error() { self.payload.params.error() } else { None }
    }

    fn to_tagged_value(&self, tag: &str) -> Result<Value, CoreError> {
        let mut map = Map::new();
        map.insert(tag.to_string(), self.payload.to_value());
        map.insert(
            "sig".to_string(),
            Value::Array(self.signatures.iter().cloned().map(Value::String).collect()),
        );
        if let Some(sid) = &self.session_id {
            map.insert("sid".to_string(), Value::String(sid.clone()));
        }
        Ok(Value::Object(map))
    }

    fn from_tagged_value(value: Value, tag: &str) -> Result<Self, CoreError> {
        let map = value
            .as_object()
            .ok_or_else(|| CoreError::Malformed("envelope must be a JSON object".into()))?;
        let payload_value = map
            .get(tag)
            .ok_or_else(|| CoreError::Malformed(format!("missing `{tag}` field")))?
            .clone();
        let payload = Payload::from_value(payload_value)?;
        let signatures = match map.get("sig") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(String::from)
                        .ok_or_else(|| CoreError::Malformed("sig entries must be strings".into()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
            Some(_) => return Err(CoreError::Malformed("sig must be an array".into())),
        };
        let session_id = map.get("sid").and_then(|v| v.as_str()).map(String::from);
        Ok(Self { payload, signatures, session_id })
    }
}

/// A client-to-server frame. Serializes under the `"req"` tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Request(pub Envelope);

/// A server-to-client frame. Serializes under the `"res"` tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Response(pub Envelope);

impl Request {
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Malformed(format!("invalid JSON: {e}")))?;
        Ok(Self(Envelope::from_tagged_value(value, "req")?))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&self.0.to_tagged_value("req")?).map_err(CoreError::from)
    }
}

impl Response {
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Malformed(format!("invalid JSON: {e}")))?;
        Ok(Self(Envelope::from_tagged_value(value, "res")?))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&self.0.to_tagged_value("res")?).map_err(CoreError::from)
    }

    pub fn error(request_id: u64, timestamp: u64, message: impl Into<String>) -> Self {
        let payload = Payload::new(request_id, "error", Params::error_params(message), timestamp);
        Self(Envelope::new(payload))
    }

    pub fn success(
        request_id: u64,
        method: impl Into<String>,
        params: Params,
        timestamp: u64,
    ) -> Self {
        let payload = Payload::new(request_id, method, params, timestamp);
        Self(Envelope::new(payload))
    }
}

// Serde impls delegate to the tagged-value helpers so `Request`/`Response`
// can be embedded in larger structures (e.g. rpc_history records) when
// needed, without duplicating the array-vs-object logic.

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .to_tagged_value("req")
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Envelope::from_tagged_value(value, "req")
            .map(Request)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .to_tagged_value("res")
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Envelope::from_tagged_value(value, "res")
            .map(Response)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_encode_decode() {
        let params = Params::new(serde_json::json!({"a": 1, "b": "two"})).unwrap();
        let p = Payload::new(7, "ping", params, 1_700_000_000_000);
        let decoded = Payload::decode(&p.encode().unwrap()).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        let bytes = serde_json::to_vec(&serde_json::json!([1, "ping", {}])).unwrap();
        assert!(Payload::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_wrong_element_types() {
        let bytes = serde_json::to_vec(&serde_json::json!(["not-a-number", "ping", {}, 1])).unwrap();
        assert!(Payload::decode(&bytes).is_err());
    }

    #[test]
    fn request_envelope_round_trips() {
        let params = Params::new(serde_json::json!({})).unwrap();
        let payload = Payload::new(1, "ping", params, 1);
        let req = Request(Envelope::new(payload).with_signature("deadbeef"));
        let bytes = req.encode().unwrap();
        let decoded = Request::decode(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn error_response_carries_single_error_param() {
        let resp = Response::error(0, 1, "boom");
        assert_eq!(resp.0.error_message().as_deref(), Some("boom"));
    }
}
