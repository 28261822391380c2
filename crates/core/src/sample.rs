// Metric samples reported by the load-generation worker
//
// A sample is an arbitrary JSON object. The control plane never interprets
// its fields; it only checks the payload is an object and forwards the exact
// bytes it received to every subscriber.

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Reasons a submitted payload is not a valid sample
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One point-in-time metrics snapshot.
///
/// Cloning is cheap: the payload text is shared between every subscriber
/// queue it is pushed onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    payload: Arc<str>,
}

impl MetricSample {
    /// Validate `body` as a JSON object and keep it verbatim.
    pub fn from_json_bytes(body: &[u8]) -> Result<Self, SampleError> {
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(SampleError::NotAnObject(json_kind(&value)));
        }

        // from_slice only succeeds on UTF-8 input
        let text = String::from_utf8_lossy(body);
        Ok(Self {
            payload: Arc::from(text.trim()),
        })
    }

    /// The JSON text exactly as it will be pushed to subscribers.
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Parse the payload back into a JSON object.
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::from_str(&self.payload) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sample_keeps_payload_verbatim() {
        let body = br#"{"rps": 5.2, "timestamp": 1234, "zeta": 1, "alpha": 2}"#;
        let sample = MetricSample::from_json_bytes(body).unwrap();
        assert_eq!(
            sample.as_str(),
            r#"{"rps": 5.2, "timestamp": 1234, "zeta": 1, "alpha": 2}"#
        );
        assert_eq!(sample.fields()["rps"], json!(5.2));
        assert_eq!(sample.fields()["timestamp"], json!(1234));
    }

    #[test]
    fn test_sample_trims_surrounding_whitespace() {
        let sample = MetricSample::from_json_bytes(b"  {\"a\":1}\n").unwrap();
        assert_eq!(sample.as_str(), "{\"a\":1}");
    }

    #[test]
    fn test_sample_rejects_invalid_json() {
        let err = MetricSample::from_json_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, SampleError::InvalidJson(_)));
        assert!(err.to_string().starts_with("invalid JSON"));
    }

    #[test]
    fn test_sample_rejects_non_objects() {
        for (body, kind) in [
            (&b"[1,2]"[..], "an array"),
            (&b"42"[..], "a number"),
            (&b"\"rps\""[..], "a string"),
            (&b"null"[..], "null"),
        ] {
            match MetricSample::from_json_bytes(body) {
                Err(SampleError::NotAnObject(k)) => assert_eq!(k, kind),
                other => panic!("expected NotAnObject, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_sample_clone_shares_payload() {
        let sample = MetricSample::from_json_bytes(br#"{"a":1}"#).unwrap();
        let copy = sample.clone();
        assert!(Arc::ptr_eq(&sample.payload, &copy.payload));
        assert_eq!(sample, copy);
    }
}
