use serde::Serialize;

use crate::{InfraError, Result};

/// A message handed to a queue backend.
///
/// Scalars travel as their plain textual form; everything else goes through
/// JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuePayload {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Structured(serde_json::Value),
}

impl QueuePayload {
    /// Encodes any serializable value as a structured payload.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(QueuePayload::Structured)
            .map_err(|e| InfraError::SerializationError(format!("failed to encode payload: {e}")))
    }

    /// Wire text for this payload.
    pub fn encode(&self) -> Result<String> {
        match self {
            QueuePayload::Int(value) => Ok(value.to_string()),
            QueuePayload::Float(value) => Ok(value.to_string()),
            QueuePayload::Str(value) => Ok(value.clone()),
            QueuePayload::Bool(value) => Ok(value.to_string()),
            QueuePayload::Structured(value) => serde_json::to_string(value).map_err(|e| {
                InfraError::SerializationError(format!("failed to encode payload: {e}"))
            }),
        }
    }
}

impl From<i64> for QueuePayload {
    fn from(value: i64) -> Self {
        QueuePayload::Int(value)
    }
}

impl From<i32> for QueuePayload {
    fn from(value: i32) -> Self {
        QueuePayload::Int(value.into())
    }
}

impl From<i16> for QueuePayload {
    fn from(value: i16) -> Self {
        QueuePayload::Int(value.into())
    }
}

impl From<f64> for QueuePayload {
    fn from(value: f64) -> Self {
        QueuePayload::Float(value)
    }
}

impl From<f32> for QueuePayload {
    fn from(value: f32) -> Self {
        // Widen through the shortest decimal form so 1.1f32 stays "1.1".
        let widened = value.to_string().parse().unwrap_or_else(|_| value.into());
        QueuePayload::Float(widened)
    }
}

impl From<bool> for QueuePayload {
    fn from(value: bool) -> Self {
        QueuePayload::Bool(value)
    }
}

impl From<String> for QueuePayload {
    fn from(value: String) -> Self {
        QueuePayload::Str(value)
    }
}

impl From<&str> for QueuePayload {
    fn from(value: &str) -> Self {
        QueuePayload::Str(value.to_string())
    }
}

impl From<serde_json::Value> for QueuePayload {
    fn from(value: serde_json::Value) -> Self {
        QueuePayload::Structured(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_scalars_encode_as_plain_text() {
        assert_eq!(QueuePayload::from(42i32).encode().unwrap(), "42");
        assert_eq!(QueuePayload::from(-7i64).encode().unwrap(), "-7");
        assert_eq!(QueuePayload::from(1.5f64).encode().unwrap(), "1.5");
        assert_eq!(QueuePayload::from(1.1f32).encode().unwrap(), "1.1");
        assert_eq!(QueuePayload::from(true).encode().unwrap(), "true");
        assert_eq!(QueuePayload::from("hello").encode().unwrap(), "hello");
    }

    #[test]
    fn test_structured_encodes_as_json() {
        let payload = QueuePayload::from(serde_json::json!({"x": 1}));
        assert_eq!(payload.encode().unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn test_structured_from_serializable_struct() {
        #[derive(Serialize)]
        struct Order {
            id: u32,
            item: &'static str,
        }

        let payload = QueuePayload::structured(&Order { id: 9, item: "tea" }).unwrap();
        assert_eq!(payload.encode().unwrap(), r#"{"id":9,"item":"tea"}"#);
    }

    #[test]
    fn test_structured_rejects_non_string_map_keys() {
        let mut bad: HashMap<(i32, i32), i32> = HashMap::new();
        bad.insert((1, 2), 3);

        let err = QueuePayload::structured(&bad).unwrap_err();
        assert!(matches!(err, InfraError::SerializationError(_)));
    }
}
