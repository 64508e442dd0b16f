pub mod http;
pub mod keyval;
pub mod payload;
pub mod queue;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub use http::{handler_fn, App, Context, Handler, HandlerChain, HttpConfig, Method, Response};
pub use keyval::KeyValClient;
pub use payload::QueuePayload;
pub use queue::{QueueClient, QueueClientExt, QueueConsumer};
pub use registry::{backend_name, AppFactory, KeyValFactory, QueueFactory, Registries, Registry};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfraError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Backend error: {0}")]
    BackendError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Registry frozen: {0}")]
    RegistryFrozen(String),
}

pub type Result<T> = std::result::Result<T, InfraError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fixed response shape shared by every HTTP backend.
///
/// `code == 0` means success; any other code is an application failure and
/// always travels with a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub code: i64,
    pub messages: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ResultEnvelope {
    pub const SUCCESS_MESSAGE: &'static str = "Success";

    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            code: 0,
            messages: Self::SUCCESS_MESSAGE.to_string(),
            data,
        }
    }

    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            messages: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let envelope = ResultEnvelope::success(Some(serde_json::json!({"id": 7})));
        assert!(envelope.is_success());

        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({"code": 0, "messages": "Success", "data": {"id": 7}})
        );
    }

    #[test]
    fn test_failure_envelope_omits_missing_data() {
        let envelope = ResultEnvelope::failure(400, "bad");
        assert!(!envelope.is_success());

        let encoded = serde_json::to_string(&envelope).unwrap();
        assert_eq!(encoded, r#"{"code":400,"messages":"bad"}"#);
    }

    #[test]
    fn test_failure_envelope_with_data() {
        let envelope = ResultEnvelope::failure(1001, "quota").with_data(serde_json::json!([1, 2]));
        assert_eq!(envelope.data, Some(serde_json::json!([1, 2])));
    }

    #[test]
    fn test_envelope_decodes_without_data() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"code":3,"messages":"nope"}"#).unwrap();
        assert_eq!(envelope, ResultEnvelope::failure(3, "nope"));
    }

    #[test]
    fn test_error_display() {
        let err = InfraError::NotFound("keyval backend 'etcd'".to_string());
        assert_eq!(err.to_string(), "Not found: keyval backend 'etcd'");

        let err = InfraError::NotImplemented("queue consume".to_string());
        assert!(err.to_string().contains("Not implemented"));
    }
}
