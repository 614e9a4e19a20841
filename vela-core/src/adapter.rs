//! Adapter - Trait abstracting the low-level service client
//!
//! A ServiceAdapter wraps an SDK client for one service. It owns transport,
//! signing, retries, and marshaling; the runtime only hands it an operation
//! name and a JSON request object and receives a JSON response back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Error type for adapter operations
///
/// Whatever the wrapped client raises is carried here unchanged as the cause.
/// The runtime never retries or suppresses adapter failures.
#[derive(Debug)]
pub struct AdapterError {
    pub message: String,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Main adapter trait
///
/// Implementations are expected to be thread-safe; the same adapter instance
/// is shared by every resource handle of a service.
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Invoke a named operation with a JSON request object
    ///
    /// Returns the decoded JSON response, or an error on any transport or
    /// service-side failure.
    async fn invoke(&self, operation: &str, request: Value) -> AdapterResult<Value>;
}

/// The runtime shares one adapter per service behind an `Arc`; forwarding the
/// trait through it lets a shared adapter be passed wherever an adapter is
/// expected.
#[async_trait]
impl ServiceAdapter for Arc<dyn ServiceAdapter> {
    async fn invoke(&self, operation: &str, request: Value) -> AdapterResult<Value> {
        (**self).invoke(operation, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoAdapter;

    #[async_trait]
    impl ServiceAdapter for EchoAdapter {
        async fn invoke(&self, operation: &str, request: Value) -> AdapterResult<Value> {
            Ok(json!({ "Operation": operation, "Request": request }))
        }
    }

    #[tokio::test]
    async fn shared_adapter_dispatches() {
        let adapter: Arc<dyn ServiceAdapter> = Arc::new(EchoAdapter);
        let response = adapter.invoke("Describe", json!({})).await.unwrap();
        assert_eq!(response["Operation"], "Describe");
    }

    #[test]
    fn adapter_error_carries_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let error = AdapterError::new("request failed").with_cause(io);
        assert_eq!(error.to_string(), "request failed");
        assert!(std::error::Error::source(&error).is_some());
    }
}
