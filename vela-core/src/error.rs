//! Error taxonomy for the resource runtime
//!
//! Schema problems are fatal at load time; unknown-name errors are programmer
//! errors surfaced immediately; adapter failures are propagated verbatim with
//! resource-type and operation context attached.

use thiserror::Error;

use crate::adapter::AdapterError;

/// Errors produced by the resource runtime
#[derive(Debug, Error)]
pub enum Error {
    /// The service descriptor is missing, malformed, or inconsistent
    #[error("Failed to load service schema: {0}")]
    SchemaLoad(String),

    /// No resource type with this name is declared in the schema
    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    /// The resource type declares no identifier with this name
    #[error("Resource type '{resource_type}' has no identifier '{name}'")]
    UnknownIdentifier { resource_type: String, name: String },

    /// The resource type declares no attribute with this name
    #[error("Resource type '{resource_type}' has no attribute '{name}'")]
    UnknownAttribute { resource_type: String, name: String },

    /// The resource type declares no action with this name
    #[error("Resource type '{resource_type}' has no action '{name}'")]
    UnknownAction { resource_type: String, name: String },

    /// The resource type declares no reference with this name
    #[error("Resource type '{resource_type}' has no reference '{name}'")]
    UnknownReference { resource_type: String, name: String },

    /// The resource type declares no collection with this name
    #[error("Resource type '{resource_type}' has no collection '{name}'")]
    UnknownCollection { resource_type: String, name: String },

    /// The resource type declares no load operation
    #[error("Resource type '{0}' does not support load")]
    LoadUnsupported(String),

    /// A parameter mapping could not produce a value
    #[error("Failed to resolve '{field}' in {context}: {reason}")]
    MappingResolution {
        context: String,
        field: String,
        reason: String,
    },

    /// The low-level client reported a failure
    #[error("Operation '{operation}' failed for '{resource_type}': {source}")]
    Adapter {
        resource_type: String,
        operation: String,
        #[source]
        source: AdapterError,
    },
}

impl Error {
    /// Build a mapping resolution error
    pub fn mapping(
        context: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MappingResolution {
            context: context.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_keeps_context() {
        let error = Error::Adapter {
            resource_type: "Widget".to_string(),
            operation: "DescribeWidgets".to_string(),
            source: AdapterError::new("throttled"),
        };
        let message = error.to_string();
        assert!(message.contains("DescribeWidgets"));
        assert!(message.contains("Widget"));
    }

    #[test]
    fn unknown_attribute_display() {
        let error = Error::UnknownAttribute {
            resource_type: "Widget".to_string(),
            name: "Color".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Resource type 'Widget' has no attribute 'Color'"
        );
    }
}
