//! Service - entry point binding a schema to an adapter
//!
//! A Service pairs one validated schema with one shared adapter instance.
//! It is cheap to clone; every handle and collection it produces shares the
//! same read-only schema and the same adapter.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::action::{
    build_service_request, decode_output, ActionOutcome,
};
use crate::adapter::ServiceAdapter;
use crate::collection::ResourceCollection;
use crate::error::{Error, Result};
use crate::resource::ResourceHandle;
use crate::schema::ServiceSchema;

/// Entry point for one service's resource bindings
#[derive(Clone)]
pub struct Service {
    schema: Arc<ServiceSchema>,
    adapter: Arc<dyn ServiceAdapter>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("service", &self.schema.service)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Bind a validated schema to an adapter
    pub fn new(schema: ServiceSchema, adapter: Arc<dyn ServiceAdapter>) -> Self {
        Self {
            schema: Arc::new(schema),
            adapter,
        }
    }

    /// Load the descriptor from a file and bind it to an adapter
    pub fn from_path(path: impl AsRef<Path>, adapter: Arc<dyn ServiceAdapter>) -> Result<Self> {
        Ok(Self::new(ServiceSchema::from_path(path)?, adapter))
    }

    /// Service name from the descriptor
    pub fn name(&self) -> &str {
        &self.schema.service
    }

    /// The shared schema
    pub fn schema(&self) -> &ServiceSchema {
        &self.schema
    }

    /// Construct an unloaded handle for a resource instance
    ///
    /// Every identifier declared for the type must be supplied exactly once;
    /// extra names are rejected.
    pub fn resource(&self, type_name: &str, identifiers: &[(&str, &str)]) -> Result<ResourceHandle> {
        let def = self.schema.resource_type(type_name)?;

        let mut identity = BTreeMap::new();
        for (name, value) in identifiers {
            if !def.has_identifier(name) {
                return Err(Error::UnknownIdentifier {
                    resource_type: type_name.to_string(),
                    name: (*name).to_string(),
                });
            }
            identity.insert((*name).to_string(), (*value).to_string());
        }
        for identifier in &def.identifiers {
            if !identity.contains_key(&identifier.name) {
                return Err(Error::mapping(
                    format!("{}.get", type_name),
                    identifier.name.clone(),
                    "identifier value not supplied",
                ));
            }
        }

        Ok(ResourceHandle::new_unloaded(
            self.clone(),
            type_name.to_string(),
            identity,
        ))
    }

    /// Resolve a service-level collection
    pub fn collection(&self, name: &str) -> Result<ResourceCollection> {
        self.collection_with(name, Value::Null)
    }

    /// Resolve a service-level collection with caller-supplied request fields
    pub fn collection_with(&self, name: &str, request: Value) -> Result<ResourceCollection> {
        let def = self.schema.service_collection(name)?.clone();
        let context = format!("{}.{}", self.schema.service, name);
        let base = build_service_request(&def.request, request, &context)?;
        Ok(ResourceCollection::new(self.clone(), def, base))
    }

    /// Invoke a service-level action
    pub async fn action(&self, name: &str, request: Value) -> Result<ActionOutcome> {
        let def = self.schema.service_action(name)?.clone();
        let context = format!("{}.{}", self.schema.service, name);
        let built = build_service_request(&def.request, request, &context)?;

        let service_name = self.schema.service.clone();
        let raw = self.invoke(&service_name, &def.operation, built).await?;
        let result = decode_output(self, &def.output, &raw)?;
        Ok(ActionOutcome { result, raw })
    }

    /// Forward one operation to the adapter, attaching context to failures
    pub(crate) async fn invoke(
        &self,
        resource_type: &str,
        operation: &str,
        request: Value,
    ) -> Result<Value> {
        debug!(
            service = %self.schema.service,
            resource_type = %resource_type,
            operation = %operation,
            "invoking adapter"
        );
        self.adapter
            .invoke(operation, request)
            .await
            .map_err(|source| Error::Adapter {
                resource_type: resource_type.to_string(),
                operation: operation.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionResult;
    use crate::adapter::{AdapterError, AdapterResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const DESCRIPTOR: &str = r#"{
        "service": "widgets",
        "resources": {
            "Widget": {
                "identifiers": [{ "name": "Id", "path": "WidgetId" }],
                "attributes": ["Color"]
            }
        },
        "actions": {
            "CreateWidget": {
                "operation": "CreateWidget",
                "request": { "DryRun": { "source": "constant", "value": false } },
                "output": { "shape": "resource", "type": "Widget", "path": "Widget" }
            }
        }
    }"#;

    struct StubAdapter {
        responses: Mutex<VecDeque<Value>>,
    }

    #[async_trait]
    impl ServiceAdapter for StubAdapter {
        async fn invoke(&self, _operation: &str, _request: Value) -> AdapterResult<Value> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AdapterError::new("no scripted response left"))
        }
    }

    fn widget_service(responses: Vec<Value>) -> Service {
        let adapter = Arc::new(StubAdapter {
            responses: Mutex::new(responses.into()),
        });
        Service::new(ServiceSchema::from_json(DESCRIPTOR).unwrap(), adapter)
    }

    #[test]
    fn resource_requires_every_identifier() {
        let service = widget_service(vec![]);
        let error = service.resource("Widget", &[]).unwrap_err();
        assert!(matches!(error, Error::MappingResolution { .. }));
    }

    #[test]
    fn resource_rejects_undeclared_identifier() {
        let service = widget_service(vec![]);
        let error = service
            .resource("Widget", &[("Id", "w-1"), ("Arn", "arn:w-1")])
            .unwrap_err();
        assert!(matches!(error, Error::UnknownIdentifier { .. }));
    }

    #[test]
    fn unknown_resource_type_surfaces() {
        let service = widget_service(vec![]);
        assert!(matches!(
            service.resource("Gadget", &[("Id", "g-1")]),
            Err(Error::UnknownResourceType(_))
        ));
    }

    #[tokio::test]
    async fn service_action_decodes_created_resource() {
        let service = widget_service(vec![json!({
            "Widget": { "WidgetId": "w-9", "Color": "teal" }
        })]);

        let outcome = service
            .action("CreateWidget", json!({ "Color": "teal" }))
            .await
            .unwrap();
        match outcome.result {
            ActionResult::Resource(handle) => {
                assert_eq!(handle.identifier("Id").unwrap(), "w-9");
                assert!(handle.is_loaded());
            }
            other => panic!("expected resource result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_service_action_surfaces() {
        let service = widget_service(vec![]);
        assert!(matches!(
            service.action("DestroyEverything", Value::Null).await,
            Err(Error::UnknownAction { .. })
        ));
    }
}
