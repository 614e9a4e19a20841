//! Resource handle - one addressable resource instance
//!
//! A handle binds a schema resource type to a set of identifier values.
//! Identifiers are fixed at construction; attributes are populated lazily by
//! the first load and never silently reloaded. Every method that may contact
//! the adapter takes `&mut self`, so concurrent mutation of one handle is
//! excluded by construction; clone the handle for independent use.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::action::{
    build_load_request, build_resource_request, decode_output, ActionOutcome,
};
use crate::codec::extract_path;
use crate::collection::ResourceCollection;
use crate::error::{Error, Result};
use crate::schema::ParamSource;
use crate::service::Service;

/// Whether a handle's attributes have been populated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// Runtime object for one resource instance
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    service: Service,
    type_name: String,
    identity: BTreeMap<String, String>,
    attributes: Map<String, Value>,
    state: LoadState,
}

impl ResourceHandle {
    pub(crate) fn new_unloaded(
        service: Service,
        type_name: String,
        identity: BTreeMap<String, String>,
    ) -> Self {
        Self {
            service,
            type_name,
            identity,
            attributes: Map::new(),
            state: LoadState::Unloaded,
        }
    }

    pub(crate) fn loaded(
        service: Service,
        type_name: String,
        identity: BTreeMap<String, String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            service,
            type_name,
            identity,
            attributes,
            state: LoadState::Loaded,
        }
    }

    /// Name of this handle's resource type
    pub fn resource_type(&self) -> &str {
        &self.type_name
    }

    /// All identifier values, in declaration-independent sorted order
    pub fn identifiers(&self) -> &BTreeMap<String, String> {
        &self.identity
    }

    /// Get an identifier value; never contacts the network
    pub fn identifier(&self, name: &str) -> Result<&str> {
        if !self.def()?.has_identifier(name) {
            return Err(Error::UnknownIdentifier {
                resource_type: self.type_name.clone(),
                name: name.to_string(),
            });
        }
        self.identity
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownIdentifier {
                resource_type: self.type_name.clone(),
                name: name.to_string(),
            })
    }

    /// Whether a load (or a list decode) has populated the attributes
    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// The attribute store as currently cached
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Load once; returns whether a network call was made
    pub async fn ensure_loaded(&mut self) -> Result<bool> {
        if self.is_loaded() {
            return Ok(false);
        }
        self.load().await
    }

    /// Perform the default describe/get call; always issues one adapter call
    pub async fn load(&mut self) -> Result<bool> {
        self.load_with(Value::Null).await
    }

    /// Load with caller-supplied request overrides
    ///
    /// The default request is built from the identifier mappings; caller
    /// fields win on conflict per field.
    pub async fn load_with(&mut self, request: Value) -> Result<bool> {
        let load = self
            .def()?
            .load
            .clone()
            .ok_or_else(|| Error::LoadUnsupported(self.type_name.clone()))?;

        let context = format!("{}.load", self.type_name);
        // The load request is built synchronously from cached values only,
        // so building it can never trigger another load.
        let built = build_load_request(self, &load.request, request, &context)?;

        let raw = self.invoke(&load.operation, built).await?;

        let decoded = match &load.path {
            Some(path) => extract_path(&raw, path).cloned(),
            None => Some(raw),
        };
        self.attributes = match decoded {
            Some(Value::Object(map)) => map,
            Some(Value::Array(items)) => match items.into_iter().next() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        };
        self.state = LoadState::Loaded;
        Ok(true)
    }

    /// Get an attribute value, loading implicitly exactly once
    ///
    /// Returns `None` for an attribute that is declared but absent from the
    /// response.
    pub async fn attribute(&mut self, name: &str) -> Result<Option<Value>> {
        if !self.def()?.has_attribute(name) {
            return Err(Error::UnknownAttribute {
                resource_type: self.type_name.clone(),
                name: name.to_string(),
            });
        }
        self.ensure_loaded().await?;
        Ok(self
            .attributes
            .get(name)
            .filter(|v| !v.is_null())
            .cloned())
    }

    /// Resolve a reference into a new unloaded handle of the target type
    ///
    /// Returns `None` iff a source value required by the mapping is itself
    /// null or absent.
    pub async fn reference(&mut self, name: &str) -> Result<Option<ResourceHandle>> {
        let reference = self.def()?.reference(name)?.clone();

        let mut identity = BTreeMap::new();
        for (target_identifier, source) in &reference.identifiers {
            let resolved = match self.resolve_source(source).await? {
                Some(value) => value,
                None => return Ok(None),
            };
            let scalar = crate::codec::scalar_to_string(&resolved).ok_or_else(|| {
                Error::mapping(
                    format!("{}.{}", self.type_name, name),
                    target_identifier.clone(),
                    "identifier value is not a scalar",
                )
            })?;
            identity.insert(target_identifier.clone(), scalar);
        }

        Ok(Some(ResourceHandle::new_unloaded(
            self.service.clone(),
            reference.type_name,
            identity,
        )))
    }

    /// Resolve a collection into a restartable pager-backed sequence
    pub async fn collection(&mut self, name: &str) -> Result<ResourceCollection> {
        self.collection_with(name, Value::Null).await
    }

    /// Resolve a collection with caller-supplied request overrides
    ///
    /// Mapped fields win over caller fields: the listing is scoped to this
    /// resource's identity.
    pub async fn collection_with(&mut self, name: &str, request: Value) -> Result<ResourceCollection> {
        let collection = self.def()?.collection(name)?.clone();
        let context = format!("{}.{}", self.type_name, name);
        let base = build_resource_request(self, &collection.request, request, &context).await?;
        Ok(ResourceCollection::new(self.service.clone(), collection, base))
    }

    /// Invoke a named action
    ///
    /// Identifier- and attribute-derived fields always override conflicting
    /// caller-supplied fields; identity is not spoofable via the request.
    pub async fn action(&mut self, name: &str, request: Value) -> Result<ActionOutcome> {
        let action = self.def()?.action(name)?.clone();
        let context = format!("{}.{}", self.type_name, name);
        let built = build_resource_request(self, &action.request, request, &context).await?;

        let raw = self.invoke(&action.operation, built).await?;
        let result = decode_output(&self.service, &action.output, &raw)?;
        Ok(ActionOutcome { result, raw })
    }

    /// Produce the value a parameter mapping injects into a request
    ///
    /// Attribute sources load the handle implicitly if needed. `Ok(None)`
    /// means the source value is null or absent; the caller decides whether
    /// that is an error or a null reference.
    pub(crate) async fn resolve_source(&mut self, source: &ParamSource) -> Result<Option<Value>> {
        if let ParamSource::Attribute { name, .. } = source {
            if !self.def()?.has_attribute(name) {
                return Err(Error::UnknownAttribute {
                    resource_type: self.type_name.clone(),
                    name: name.to_string(),
                });
            }
            self.ensure_loaded().await?;
            return Ok(self.attributes.get(name).filter(|v| !v.is_null()).cloned());
        }
        self.resolve_cached(source)
    }

    /// Cache-only mapping resolution, used when building the load request
    ///
    /// Synchronous and never loads: the load path must stay free of further
    /// loads, so attribute sources resolve from whatever is already cached.
    pub(crate) fn resolve_cached(&self, source: &ParamSource) -> Result<Option<Value>> {
        match source {
            ParamSource::Constant { value } => Ok(match value {
                Value::Null => None,
                other => Some(other.clone()),
            }),
            ParamSource::Identifier { name, .. } => {
                let value = self.identifier(name)?;
                Ok(Some(Value::String(value.to_string())))
            }
            ParamSource::Attribute { name, .. } => {
                if !self.def()?.has_attribute(name) {
                    return Err(Error::UnknownAttribute {
                        resource_type: self.type_name.clone(),
                        name: name.to_string(),
                    });
                }
                Ok(self.attributes.get(name).filter(|v| !v.is_null()).cloned())
            }
        }
    }

    async fn invoke(&self, operation: &str, request: Value) -> Result<Value> {
        debug!(
            resource_type = %self.type_name,
            operation = %operation,
            "invoking adapter operation"
        );
        self.service.invoke(&self.type_name, operation, request).await
    }

    fn def(&self) -> Result<&crate::schema::ResourceTypeDef> {
        self.service.schema().resource_type(&self.type_name)
    }
}
