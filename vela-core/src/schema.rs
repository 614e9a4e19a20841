//! Schema - Declarative service descriptor model
//!
//! A service descriptor is a JSON document mapping resource type names to
//! their identifiers, attributes, actions, references, and collections.
//! It is parsed once per service, validated, and shared read-only by every
//! resource handle afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Where a request parameter value comes from
///
/// Descriptor form: `{ "source": "identifier", "name": "Id" }`,
/// `{ "source": "attribute", "name": "VpcId" }`, or
/// `{ "source": "constant", "value": ... }`. Setting `"list": true` wraps the
/// resolved scalar in a one-element array.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ParamSource {
    Constant {
        value: Value,
    },
    Identifier {
        name: String,
        #[serde(default)]
        list: bool,
    },
    Attribute {
        name: String,
        #[serde(default)]
        list: bool,
    },
}

impl ParamSource {
    /// Whether the resolved value should be wrapped in a one-element array
    pub fn wraps_in_list(&self) -> bool {
        matches!(
            self,
            ParamSource::Identifier { list: true, .. } | ParamSource::Attribute { list: true, .. }
        )
    }
}

/// Declared output of an action
///
/// The shape is decided by the descriptor, never by inspecting the response
/// at runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum OutputShape {
    /// The response carries nothing the caller needs
    #[default]
    None,
    /// The raw decoded response is returned as-is
    Data,
    /// The response describes a single resource of the given type
    Resource {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        path: Option<String>,
    },
    /// The response describes a list of resources of the given type
    List {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        path: Option<String>,
    },
}

/// One identifier of a resource type
#[derive(Debug, Clone, Deserialize)]
pub struct IdentifierDef {
    pub name: String,
    /// Response field carrying this identifier when decoding; defaults to the
    /// identifier name itself
    #[serde(default)]
    pub path: Option<String>,
}

impl IdentifierDef {
    pub fn response_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

/// The default describe/get operation backing `load()`
#[derive(Debug, Clone, Deserialize)]
pub struct LoadDef {
    pub operation: String,
    #[serde(default)]
    pub request: HashMap<String, ParamSource>,
    /// Dot path to the attribute object inside the response; the whole
    /// response is the attribute store when absent
    #[serde(default)]
    pub path: Option<String>,
}

/// A named operation on a resource type (or on the service itself)
#[derive(Debug, Clone, Deserialize)]
pub struct ActionDef {
    pub operation: String,
    #[serde(default)]
    pub request: HashMap<String, ParamSource>,
    #[serde(default)]
    pub output: OutputShape,
}

/// A link from one resource type to another, derived from local values
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceDef {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Target identifier name -> how to derive it from the source resource
    pub identifiers: HashMap<String, ParamSource>,
}

/// Pagination protocol fields of a listing operation
#[derive(Debug, Clone, Deserialize)]
pub struct PageDef {
    /// Request field carrying the continuation token
    pub input_token: String,
    /// Response field carrying the next token; absent or empty terminates
    pub output_token: String,
    /// Response field carrying the page items
    pub items: String,
}

/// A paginated listing producing handles of a target resource type
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDef {
    #[serde(rename = "type")]
    pub type_name: String,
    pub operation: String,
    #[serde(default)]
    pub request: HashMap<String, ParamSource>,
    pub page: PageDef,
}

/// One resource type of a service
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceTypeDef {
    #[serde(skip)]
    pub name: String,
    pub identifiers: Vec<IdentifierDef>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub load: Option<LoadDef>,
    #[serde(default)]
    pub actions: HashMap<String, ActionDef>,
    #[serde(default)]
    pub references: HashMap<String, ReferenceDef>,
    #[serde(default)]
    pub collections: HashMap<String, CollectionDef>,
}

impl ResourceTypeDef {
    pub fn has_identifier(&self, name: &str) -> bool {
        self.identifiers.iter().any(|i| i.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    pub fn action(&self, name: &str) -> Result<&ActionDef> {
        self.actions.get(name).ok_or_else(|| Error::UnknownAction {
            resource_type: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn reference(&self, name: &str) -> Result<&ReferenceDef> {
        self.references
            .get(name)
            .ok_or_else(|| Error::UnknownReference {
                resource_type: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn collection(&self, name: &str) -> Result<&CollectionDef> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::UnknownCollection {
                resource_type: self.name.clone(),
                name: name.to_string(),
            })
    }
}

/// Parsed, validated service descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSchema {
    /// Service name (e.g., "ec2")
    pub service: String,
    #[serde(default)]
    pub resources: HashMap<String, ResourceTypeDef>,
    /// Service-level collections (top-level listings)
    #[serde(default)]
    pub collections: HashMap<String, CollectionDef>,
    /// Service-level actions (constants-only parameter mappings)
    #[serde(default)]
    pub actions: HashMap<String, ActionDef>,
}

impl ServiceSchema {
    /// Parse a descriptor from a JSON string and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let mut schema: ServiceSchema = serde_json::from_str(json)
            .map_err(|e| Error::SchemaLoad(format!("Invalid descriptor JSON: {}", e)))?;

        for (name, def) in &mut schema.resources {
            def.name = name.clone();
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a descriptor from a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::SchemaLoad(format!(
                "Failed to read descriptor '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Look up a resource type definition by name
    pub fn resource_type(&self, name: &str) -> Result<&ResourceTypeDef> {
        self.resources
            .get(name)
            .ok_or_else(|| Error::UnknownResourceType(name.to_string()))
    }

    pub fn service_collection(&self, name: &str) -> Result<&CollectionDef> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::UnknownCollection {
                resource_type: self.service.clone(),
                name: name.to_string(),
            })
    }

    pub fn service_action(&self, name: &str) -> Result<&ActionDef> {
        self.actions.get(name).ok_or_else(|| Error::UnknownAction {
            resource_type: self.service.clone(),
            name: name.to_string(),
        })
    }

    fn validate(&self) -> Result<()> {
        for (name, def) in &self.resources {
            if def.identifiers.is_empty() {
                return Err(Error::SchemaLoad(format!(
                    "Resource type '{}' declares no identifiers",
                    name
                )));
            }
            for (i, identifier) in def.identifiers.iter().enumerate() {
                if def.identifiers[..i].iter().any(|o| o.name == identifier.name) {
                    return Err(Error::SchemaLoad(format!(
                        "Resource type '{}' declares identifier '{}' twice",
                        name, identifier.name
                    )));
                }
            }

            if let Some(load) = &def.load {
                self.validate_mappings(name, def, &load.operation, &load.request)?;
            }
            for (action_name, action) in &def.actions {
                self.validate_mappings(name, def, action_name, &action.request)?;
                self.validate_output(name, action_name, &action.output)?;
            }
            for (reference_name, reference) in &def.references {
                if !self.resources.contains_key(&reference.type_name) {
                    return Err(Error::SchemaLoad(format!(
                        "Reference '{}' on '{}' targets undefined resource type '{}'",
                        reference_name, name, reference.type_name
                    )));
                }
                self.validate_mappings(name, def, reference_name, &reference.identifiers)?;
                let target = &self.resources[&reference.type_name];
                for target_identifier in reference.identifiers.keys() {
                    if !target.has_identifier(target_identifier) {
                        return Err(Error::SchemaLoad(format!(
                            "Reference '{}' on '{}' maps unknown identifier '{}' of '{}'",
                            reference_name, name, target_identifier, reference.type_name
                        )));
                    }
                }
            }
            for (collection_name, collection) in &def.collections {
                self.validate_collection(name, collection_name, collection)?;
                self.validate_mappings(name, def, collection_name, &collection.request)?;
            }
        }

        for (collection_name, collection) in &self.collections {
            self.validate_collection(&self.service, collection_name, collection)?;
            self.validate_constants_only(collection_name, &collection.request)?;
        }
        for (action_name, action) in &self.actions {
            self.validate_constants_only(action_name, &action.request)?;
            self.validate_output(&self.service, action_name, &action.output)?;
        }

        Ok(())
    }

    fn validate_mappings(
        &self,
        type_name: &str,
        def: &ResourceTypeDef,
        entry: &str,
        mappings: &HashMap<String, ParamSource>,
    ) -> Result<()> {
        for (field, source) in mappings {
            match source {
                ParamSource::Identifier { name, .. } if !def.has_identifier(name) => {
                    return Err(Error::SchemaLoad(format!(
                        "'{}' on '{}' maps field '{}' from undeclared identifier '{}'",
                        entry, type_name, field, name
                    )));
                }
                ParamSource::Attribute { name, .. } if !def.has_attribute(name) => {
                    return Err(Error::SchemaLoad(format!(
                        "'{}' on '{}' maps field '{}' from undeclared attribute '{}'",
                        entry, type_name, field, name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_constants_only(
        &self,
        entry: &str,
        mappings: &HashMap<String, ParamSource>,
    ) -> Result<()> {
        for (field, source) in mappings {
            if !matches!(source, ParamSource::Constant { .. }) {
                return Err(Error::SchemaLoad(format!(
                    "Service-level '{}' maps field '{}' from a resource value; only constants are allowed",
                    entry, field
                )));
            }
        }
        Ok(())
    }

    fn validate_collection(
        &self,
        owner: &str,
        collection_name: &str,
        collection: &CollectionDef,
    ) -> Result<()> {
        if !self.resources.contains_key(&collection.type_name) {
            return Err(Error::SchemaLoad(format!(
                "Collection '{}' on '{}' targets undefined resource type '{}'",
                collection_name, owner, collection.type_name
            )));
        }
        let page = &collection.page;
        if page.input_token.is_empty() || page.output_token.is_empty() || page.items.is_empty() {
            return Err(Error::SchemaLoad(format!(
                "Collection '{}' on '{}' has an incomplete pagination descriptor",
                collection_name, owner
            )));
        }
        Ok(())
    }

    fn validate_output(&self, owner: &str, entry: &str, output: &OutputShape) -> Result<()> {
        let target = match output {
            OutputShape::Resource { type_name, .. } | OutputShape::List { type_name, .. } => {
                type_name
            }
            _ => return Ok(()),
        };
        if !self.resources.contains_key(target) {
            return Err(Error::SchemaLoad(format!(
                "Action '{}' on '{}' outputs undefined resource type '{}'",
                entry, owner, target
            )));
        }
        Ok(())
    }
}
