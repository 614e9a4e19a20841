//! Response decoding helpers
//!
//! Listing and describe responses arrive as raw JSON. The helpers here pull
//! values out by dot-separated field paths, coerce identifier scalars to
//! strings, and turn response objects into loaded resource handles.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::resource::ResourceHandle;
use crate::service::Service;

/// Extract a value by dot-separated field path
///
/// Arrays encountered before the path is exhausted are traversed through
/// their first element, matching the shape of describe-style responses
/// ("Reservations.Instances" and the like).
pub(crate) fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        while let Value::Array(items) = current {
            current = items.first()?;
        }
        current = current.get(segment)?;
    }
    Some(current)
}

/// Coerce a scalar JSON value to its string form
///
/// Identifier values are strings on the wire in the common case, but some
/// services carry numeric ids.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Decode one response object into a loaded resource handle
///
/// Identifiers are pulled from the object via each identifier's response
/// path; the whole object becomes the attribute store.
pub(crate) fn decode_handle(
    service: &Service,
    type_name: &str,
    item: &Value,
) -> Result<ResourceHandle> {
    let def = service.schema().resource_type(type_name)?;

    let mut identity = BTreeMap::new();
    for identifier in &def.identifiers {
        let raw = extract_path(item, identifier.response_path()).ok_or_else(|| {
            Error::mapping(
                format!("{} decode", type_name),
                identifier.name.clone(),
                format!("response item has no '{}'", identifier.response_path()),
            )
        })?;
        let value = scalar_to_string(raw).ok_or_else(|| {
            Error::mapping(
                format!("{} decode", type_name),
                identifier.name.clone(),
                "identifier value is not a scalar",
            )
        })?;
        identity.insert(identifier.name.clone(), value);
    }

    let attributes = match item {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    Ok(ResourceHandle::loaded(
        service.clone(),
        type_name.to_string(),
        identity,
        attributes,
    ))
}
