//! Action invocation - request building and result decoding
//!
//! An action request starts from the caller-supplied fields, then the
//! schema's parameter mappings are applied. For actions and collections the
//! mapped fields always win on conflict: they encode resource identity and
//! must not be spoofable through the request object. The load operation is
//! the one exception, where caller overrides win per field.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::codec::{decode_handle, extract_path};
use crate::error::{Error, Result};
use crate::resource::ResourceHandle;
use crate::schema::{OutputShape, ParamSource};
use crate::service::Service;

/// Decoded result of an action, discriminated by the declared output shape
#[derive(Debug, Clone)]
pub enum ActionResult {
    /// The action returns nothing
    None,
    /// The action returned a single resource
    Resource(ResourceHandle),
    /// The action returned a list of resources
    Resources(Vec<ResourceHandle>),
    /// The action returned plain data
    Data(Value),
}

/// Result of an action together with the untransformed adapter response
///
/// `raw` is the side channel for callers who need the low-level response
/// alongside the decoded result.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub result: ActionResult,
    pub raw: Value,
}

/// Which side wins when a mapped field collides with a caller-supplied field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergePolicy {
    /// Mapped fields override the caller (actions, references, collections)
    MappedWins,
    /// Caller fields override the mappings (explicit load overrides)
    CallerWins,
}

fn caller_object(context: &str, caller: Value) -> Result<Map<String, Value>> {
    match caller {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(Error::mapping(
            context,
            "request",
            format!("caller request must be a JSON object, got {}", other),
        )),
    }
}

fn apply_mapped(
    request: &mut Map<String, Value>,
    field: &str,
    value: Value,
    policy: MergePolicy,
) {
    match policy {
        MergePolicy::MappedWins => {
            request.insert(field.to_string(), value);
        }
        MergePolicy::CallerWins => {
            request.entry(field.to_string()).or_insert(value);
        }
    }
}

/// Build a request for an action, reference, or collection
///
/// Mapped fields win over caller fields. Attribute-sourced mappings may
/// trigger an implicit load of the owning handle.
pub(crate) async fn build_resource_request(
    owner: &mut ResourceHandle,
    mappings: &HashMap<String, ParamSource>,
    caller: Value,
    context: &str,
) -> Result<Value> {
    let mut request = caller_object(context, caller)?;

    for (field, source) in mappings {
        let resolved = owner.resolve_source(source).await?.ok_or_else(|| {
            Error::mapping(context, field.clone(), "required source value is absent")
        })?;
        let value = if source.wraps_in_list() {
            Value::Array(vec![resolved])
        } else {
            resolved
        };
        apply_mapped(&mut request, field, value, MergePolicy::MappedWins);
    }

    Ok(Value::Object(request))
}

/// Build the default load request, caller fields winning per field
///
/// Synchronous by design: mappings resolve from the handle's cache only, so
/// the load call graph is acyclic and a load can never trigger a load. A
/// field the caller already supplied skips its mapping entirely.
pub(crate) fn build_load_request(
    owner: &ResourceHandle,
    mappings: &HashMap<String, ParamSource>,
    caller: Value,
    context: &str,
) -> Result<Value> {
    let mut request = caller_object(context, caller)?;

    for (field, source) in mappings {
        if request.contains_key(field) {
            continue;
        }
        let resolved = owner.resolve_cached(source)?.ok_or_else(|| {
            Error::mapping(context, field.clone(), "required source value is absent")
        })?;
        let value = if source.wraps_in_list() {
            Value::Array(vec![resolved])
        } else {
            resolved
        };
        apply_mapped(&mut request, field, value, MergePolicy::CallerWins);
    }

    Ok(Value::Object(request))
}

/// Build a request for a service-scoped operation (constants only)
pub(crate) fn build_service_request(
    mappings: &HashMap<String, ParamSource>,
    caller: Value,
    context: &str,
) -> Result<Value> {
    let mut request = caller_object(context, caller)?;

    for (field, source) in mappings {
        match source {
            ParamSource::Constant { value } => {
                apply_mapped(&mut request, field, value.clone(), MergePolicy::MappedWins);
            }
            _ => {
                return Err(Error::mapping(
                    context,
                    field.clone(),
                    "service-level mappings may only use constants",
                ));
            }
        }
    }

    Ok(Value::Object(request))
}

/// Decode an adapter response per the declared output shape
pub(crate) fn decode_output(
    service: &Service,
    output: &OutputShape,
    raw: &Value,
) -> Result<ActionResult> {
    match output {
        OutputShape::None => Ok(ActionResult::None),
        OutputShape::Data => Ok(ActionResult::Data(raw.clone())),
        OutputShape::Resource { type_name, path } => {
            let item = match path {
                Some(p) => extract_path(raw, p).ok_or_else(|| {
                    Error::mapping(
                        format!("{} decode", type_name),
                        p.clone(),
                        "response has no value at the declared path",
                    )
                })?,
                None => raw,
            };
            let item = first_element(item);
            Ok(ActionResult::Resource(decode_handle(
                service, type_name, item,
            )?))
        }
        OutputShape::List { type_name, path } => {
            let items = match path {
                Some(p) => extract_path(raw, p),
                None => Some(raw),
            };
            let decoded = match items {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| decode_handle(service, type_name, item))
                    .collect::<Result<Vec<_>>>()?,
                Some(single) => vec![decode_handle(service, type_name, single)?],
                // Some services omit the items field entirely for empty results
                None => Vec::new(),
            };
            Ok(ActionResult::Resources(decoded))
        }
    }
}

fn first_element(value: &Value) -> &Value {
    match value {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}
