//! Service Descriptor to Typed Binding Code Generator
//!
//! Generates Rust binding code over the vela-core runtime from a service
//! descriptor JSON document: one wrapper struct per resource type with named
//! identifier getters, attribute getters, action, reference, and collection
//! methods, plus a service extension trait with `get_*` constructors.
//!
//! Usage:
//!   # Generate from a descriptor file
//!   vela-codegen --descriptor widgets.json --output src/generated/widgets.rs
//!
//!   # Generate from stdin to stdout
//!   cat widgets.json | vela-codegen

use anyhow::{Context, Result};
use clap::Parser;
use heck::{ToSnakeCase, ToUpperCamelCase};
use std::io::{self, Read};

use vela_core::schema::{ResourceTypeDef, ServiceSchema};

#[derive(Parser, Debug)]
#[command(name = "vela-codegen")]
#[command(about = "Generate typed Rust bindings from a vela service descriptor")]
struct Args {
    /// Descriptor file (reads from stdin if not specified)
    #[arg(long)]
    descriptor: Option<String>,

    /// Output file (writes to stdout if not specified)
    #[arg(long, short)]
    output: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let descriptor_json = if let Some(path) = &args.descriptor {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    };

    // Parsing through vela-core validates the descriptor before any code is
    // emitted.
    let schema = ServiceSchema::from_json(&descriptor_json)
        .context("Failed to load service descriptor")?;

    let code = generate_bindings(&schema);

    if let Some(output_path) = &args.output {
        std::fs::write(output_path, &code)
            .with_context(|| format!("Failed to write to: {}", output_path))?;
        eprintln!("Generated: {}", output_path);
    } else {
        println!("{}", code);
    }

    Ok(())
}

/// Method names already taken by the wrapper scaffolding
const RESERVED: &[&str] = &[
    "from_handle",
    "handle",
    "into_handle",
    "is_loaded",
    "load",
    "load_with",
];

/// Snake-case a descriptor name into a safe Rust method name
fn method_name(name: &str) -> String {
    let snake = name.to_snake_case();
    if RESERVED.contains(&snake.as_str()) || is_keyword(&snake) {
        format!("{}_value", snake)
    } else {
        snake
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "as" | "async" | "await" | "break" | "const" | "continue" | "crate" | "dyn" | "else"
            | "enum" | "extern" | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop"
            | "match" | "mod" | "move" | "mut" | "pub" | "ref" | "return" | "self" | "static"
            | "struct" | "super" | "trait" | "true" | "type" | "unsafe" | "use" | "where"
            | "while"
    )
}

fn generate_bindings(schema: &ServiceSchema) -> String {
    let mut code = String::new();

    code.push_str(&format!(
        r#"//! Typed bindings for the `{}` service
//!
//! Auto-generated from the service descriptor.
//!
//! DO NOT EDIT MANUALLY - regenerate with vela-codegen

use serde_json::Value;
use vela_core::action::ActionOutcome;
use vela_core::collection::ResourceCollection;
use vela_core::error::Result;
use vela_core::resource::ResourceHandle;
use vela_core::service::Service;
"#,
        schema.service
    ));

    let mut type_names: Vec<&String> = schema.resources.keys().collect();
    type_names.sort();

    for type_name in &type_names {
        let def = &schema.resources[*type_name];
        code.push('\n');
        code.push_str(&generate_resource(type_name, def));
    }

    code.push('\n');
    code.push_str(&generate_service_ext(schema, &type_names));
    code
}

fn generate_resource(type_name: &str, def: &ResourceTypeDef) -> String {
    let struct_name = type_name.to_upper_camel_case();
    let mut code = String::new();

    code.push_str(&format!(
        r#"/// Typed binding for the `{}` resource type
pub struct {} {{
    handle: ResourceHandle,
}}

impl {} {{
    pub fn from_handle(handle: ResourceHandle) -> Self {{
        Self {{ handle }}
    }}

    pub fn handle(&self) -> &ResourceHandle {{
        &self.handle
    }}

    pub fn into_handle(self) -> ResourceHandle {{
        self.handle
    }}

    pub fn is_loaded(&self) -> bool {{
        self.handle.is_loaded()
    }}
"#,
        type_name, struct_name, struct_name
    ));

    if def.load.is_some() {
        code.push_str(
            r#"
    pub async fn load(&mut self) -> Result<bool> {
        self.handle.load().await
    }

    pub async fn load_with(&mut self, request: Value) -> Result<bool> {
        self.handle.load_with(request).await
    }
"#,
        );
    }

    for identifier in &def.identifiers {
        code.push_str(&format!(
            r#"
    /// Identifier `{}`
    pub fn {}(&self) -> Result<&str> {{
        self.handle.identifier("{}")
    }}
"#,
            identifier.name,
            method_name(&identifier.name),
            identifier.name
        ));
    }

    for attribute in &def.attributes {
        code.push_str(&format!(
            r#"
    /// Attribute `{}` (loads implicitly on first access)
    pub async fn {}(&mut self) -> Result<Option<Value>> {{
        self.handle.attribute("{}").await
    }}
"#,
            attribute,
            method_name(attribute),
            attribute
        ));
    }

    let mut action_names: Vec<&String> = def.actions.keys().collect();
    action_names.sort();
    for action in action_names {
        code.push_str(&format!(
            r#"
    /// Action `{}`
    pub async fn {}(&mut self, request: Value) -> Result<ActionOutcome> {{
        self.handle.action("{}", request).await
    }}
"#,
            action,
            method_name(action),
            action
        ));
    }

    let mut reference_names: Vec<&String> = def.references.keys().collect();
    reference_names.sort();
    for reference in reference_names {
        let target = def.references[reference].type_name.to_upper_camel_case();
        code.push_str(&format!(
            r#"
    /// Reference `{}`
    pub async fn {}(&mut self) -> Result<Option<{}>> {{
        Ok(self.handle.reference("{}").await?.map({}::from_handle))
    }}
"#,
            reference,
            method_name(reference),
            target,
            reference,
            target
        ));
    }

    let mut collection_names: Vec<&String> = def.collections.keys().collect();
    collection_names.sort();
    for collection in collection_names {
        code.push_str(&format!(
            r#"
    /// Collection `{}`
    pub async fn {}(&mut self) -> Result<ResourceCollection> {{
        self.handle.collection("{}").await
    }}
"#,
            collection,
            method_name(collection),
            collection
        ));
    }

    code.push_str("}\n");
    code
}

fn generate_service_ext(schema: &ServiceSchema, type_names: &[&String]) -> String {
    let trait_name = format!("{}ServiceExt", schema.service.to_upper_camel_case());
    let mut code = String::new();

    code.push_str(&format!(
        "/// `get_*` constructors for the `{}` service\npub trait {} {{\n",
        schema.service, trait_name
    ));
    for type_name in type_names {
        let def = &schema.resources[type_name.as_str()];
        code.push_str(&format!(
            "    fn get_{}({}) -> Result<{}>;\n",
            type_name.to_snake_case(),
            constructor_params(def),
            type_name.to_upper_camel_case()
        ));
    }
    code.push_str("}\n\n");

    code.push_str(&format!("impl {} for Service {{\n", trait_name));
    for type_name in type_names {
        let def = &schema.resources[type_name.as_str()];
        let pairs: Vec<String> = def
            .identifiers
            .iter()
            .map(|i| format!("(\"{}\", {})", i.name, method_name(&i.name)))
            .collect();
        code.push_str(&format!(
            r#"    fn get_{}({}) -> Result<{}> {{
        Ok({}::from_handle(self.resource("{}", &[{}])?))
    }}
"#,
            type_name.to_snake_case(),
            constructor_params(def),
            type_name.to_upper_camel_case(),
            type_name.to_upper_camel_case(),
            type_name,
            pairs.join(", ")
        ));
    }
    code.push_str("}\n");
    code
}

fn constructor_params(def: &ResourceTypeDef) -> String {
    let mut params = vec!["&self".to_string()];
    for identifier in &def.identifiers {
        params.push(format!("{}: &str", method_name(&identifier.name)));
    }
    params.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "service": "widgets",
        "resources": {
            "Widget": {
                "identifiers": [{ "name": "Id", "path": "WidgetId" }],
                "attributes": ["Color", "GroupId"],
                "load": {
                    "operation": "DescribeWidgets",
                    "request": {
                        "WidgetIds": { "source": "identifier", "name": "Id", "list": true }
                    },
                    "path": "Widgets"
                },
                "actions": {
                    "Delete": {
                        "operation": "DeleteWidget",
                        "request": { "WidgetId": { "source": "identifier", "name": "Id" } }
                    }
                },
                "references": {
                    "Group": {
                        "type": "Group",
                        "identifiers": { "Id": { "source": "attribute", "name": "GroupId" } }
                    }
                },
                "collections": {
                    "Parts": {
                        "type": "Group",
                        "operation": "ListParts",
                        "page": {
                            "input_token": "Marker",
                            "output_token": "NextMarker",
                            "items": "Parts"
                        }
                    }
                }
            },
            "Group": {
                "identifiers": [{ "name": "Id" }],
                "attributes": ["Name"]
            }
        }
    }"#;

    fn generated() -> String {
        let schema = ServiceSchema::from_json(DESCRIPTOR).unwrap();
        generate_bindings(&schema)
    }

    #[test]
    fn emits_a_struct_per_resource_type() {
        let code = generated();
        assert!(code.contains("pub struct Widget {"));
        assert!(code.contains("pub struct Group {"));
    }

    #[test]
    fn emits_identifier_and_attribute_accessors() {
        let code = generated();
        assert!(code.contains("pub fn id(&self) -> Result<&str>"));
        assert!(code.contains("self.handle.identifier(\"Id\")"));
        assert!(code.contains("pub async fn color(&mut self) -> Result<Option<Value>>"));
        assert!(code.contains("self.handle.attribute(\"Color\").await"));
    }

    #[test]
    fn emits_load_only_when_declared() {
        let code = generated();
        // Widget declares a load operation, Group does not. The structs are
        // emitted in sorted order, so cut the Group section off at the next
        // struct rather than taking the whole tail.
        let tail = code.split("pub struct Group").nth(1).unwrap();
        let group_section = tail.split("pub struct ").next().unwrap();
        assert!(code.contains("pub async fn load(&mut self)"));
        assert!(!group_section.contains("pub async fn load(&mut self)"));
    }

    #[test]
    fn emits_typed_reference_wrappers() {
        let code = generated();
        assert!(code.contains("pub async fn group(&mut self) -> Result<Option<Group>>"));
        assert!(code.contains(".map(Group::from_handle)"));
    }

    #[test]
    fn emits_service_extension_trait() {
        let code = generated();
        assert!(code.contains("pub trait WidgetsServiceExt {"));
        assert!(code.contains("fn get_widget(&self, id: &str) -> Result<Widget>;"));
        assert!(code.contains("self.resource(\"Widget\", &[(\"Id\", id)])"));
    }

    #[test]
    fn sanitizes_identifier_parameter_names() {
        let schema = ServiceSchema::from_json(
            r#"{
                "service": "tags",
                "resources": {
                    "Tag": {
                        "identifiers": [{ "name": "Type" }, { "name": "Key" }]
                    }
                }
            }"#,
        )
        .unwrap();
        let code = generate_bindings(&schema);
        // `Type` would snake-case to the keyword `type`; the constructor
        // parameter gets the same sanitized name as the getter.
        assert!(code.contains("fn get_tag(&self, type_value: &str, key: &str) -> Result<Tag>;"));
        assert!(code.contains("(\"Type\", type_value), (\"Key\", key)"));
    }

    #[test]
    fn sanitizes_colliding_method_names() {
        assert_eq!(method_name("Color"), "color");
        assert_eq!(method_name("Load"), "load_value");
        assert_eq!(method_name("Type"), "type_value");
        assert_eq!(method_name("GroupId"), "group_id");
    }
}
