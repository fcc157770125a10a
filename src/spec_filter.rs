//! Reduction of a controller API description to the handful of paths the assistant may call.
//!
//! The controller publishes a Swagger 2.0 document with hundreds of paths. Only an allow-list
//! of them is handed to the language model, together with the schema definitions those paths
//! reference (directly or through other definitions). OpenAPI 3 documents are handled the same
//! way with `components.schemas` in place of `definitions`.

use serde_json::{Map, Value, json};
use std::collections::HashSet;

use crate::error::{AssistantError, Result};

/// Paths exposed to the model unless the configuration says otherwise.
pub const DEFAULT_FILTER_PATHS: &[&str] = &[
    "/api/aaa/login",
    "/api/blueprints",
    "/api/blueprints/{blueprint_id}",
    "/api/blueprints/{blueprint_id}/qe",
    "/api/blueprints/{blueprint_id}/systems",
    "/api/blueprints/{blueprint_id}/anomalies-history",
    "/api/blueprints/{blueprint_id}/anomalies",
];

pub fn default_filter_paths() -> Vec<String> {
    DEFAULT_FILTER_PATHS.iter().map(|p| p.to_string()).collect()
}

fn is_oas3(doc: &Value) -> bool {
    doc.get("openapi").and_then(Value::as_str).is_some()
}

/// Builds a reduced copy of `api_spec` holding only `included_paths` and the definitions they
/// reference. Allow-listed paths absent from the document are skipped.
pub fn filter_openapi_spec<S: AsRef<str>>(included_paths: &[S], api_spec: &Value) -> Result<Value> {
    let source_paths = api_spec
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| AssistantError::InvalidSpec("document has no 'paths' object".to_string()))?;

    let mut paths = Map::new();
    for path in included_paths {
        let path = path.as_ref();
        if let Some(item) = source_paths.get(path) {
            paths.insert(path.to_string(), item.clone());
        } else {
            tracing::debug!(path, "allow-listed path not present in API docs");
        }
    }

    let oas3 = is_oas3(api_spec);
    let source_definitions = if oas3 {
        api_spec.pointer("/components/schemas")
    } else {
        api_spec.get("definitions")
    }
    .and_then(Value::as_object);

    let definitions = match source_definitions {
        Some(defs) => referenced_definitions(&paths, defs),
        None => Map::new(),
    };

    tracing::debug!(
        paths = paths.len(),
        definitions = definitions.len(),
        "Filtered API spec"
    );

    let mut filtered = if oas3 {
        oas3_skeleton(api_spec, definitions)
    } else {
        swagger_skeleton(api_spec, definitions)
    };
    filtered.insert("paths".to_string(), Value::Object(paths));
    if let Some(host) = api_spec.get("host") {
        filtered.insert("host".to_string(), host.clone());
    }

    Ok(Value::Object(filtered))
}

fn copy_or(doc: &Value, key: &str, default: Value) -> Value {
    doc.get(key).cloned().unwrap_or(default)
}

/// Top-level keys shared by both document shapes, each copied from `doc` or defaulted.
fn common_keys(doc: &Value, out: &mut Map<String, Value>) {
    out.insert("servers".into(), copy_or(doc, "servers", json!([])));
    out.insert("basePath".into(), copy_or(doc, "basePath", json!("/")));
    out.insert("schemes".into(), copy_or(doc, "schemes", json!("https")));
    out.insert(
        "consumes".into(),
        copy_or(doc, "consumes", json!(["application/json"])),
    );
    out.insert(
        "produces".into(),
        copy_or(doc, "produces", json!(["application/json"])),
    );
    out.insert(
        "securityDefinitions".into(),
        copy_or(
            doc,
            "securityDefinitions",
            json!({"APIKeyHeader": {"in": "header", "name": "AUTHTOKEN", "type": "apiKey"}}),
        ),
    );
    out.insert(
        "security".into(),
        copy_or(doc, "security", json!([{"APIKeyHeader": []}])),
    );
    out.insert(
        "info".into(),
        copy_or(
            doc,
            "info",
            json!({"description": "AOS REST API", "title": "AOS", "version": "5.0.0"}),
        ),
    );
}

fn swagger_skeleton(doc: &Value, definitions: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("swagger".into(), copy_or(doc, "swagger", json!("2.0")));
    common_keys(doc, &mut out);
    out.insert("definitions".into(), Value::Object(definitions));
    out
}

fn oas3_skeleton(doc: &Value, schemas: Map<String, Value>) -> Map<String, Value> {
    let mut components = Map::new();
    components.insert("schemas".into(), Value::Object(schemas));
    if let Some(schemes) = doc.pointer("/components/securitySchemes") {
        components.insert("securitySchemes".into(), schemes.clone());
    }

    let mut out = Map::new();
    out.insert("openapi".into(), copy_or(doc, "openapi", json!("3.0.0")));
    common_keys(doc, &mut out);
    out.insert("components".into(), Value::Object(components));
    out
}

/// Collects every definition reachable from `paths`, following references inside the
/// definitions themselves.
fn referenced_definitions(
    paths: &Map<String, Value>,
    definitions: &Map<String, Value>,
) -> Map<String, Value> {
    let mut pending = Vec::new();
    for item in paths.values() {
        collect_ref_names(item, &mut pending);
    }

    let mut seen = HashSet::new();
    let mut out = Map::new();
    while let Some(name) = pending.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(schema) = definitions.get(&name) {
            collect_ref_names(schema, &mut pending);
            out.insert(name, schema.clone());
        }
    }
    out
}

/// Pushes the target name (last path segment) of every `$ref` found under `value`.
fn collect_ref_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if let Some(name) = reference.rsplit('/').next().filter(|n| !n.is_empty()) {
                    out.push(name.to_string());
                }
            }
            for child in map.values() {
                collect_ref_names(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_ref_names(child, out);
            }
        }
        _ => {}
    }
}
