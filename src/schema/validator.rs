//! Request validation against a matched operation.
//!
//! # Responsibilities
//! - Check presence of required parameters
//! - Coerce string-carried parameters (path, query, header, form) to their
//!   declared type
//! - Check declared types and enum membership, recursing into body schemas
//!
//! # Design Decisions
//! - Pure function returning `Result`; the router decides what to answer
//! - Every violation is collected, not just the first
//! - Unknown `type` values and unresolvable `$ref`s are accepted as-is

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::schema::document::{Operation, ParameterLocation, SchemaDocument};

const MAX_DEPTH: usize = 64;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Location of the offending value, e.g. `body.title` or `query.limit`.
    pub path: String,
    pub message: String,
}

/// A request that does not satisfy its operation's declared parameters.
#[derive(Debug, Clone, thiserror::Error)]
#[error("request validation failed for {operation}: {} violation(s)", .violations.len())]
pub struct ValidationError {
    pub operation: String,
    pub violations: Vec<Violation>,
}

/// Raw request pieces the validator inspects.
#[derive(Debug, Clone, Copy)]
pub struct RequestInput<'a> {
    pub path_params: &'a [(String, String)],
    pub query: &'a [(String, String)],
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Parameter values after coercion, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct ValidatedParams {
    pub values: Map<String, Value>,
    pub body: Option<Value>,
}

/// Validate `input` against `operation`.
pub fn validate(
    doc: &SchemaDocument,
    operation: &Operation,
    input: &RequestInput<'_>,
) -> Result<ValidatedParams, ValidationError> {
    let mut violations = Vec::new();
    let mut validated = ValidatedParams::default();
    let mut form: Option<Vec<(String, String)>> = None;

    for param in &operation.parameters {
        let label = format!("{}.{}", param.location.as_str(), param.name);

        if param.location == ParameterLocation::Body {
            let body = match parse_body(input.body) {
                Ok(body) => body,
                Err(message) => {
                    violations.push(Violation { path: label, message });
                    continue;
                }
            };
            match body {
                None if param.required => violations.push(Violation {
                    path: label,
                    message: "missing required body".into(),
                }),
                None => {}
                Some(value) => {
                    check_value(doc, &param.schema, &value, "body", 0, &mut violations);
                    validated.values.insert(param.name.clone(), value.clone());
                    validated.body = Some(value);
                }
            }
            continue;
        }

        let raw: Vec<String> = match param.location {
            ParameterLocation::Path => lookup(input.path_params, &param.name),
            ParameterLocation::Query => lookup(input.query, &param.name),
            ParameterLocation::Header => input
                .headers
                .get_all(param.name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect(),
            ParameterLocation::FormData => {
                let pairs = form.get_or_insert_with(|| {
                    url::form_urlencoded::parse(input.body).into_owned().collect()
                });
                lookup(pairs, &param.name)
            }
            ParameterLocation::Body => continue,
        };

        if raw.is_empty() {
            if param.required {
                violations.push(Violation {
                    path: label,
                    message: "missing required parameter".into(),
                });
            } else if let Some(default) = param.schema.get("default") {
                validated.values.insert(param.name.clone(), default.clone());
            }
            continue;
        }

        match coerce(&raw, &param.schema) {
            Ok(value) => {
                check_value(doc, &param.schema, &value, &label, 0, &mut violations);
                validated.values.insert(param.name.clone(), value);
            }
            Err(message) => violations.push(Violation { path: label, message }),
        }
    }

    if violations.is_empty() {
        Ok(validated)
    } else {
        Err(ValidationError {
            operation: operation
                .operation_id
                .clone()
                .unwrap_or_else(|| format!("{} {}", operation.method, operation.template)),
            violations,
        })
    }
}

fn lookup(pairs: &[(String, String)], name: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .collect()
}

fn parse_body(body: &[u8]) -> Result<Option<Value>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| format!("body is not valid JSON: {e}"))
}

/// Turn string-carried values into JSON according to the parameter's `type`.
fn coerce(raw: &[String], schema: &Value) -> Result<Value, String> {
    let declared = schema.get("type").and_then(Value::as_str).unwrap_or("string");
    if declared == "array" {
        let items = schema.get("items").cloned().unwrap_or(Value::Null);
        let format = schema
            .get("collectionFormat")
            .and_then(Value::as_str)
            .unwrap_or("csv");
        let separator = match format {
            "ssv" => Some(' '),
            "tsv" => Some('\t'),
            "pipes" => Some('|'),
            "multi" => None,
            _ => Some(','),
        };
        let pieces: Vec<String> = match separator {
            None => raw.to_vec(),
            Some(sep) => raw[0].split(sep).map(str::to_string).collect(),
        };
        return pieces
            .iter()
            .map(|piece| coerce(std::slice::from_ref(piece), &items))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }

    let value = &raw[0];
    match declared {
        "integer" => value
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected integer, got '{value}'")),
        "number" => value
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got '{value}'")),
        "boolean" => match value.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got '{value}'")),
        },
        _ => Ok(Value::String(value.clone())),
    }
}

fn type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "string" => value.is_string(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn check_value(
    doc: &SchemaDocument,
    schema: &Value,
    value: &Value,
    path: &str,
    depth: usize,
    out: &mut Vec<Violation>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(schema) = doc.resolve(schema) else {
        return;
    };

    if let Some(declared) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(declared, value) {
            out.push(Violation {
                path: path.to_string(),
                message: format!("expected {declared}"),
            });
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            out.push(Violation {
                path: path.to_string(),
                message: format!("value not in enum {}", Value::Array(allowed.clone())),
            });
        }
    }

    match value {
        Value::Object(fields) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !fields.contains_key(name) {
                        out.push(Violation {
                            path: format!("{path}.{name}"),
                            message: "missing required property".into(),
                        });
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (name, sub_schema) in properties {
                    if let Some(sub_value) = fields.get(name) {
                        let sub_path = format!("{path}.{name}");
                        check_value(doc, sub_schema, sub_value, &sub_path, depth + 1, out);
                    }
                }
            }
        }
        Value::Array(elements) => {
            if let Some(items) = schema.get("items") {
                for (i, element) in elements.iter().enumerate() {
                    let sub_path = format!("{path}[{i}]");
                    check_value(doc, items, element, &sub_path, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}
