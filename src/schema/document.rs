//! Compiled schema document and operation table.
//!
//! # Responsibilities
//! - Hold the raw document (with `host`/`basePath` already patched)
//! - Compile `paths` into an ordered operation table at load time
//! - Match a method + request path against the table
//! - Resolve local `$ref` pointers for the validator
//!
//! # Design Decisions
//! - Immutable after construction; shared behind `Arc`
//! - Literal path segments win over templated ones
//! - Path segments are percent-decoded before comparison and capture
//! - Operation-level parameters override path-level ones by (name, in)

use axum::http::Method;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::schema::loader::LoadError;

/// Vendor extension naming the controller that owns an operation.
pub const ROUTER_CONTROLLER_EXT: &str = "x-swagger-router-controller";

const METHODS: [(&str, Method); 7] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
    ("patch", Method::PATCH),
];

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl ParameterLocation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "body" => Some(Self::Body),
            "formData" => Some(Self::FormData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::FormData => "formData",
        }
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// For body parameters the `schema` object, otherwise the parameter
    /// object itself (it carries `type`, `enum`, `items`).
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One method on one path template.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: Method,
    pub template: String,
    pub operation_id: Option<String>,
    pub controller: Option<String>,
    pub parameters: Vec<Parameter>,
    segments: Vec<Segment>,
}

impl Operation {
    /// Name under which the controller registry holds this operation's handler.
    pub fn handler_name(&self) -> Option<String> {
        let operation_id = self.operation_id.as_ref()?;
        Some(match &self.controller {
            Some(controller) => format!("{controller}_{operation_id}"),
            None => operation_id.clone(),
        })
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            // malformed UTF-8 after decoding matches nothing
            let part = percent_decode_str(part).decode_utf8().ok()?;
            match segment {
                Segment::Literal(lit) if *lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => params.push((name.clone(), part.into_owned())),
            }
        }
        Some(params)
    }
}

/// Schema-derived metadata for a matched request.
#[derive(Debug, Clone)]
pub struct OperationMatch<'a> {
    pub operation: &'a Operation,
    pub path_params: Vec<(String, String)>,
}

/// The API description, patched and compiled.
#[derive(Debug)]
pub struct SchemaDocument {
    raw: Value,
    host: String,
    base_path: String,
    operations: Vec<Operation>,
}

impl SchemaDocument {
    /// Patch `host`/`basePath` into a parsed document and compile its operations.
    pub fn from_value(mut raw: Value, host: &str, base_path: &str) -> Result<Self, LoadError> {
        let root = raw.as_object_mut().ok_or(LoadError::NotAMapping)?;
        root.insert("host".to_string(), Value::String(host.to_string()));
        root.insert("basePath".to_string(), Value::String(base_path.to_string()));

        let operations = compile_operations(&raw)?;

        Ok(Self {
            raw,
            host: host.to_string(),
            base_path: base_path.to_string(),
            operations,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Strip the base path from a request path, if the request is under it.
    pub fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        let base = self.base_path.trim_end_matches('/');
        if base.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(base)?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Find the operation declared for this method and absolute request path.
    pub fn match_request(&self, method: &Method, path: &str) -> Option<OperationMatch<'_>> {
        let relative = self.relative_path(path)?;
        self.operations
            .iter()
            .filter(|op| op.method == *method)
            .find_map(|op| {
                op.match_path(relative).map(|path_params| OperationMatch {
                    operation: op,
                    path_params,
                })
            })
    }

    /// Follow `$ref` pointers (local JSON pointers only) until a concrete schema.
    ///
    /// Unresolvable references yield `None`.
    pub fn resolve<'a>(&'a self, mut schema: &'a Value) -> Option<&'a Value> {
        for _ in 0..32 {
            match schema.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    let pointer = reference.strip_prefix('#')?;
                    schema = self.raw.pointer(pointer)?;
                }
                None => return Some(schema),
            }
        }
        None
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

fn parse_template(template: &str) -> Vec<Segment> {
    split_path(template)
        .into_iter()
        .map(|part| {
            match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(part.to_string()),
            }
        })
        .collect()
}

fn compile_operations(raw: &Value) -> Result<Vec<Operation>, LoadError> {
    let paths = match raw.get("paths") {
        None => return Ok(Vec::new()),
        Some(Value::Object(paths)) => paths,
        Some(_) => return Err(LoadError::Invalid("'paths' must be a mapping".into())),
    };

    let mut operations = Vec::new();
    for (template, item) in paths {
        let item = item.as_object().ok_or_else(|| {
            LoadError::Invalid(format!("path item '{template}' must be a mapping"))
        })?;
        let shared = parse_parameters(raw, item.get("parameters"), template)?;
        let segments = parse_template(template);

        for (key, method) in METHODS.iter() {
            let Some(op) = item.get(*key) else { continue };
            let own = parse_parameters(raw, op.get("parameters"), template)?;

            let mut parameters = shared.clone();
            for param in own {
                parameters.retain(|p| !(p.name == param.name && p.location == param.location));
                parameters.push(param);
            }

            let controller = op
                .get(ROUTER_CONTROLLER_EXT)
                .or_else(|| item.get(ROUTER_CONTROLLER_EXT))
                .and_then(Value::as_str)
                .map(str::to_string);

            operations.push(Operation {
                method: method.clone(),
                template: template.clone(),
                operation_id: op.get("operationId").and_then(Value::as_str).map(str::to_string),
                controller,
                parameters,
                segments: segments.clone(),
            });
        }
    }

    // stable sort; `paths` is a sorted map, so equally specific templates
    // are tried in lexicographic order
    operations.sort_by_key(|op| std::cmp::Reverse(op.literal_count()));
    Ok(operations)
}

fn parse_parameters(
    root: &Value,
    list: Option<&Value>,
    template: &str,
) -> Result<Vec<Parameter>, LoadError> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let list = list.as_array().ok_or_else(|| {
        LoadError::Invalid(format!("parameters of '{template}' must be a list"))
    })?;

    let mut parameters = Vec::with_capacity(list.len());
    for entry in list {
        let entry = match entry.get("$ref").and_then(Value::as_str) {
            Some(reference) => reference
                .strip_prefix('#')
                .and_then(|pointer| root.pointer(pointer))
                .ok_or_else(|| LoadError::Invalid(format!("unresolved reference '{reference}'")))?,
            None => entry,
        };
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| LoadError::Invalid(format!("parameter without name in '{template}'")))?;
        let location = entry
            .get("in")
            .and_then(Value::as_str)
            .and_then(ParameterLocation::parse)
            .ok_or_else(|| {
                LoadError::Invalid(format!("parameter '{name}' has no valid 'in' in '{template}'"))
            })?;
        let required = location == ParameterLocation::Path
            || entry.get("required").and_then(Value::as_bool).unwrap_or(false);
        let schema = match location {
            ParameterLocation::Body => entry.get("schema").cloned().unwrap_or(Value::Null),
            _ => entry.clone(),
        };
        parameters.push(Parameter {
            name: name.to_string(),
            location,
            required,
            schema,
        });
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> SchemaDocument {
        let raw = json!({
            "swagger": "2.0",
            "host": "placeholder",
            "basePath": "/placeholder",
            "paths": {
                "/movies/{id}": {
                    "parameters": [{"name": "id", "in": "path", "type": "integer"}],
                    "get": {"operationId": "getMovie"},
                    "delete": {
                        "operationId": "deleteMovie",
                        "x-swagger-router-controller": "movies"
                    }
                },
                "/movies/featured": {
                    "get": {"operationId": "featuredMovies"}
                },
                "/movies": {
                    "get": {
                        "operationId": "listMovies",
                        "parameters": [{"$ref": "#/parameters/limit"}]
                    }
                }
            },
            "parameters": {
                "limit": {"name": "limit", "in": "query", "type": "integer"}
            }
        });
        SchemaDocument::from_value(raw, "movies.test", "/api").unwrap()
    }

    #[test]
    fn host_and_base_path_are_overwritten() {
        let doc = document();
        assert_eq!(doc.raw()["host"], "movies.test");
        assert_eq!(doc.raw()["basePath"], "/api");
        assert_eq!(doc.base_path(), "/api");
    }

    #[test]
    fn matches_templates_under_base_path() {
        let doc = document();
        let m = doc.match_request(&Method::GET, "/api/movies/42").unwrap();
        assert_eq!(m.operation.operation_id.as_deref(), Some("getMovie"));
        assert_eq!(m.path_params, vec![("id".to_string(), "42".to_string())]);

        assert!(doc.match_request(&Method::GET, "/movies/42").is_none());
        assert!(doc.match_request(&Method::PUT, "/api/movies/42").is_none());
        assert!(doc.match_request(&Method::GET, "/apimovies").is_none());
    }

    #[test]
    fn path_segments_are_percent_decoded() {
        let doc = document();
        let m = doc.match_request(&Method::GET, "/api/movies/a%20b").unwrap();
        assert_eq!(m.path_params, vec![("id".to_string(), "a b".to_string())]);

        let m = doc.match_request(&Method::GET, "/api/movies/%66eatured").unwrap();
        assert_eq!(m.operation.operation_id.as_deref(), Some("featuredMovies"));

        let m = doc.match_request(&Method::GET, "/api/movies/x%2Fy").unwrap();
        assert_eq!(m.path_params[0].1, "x/y");

        assert!(doc.match_request(&Method::GET, "/api/movies/%FF").is_none());
    }

    #[test]
    fn literal_segments_win() {
        let doc = document();
        let m = doc.match_request(&Method::GET, "/api/movies/featured").unwrap();
        assert_eq!(m.operation.operation_id.as_deref(), Some("featuredMovies"));
    }

    #[test]
    fn path_level_parameters_are_inherited() {
        let doc = document();
        let m = doc.match_request(&Method::DELETE, "/api/movies/1").unwrap();
        assert_eq!(m.operation.parameters.len(), 1);
        assert!(m.operation.parameters[0].required);
    }

    #[test]
    fn parameter_refs_are_resolved() {
        let doc = document();
        let m = doc.match_request(&Method::GET, "/api/movies").unwrap();
        assert_eq!(m.operation.parameters[0].name, "limit");
        assert_eq!(m.operation.parameters[0].location, ParameterLocation::Query);
    }

    #[test]
    fn handler_name_uses_router_controller() {
        let doc = document();
        let del = doc.match_request(&Method::DELETE, "/api/movies/1").unwrap();
        assert_eq!(del.operation.handler_name().as_deref(), Some("movies_deleteMovie"));
        let get = doc.match_request(&Method::GET, "/api/movies/1").unwrap();
        assert_eq!(get.operation.handler_name().as_deref(), Some("getMovie"));
    }

    #[test]
    fn empty_base_path_matches_root() {
        let raw = json!({"paths": {"/ping": {"get": {"operationId": "ping"}}}});
        let doc = SchemaDocument::from_value(raw, "h", "").unwrap();
        assert!(doc.match_request(&Method::GET, "/ping").is_some());
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        let err = SchemaDocument::from_value(json!([1, 2]), "h", "/b").unwrap_err();
        assert!(matches!(err, LoadError::NotAMapping));
    }

    #[test]
    fn resolves_definitions() {
        let raw = json!({
            "definitions": {"Movie": {"type": "object"}},
            "paths": {}
        });
        let doc = SchemaDocument::from_value(raw, "h", "").unwrap();
        let movie = json!({"$ref": "#/definitions/Movie"});
        let resolved = doc.resolve(&movie).unwrap();
        assert_eq!(resolved["type"], "object");

        let missing = json!({"$ref": "#/definitions/Nope"});
        assert!(doc.resolve(&missing).is_none());

        let inline = json!({"type": "string"});
        assert_eq!(doc.resolve(&inline), Some(&inline));
    }
}
