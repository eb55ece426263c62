//! Schema documentation endpoints.
//!
//! `GET {basePath}/api-docs` returns the patched schema as JSON;
//! `GET {basePath}/docs` returns a browser page rendering it.

use axum::{
    http::Method,
    response::{Html, IntoResponse, Json, Response},
};

use crate::schema::SchemaDocument;

const DOCS_PAGE: &str = include_str!("../assets/docs.html");

/// Serve a documentation resource if `path` names one.
pub fn serve(schema: &SchemaDocument, method: &Method, path: &str) -> Option<Response> {
    if method != Method::GET && method != Method::HEAD {
        return None;
    }
    match schema.relative_path(path)? {
        "/api-docs" => Some(Json(schema.raw().clone()).into_response()),
        "/docs" | "/docs/" => Some(docs_page(schema).into_response()),
        _ => None,
    }
}

fn docs_page(schema: &SchemaDocument) -> Html<String> {
    let url = format!("{}/api-docs", schema.base_path().trim_end_matches('/'));
    Html(DOCS_PAGE.replace("{{api_docs_url}}", &url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn schema() -> SchemaDocument {
        let raw = json!({"swagger": "2.0", "info": {"title": "t", "version": "1"}, "paths": {}});
        SchemaDocument::from_value(raw, "api.example.org", "/api/v1").unwrap()
    }

    #[tokio::test]
    async fn api_docs_returns_patched_schema() {
        let response = serve(&schema(), &Method::GET, "/api/v1/api-docs").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["host"], "api.example.org");
        assert_eq!(body["basePath"], "/api/v1");
    }

    #[tokio::test]
    async fn docs_page_points_at_api_docs() {
        let response = serve(&schema(), &Method::GET, "/api/v1/docs/").unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("\"/api/v1/api-docs\""));
    }

    #[test]
    fn other_paths_and_methods_fall_through() {
        let schema = schema();
        assert!(serve(&schema, &Method::GET, "/api-docs").is_none());
        assert!(serve(&schema, &Method::GET, "/api/v1/docsx").is_none());
        assert!(serve(&schema, &Method::POST, "/api/v1/api-docs").is_none());
    }
}
