//! Permissive cross-origin headers.
//!
//! Preflight (`OPTIONS`) requests are answered here with an empty 200 and
//! never reach session handling, validation or dispatch. Every other
//! response gets the same header set, whatever its status.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, OPTIONS, PUT, PATCH, DELETE";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, Content-Length, X-Requested-With";
const ALLOW_CREDENTIALS: &str = "true";

pub async fn cors_middleware(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        tracing::trace!(path = %request.uri().path(), "Preflight answered");
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    apply_headers(response.headers_mut());
    response
}

fn apply_headers(headers: &mut HeaderMap) {
    let pairs = [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN),
        (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
        (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, ALLOW_CREDENTIALS),
    ];
    for (name, value) in pairs {
        headers.insert(name, HeaderValue::from_static(value));
    }
}
