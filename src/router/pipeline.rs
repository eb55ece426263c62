//! Per-request pipeline behind the CORS and session layers.
//!
//! ```text
//! match operation ──no──────────────────────────────┐
//!     │ yes                                          │
//! read body (bounded) → validate ──Err──→ envelope   │
//!     │ Ok                                           │
//! controller registered? ──no───────────────────────┤
//!     │ yes                                          ▼
//! dispatch ──Err / panic──→ fault 500          docs → static files
//!     │ Ok
//! controller response, unmodified
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::RouterConfig;
use crate::controllers::{ControllerRegistry, OperationRequest};
use crate::http::{request, response};
use crate::observability::metrics;
use crate::router::docs;
use crate::schema::{self, OperationMatch, RequestInput, SchemaDocument};
use crate::session::Session;

#[derive(Clone)]
pub(crate) struct PipelineState {
    pub schema: Arc<SchemaDocument>,
    pub controllers: Arc<ControllerRegistry>,
    pub config: Arc<RouterConfig>,
    pub static_files: ServeDir,
}

enum Outcome {
    Handled { label: String, response: Response },
    Unhandled(Request),
}

pub(crate) async fn handle(State(state): State<PipelineState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request = match run_operation(&state, request).await {
        Outcome::Handled { label, response } => {
            metrics::record_request(method.as_str(), response.status().as_u16(), &label, start);
            return response;
        }
        Outcome::Unhandled(request) => request,
    };

    if let Some(response) = docs::serve(&state.schema, &method, &path) {
        metrics::record_request(method.as_str(), response.status().as_u16(), "docs", start);
        return response;
    }

    let response = serve_static(state.static_files, request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), "static", start);
    response
}

async fn run_operation(state: &PipelineState, request: Request) -> Outcome {
    let Some(matched) = state
        .schema
        .match_request(request.method(), request.uri().path())
    else {
        return Outcome::Unhandled(request);
    };
    let operation = matched.operation;
    let handler = operation.handler_name();
    let label = handler.clone().unwrap_or_else(|| operation.template.clone());

    let (parts, body) = request.into_parts();
    let limit = state.config.max_body_bytes;
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(operation = %label, error = %e, "Request body rejected");
            return Outcome::Handled {
                label,
                response: response::body_too_large(limit),
            };
        }
    };

    let query = query_pairs(&parts);
    let input = RequestInput {
        path_params: &matched.path_params,
        query: &query,
        headers: &parts.headers,
        body: &bytes,
    };
    let validated = match schema::validate(&state.schema, operation, &input) {
        Ok(validated) => validated,
        Err(err) => {
            tracing::debug!(
                operation = %label,
                violations = ?err.violations,
                "Request failed validation"
            );
            metrics::record_validation_failure(&label);
            let response = response::validation_failure(&err, state.config.detailed_validation_errors);
            return Outcome::Handled { label, response };
        }
    };

    let Some(controller) = handler.as_deref().and_then(|name| state.controllers.get(name)) else {
        tracing::debug!(operation = %label, "No controller registered; falling through");
        return Outcome::Unhandled(Request::from_parts(parts, Body::from(bytes)));
    };

    let op_request = operation_request(&matched, &parts, validated);
    let request_id = op_request.request_id.clone().unwrap_or_default();
    let result = AssertUnwindSafe(controller.handle(op_request))
        .catch_unwind()
        .await;

    let expose = state.config.expose_fault_details;
    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, operation = %label, error = %e, "Controller failed");
            response::fault(&e.to_string(), expose)
        }
        Err(payload) => {
            let message = response::panic_message(payload.as_ref());
            tracing::error!(request_id = %request_id, operation = %label, panic = %message, "Controller panicked");
            response::fault(&message, expose)
        }
    };
    Outcome::Handled { label, response }
}

fn operation_request(
    matched: &OperationMatch<'_>,
    parts: &Parts,
    validated: schema::ValidatedParams,
) -> OperationRequest {
    OperationRequest {
        operation_id: matched.operation.operation_id.clone().unwrap_or_default(),
        template: matched.operation.template.clone(),
        params: validated.values,
        body: validated.body,
        session: parts.extensions.get::<Session>().cloned(),
        request_id: request::request_id(&parts.headers).map(str::to_string),
    }
}

fn query_pairs(parts: &Parts) -> Vec<(String, String)> {
    parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

async fn serve_static(files: ServeDir, request: Request) -> Response {
    match files.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
