//! Request pipeline behavior, exercised in-process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use movies_server::controllers::{ControllerRegistry, HandlerError, OperationRequest};
use movies_server::http::X_REQUEST_ID;
use movies_server::session::{MemoryStore, SessionStore};

mod common;
use common::{body_bytes, body_json, get, json_request, send, BASE};

/// Controllers that count calls and misbehave on purpose.
fn controllers(calls: &Arc<AtomicUsize>) -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();

    let counter = Arc::clone(calls);
    registry.register("movies_createMovie", move |req: OperationRequest| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let title = req.body.as_ref().and_then(|b| b["title"].as_str()).unwrap_or_default().to_string();
            let response = (
                StatusCode::IM_A_TEAPOT,
                [("x-controller", "createMovie")],
                format!("brewed {title}"),
            )
                .into_response();
            Ok::<_, HandlerError>(response)
        }
    });

    let counter = Arc::clone(calls);
    registry.register("movies_getMovie", move |_req: OperationRequest| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Response, HandlerError>("db exploded".into())
        }
    });

    registry.register("movies_deleteMovie", |req: OperationRequest| async move {
        if req.param_str("id") == Some("boom") {
            panic!("controller blew up");
        }
        let id = req.param_str("id").unwrap_or_default().to_string();
        Ok::<_, HandlerError>((StatusCode::NO_CONTENT, [("x-deleted-id", id)]).into_response())
    });

    registry
}

struct Harness {
    app: axum::Router,
    calls: Arc<AtomicUsize>,
    _static_dir: tempfile::TempDir,
}

async fn harness_with(configure: impl FnOnce(&mut movies_server::ServerConfig)) -> Harness {
    let static_dir = tempfile::tempdir().unwrap();
    common::static_site(static_dir.path());
    let mut config = common::test_config(static_dir.path());
    configure(&mut config);

    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app(&config, controllers(&calls)).await;
    Harness {
        app,
        calls,
        _static_dir: static_dir,
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

#[tokio::test]
async fn missing_required_body_field_is_rejected_before_dispatch() {
    let h = harness().await;
    let request = json_request("POST", &format!("{BASE}/movies"), &json!({"year": 1999}));
    let response = send(&h.app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"error": true}));
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_types_and_enums_are_rejected() {
    let h = harness().await;
    let bodies = [
        json!({"title": 42}),
        json!({"title": "Heat", "year": "nineteen"}),
        json!({"title": "Heat", "genre": "western"}),
    ];
    for body in bodies {
        let response = send(&h.app, json_request("POST", &format!("{BASE}/movies"), &body)).await;
        assert_eq!(body_json(response).await, json!({"error": true}), "body {body}");
    }

    let response = send(&h.app, get(&format!("{BASE}/movies?genre=western"))).await;
    assert_eq!(body_json(response).await, json!({"error": true}));

    let response = send(&h.app, get(&format!("{BASE}/movies?limit=ten"))).await;
    assert_eq!(body_json(response).await, json!({"error": true}));

    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_json_is_a_validation_failure() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{BASE}/movies"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(body_json(response).await, json!({"error": true}));
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_request_returns_controller_response_unmodified() {
    let h = harness().await;
    let body = json!({"title": "Heat", "year": 1995, "genre": "action"});
    let response = send(&h.app, json_request("POST", &format!("{BASE}/movies"), &body)).await;

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-controller"], "createMovie");
    assert_eq!(body_bytes(response).await, b"brewed Heat");
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn options_short_circuits_everything() {
    let h = harness().await;
    for uri in [format!("{BASE}/movies"), "/nowhere".to_string(), format!("{BASE}/docs")] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(&uri)
            .body(Body::from("{\"garbage\": true}"))
            .unwrap();
        let response = send(&h.app, request).await;

        assert_eq!(response.status(), StatusCode::OK, "uri {uri}");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_bytes(response).await.is_empty());
    }
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cors_headers_on_every_outcome() {
    let h = harness().await;
    let responses = [
        send(&h.app, json_request("POST", &format!("{BASE}/movies"), &json!({}))).await,
        send(&h.app, get(&format!("{BASE}/movies/1"))).await,
        send(&h.app, get("/missing.txt")).await,
        send(&h.app, get(&format!("{BASE}/api-docs"))).await,
    ];
    for response in responses {
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS, PUT, PATCH, DELETE"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}

#[tokio::test]
async fn controller_error_becomes_500_with_raw_text() {
    let h = harness().await;
    let response = send(&h.app, get(&format!("{BASE}/movies/42"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(response).await, b"db exploded");
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn controller_panic_becomes_500() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("{BASE}/movies/boom"))
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(response).await, b"controller blew up");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("{BASE}/movies/fine"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.app, request).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn encoded_path_parameters_reach_the_controller_decoded() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("{BASE}/movies/a%20b%2Fc"))
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["x-deleted-id"], "a b/c");
}

#[tokio::test]
async fn hidden_fault_details() {
    let h = harness_with(|c| c.router.expose_fault_details = false).await;
    let response = send(&h.app, get(&format!("{BASE}/movies/42"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_bytes(response).await, b"Internal Server Error");
}

#[tokio::test]
async fn detailed_validation_errors() {
    let h = harness_with(|c| c.router.detailed_validation_errors = true).await;
    let response = send(&h.app, json_request("POST", &format!("{BASE}/movies"), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(!body["details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn docs_served_under_base_path() {
    let h = harness().await;

    let response = send(&h.app, get(&format!("{BASE}/api-docs"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(doc["host"], "localhost:8080");
    assert_eq!(doc["basePath"], BASE);
    assert!(doc["paths"]["/movies"].is_object());

    let response = send(&h.app, get(&format!("{BASE}/docs"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/api/v1/api-docs"));

    let response = send(&h.app, get("/api-docs")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unregistered_operation_falls_through() {
    let h = harness().await;
    // listMovies has no controller in this harness
    let response = send(&h.app, get(&format!("{BASE}/movies"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn static_files_served_last() {
    let h = harness().await;
    let response = send(&h.app, get("/index.html")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>movies</h1>");

    let response = send(&h.app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = harness_with(|c| c.router.max_body_bytes = 16).await;
    let body = json!({"title": "A title well beyond sixteen bytes"});
    let response = send(&h.app, json_request("POST", &format!("{BASE}/movies"), &body)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_cookie_issued_once() {
    let h = harness().await;
    let response = send(&h.app, get("/index.html")).await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));

    let token = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/index.html")
        .header(header::COOKIE, &token)
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn request_id_is_assigned_and_echoed() {
    let h = harness().await;
    let response = send(&h.app, get("/index.html")).await;
    assert!(response.headers().get(X_REQUEST_ID).is_some());

    let request = Request::builder()
        .uri("/index.html")
        .header(X_REQUEST_ID, "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(response.headers()[X_REQUEST_ID], "trace-me");
}

#[tokio::test]
async fn cookieless_sessions_are_reclaimed_once_expired() {
    let static_dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(static_dir.path());
    config.session.max_age_secs = 0;

    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let app = common::app_with_store(
        &config,
        controllers(&calls),
        Arc::clone(&store) as Arc<dyn SessionStore>,
    )
    .await;

    for _ in 0..50 {
        send(&app, get("/nothing")).await;
    }
    assert_eq!(store.len(), 50);

    assert_eq!(store.purge_expired().await.unwrap(), 50);
    assert!(store.is_empty());
}

#[tokio::test]
async fn timed_out_requests_still_carry_cors_headers() {
    let static_dir = tempfile::tempdir().unwrap();
    let config = common::test_config(static_dir.path());
    let document = movies_server::schema::load(&common::schema_path(), &config)
        .await
        .unwrap();

    let mut controllers = ControllerRegistry::new();
    controllers.register("movies_getMovie", |_req: OperationRequest| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, HandlerError>(StatusCode::OK.into_response())
    });

    let app = movies_server::RequestRouter::new(
        Arc::new(document),
        Arc::new(controllers),
        config.router.clone(),
    )
    .with_timeout(Duration::from_millis(50))
    .into_router();

    let response = send(&app, get(&format!("{BASE}/movies/slow"))).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
