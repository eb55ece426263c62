//! Controllers for the `movies` router-controller.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::controllers::{ControllerRegistry, HandlerError, OperationRequest};
use crate::services::{MovieError, MovieQuery, MovieService, NewMovie};

/// Value of `x-swagger-router-controller` these handlers are declared under.
pub const CONTROLLER: &str = "movies";

/// Register every movies handler.
pub fn register(registry: &mut ControllerRegistry, service: Arc<MovieService>) {
    let svc = Arc::clone(&service);
    registry.register(handler("listMovies"), move |req: OperationRequest| {
        let svc = Arc::clone(&svc);
        async move { list_movies(&svc, req) }
    });

    let svc = Arc::clone(&service);
    registry.register(handler("getMovie"), move |req: OperationRequest| {
        let svc = Arc::clone(&svc);
        async move { get_movie(&svc, req).await }
    });

    let svc = Arc::clone(&service);
    registry.register(handler("createMovie"), move |req: OperationRequest| {
        let svc = Arc::clone(&svc);
        async move { create_movie(&svc, req).await }
    });

    let svc = service;
    registry.register(handler("deleteMovie"), move |req: OperationRequest| {
        let svc = Arc::clone(&svc);
        async move { delete_movie(&svc, req).await }
    });
}

fn handler(operation_id: &str) -> String {
    format!("{CONTROLLER}_{operation_id}")
}

fn list_movies(service: &MovieService, req: OperationRequest) -> Result<Response, HandlerError> {
    let genre = req
        .param("genre")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?;
    let limit = req
        .param("limit")
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    let movies = service.list(MovieQuery { genre, limit });
    Ok(Json(movies).into_response())
}

async fn get_movie(service: &MovieService, req: OperationRequest) -> Result<Response, HandlerError> {
    let id = req.param_str("id").unwrap_or_default();
    match service.get(id).await? {
        Some(movie) => Ok(Json(movie).into_response()),
        None => Ok(not_found(id)),
    }
}

async fn create_movie(
    service: &MovieService,
    req: OperationRequest,
) -> Result<Response, HandlerError> {
    let body = req.body.clone().unwrap_or(Value::Null);
    let new: NewMovie = serde_json::from_value(body)?;

    match service.create(new).await {
        Ok(movie) => {
            if let Some(session) = &req.session {
                session.insert("last_created", json!(movie.id));
            }
            Ok((StatusCode::CREATED, Json(movie)).into_response())
        }
        Err(MovieError::Duplicate { title }) => Ok((
            StatusCode::CONFLICT,
            Json(json!({ "message": format!("movie '{title}' already exists") })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn delete_movie(
    service: &MovieService,
    req: OperationRequest,
) -> Result<Response, HandlerError> {
    let id = req.param_str("id").unwrap_or_default();
    if service.delete(id).await {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(not_found(id))
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("movie '{id}' not found") })),
    )
        .into_response()
}
