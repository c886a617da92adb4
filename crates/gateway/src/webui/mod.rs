// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Web UI REST API, versioned under `/api/v1`.
//!
//! All routes (except login and the health probe) require a bearer token;
//! per-route permissions follow `resource:action`. Internal outcomes map
//! onto HTTP: 400 invalid input, 401 unauthenticated, 403 denied, 404
//! unknown, 409 state conflict, 500 internal — error bodies are
//! `{"detail": ...}`.

mod alarms;
mod auth_routes;
mod health;
mod history;
mod services;
mod tags;
mod ws_route;

use crate::auth::AuthState;
use crate::ws::WsManager;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use mtpgw_engine::{ServiceManager, TagManager};
use mtpgw_storage::{AlarmRepository, HistoryStore, StorageError};
use std::sync::Arc;
use std::time::Instant;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub tag_manager: TagManager,
    pub service_manager: ServiceManager,
    pub alarms: Arc<dyn AlarmRepository>,
    pub history: Arc<HistoryStore>,
    pub ws: Arc<WsManager>,
    pub auth: Arc<AuthState>,
    pub started_at: Instant,
}

/// API errors with their HTTP mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlarmNotFound(id) => ApiError::NotFound(format!("alarm {id} not found")),
            StorageError::Alarm(inner) => ApiError::Conflict(inner.to_string()),
            StorageError::InvalidBucket(b) => ApiError::BadRequest(format!("invalid bucket '{b}'")),
            StorageError::InvalidAggregate(a) => {
                ApiError::BadRequest(format!("invalid aggregate '{a}'"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the `/api/v1` router.
pub fn router(state: AppState) -> Router {
    let auth = Arc::clone(&state.auth);
    let api = Router::new()
        .route("/health", get(health::get_health))
        .route("/auth/login", post(auth_routes::login))
        .route("/auth/me", get(auth_routes::me))
        .route("/auth/refresh", post(auth_routes::refresh))
        .route("/tags", get(tags::list_tags))
        .route("/tags/:name", get(tags::get_tag).post(tags::write_tag))
        .route("/services", get(services::list_services))
        .route("/services/:name", get(services::get_service))
        .route("/services/:name/command", post(services::send_command))
        .route("/alarms", get(alarms::list_alarms))
        .route("/alarms/:id", get(alarms::get_alarm))
        .route("/alarms/:id/acknowledge", post(alarms::acknowledge))
        .route("/alarms/:id/clear", post(alarms::clear))
        .route("/alarms/:id/shelve", post(alarms::shelve))
        .route("/history/tags", get(history::query_single))
        .route("/history/tags/multi", get(history::query_multi))
        .route("/history/tags/available", get(history::available))
        .route("/ws", get(ws_route::upgrade))
        .with_state(state)
        .layer(Extension(auth))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    Router::new().nest("/api/v1", api)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
