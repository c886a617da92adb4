// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login, identity, and token refresh.

use super::{ApiError, AppState};
use crate::auth::AuthUser;
use axum::extract::State;
use axum::Json;
use mtpgw_core::audit::mask_secret;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.auth.login(&request.username, &request.password) {
        Some((token, role)) => {
            tracing::info!(user = %request.username, %role, "login");
            Ok(Json(json!({ "token": token, "role": role.to_string() })))
        }
        None => {
            tracing::warn!(
                user = %request.username,
                password = %mask_secret(&request.password),
                "login rejected"
            );
            Err(ApiError::Unauthorized("invalid credentials".into()))
        }
    }
}

pub async fn me(user: AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "username": user.username,
        "role": user.role.to_string(),
        "permissions": user.role.permissions(),
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = state
        .auth
        .issue(&user.username, user.role)
        .ok_or_else(|| ApiError::Internal("failed to issue token".into()))?;
    Ok(Json(json!({ "token": token, "role": user.role.to_string() })))
}
