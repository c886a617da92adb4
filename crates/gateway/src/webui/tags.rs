// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag listing, reads, and gated writes.

use super::{ApiError, AppState};
use crate::auth::AuthUser;
use axum::extract::{Path, State};
use axum::Json;
use mtpgw_core::tag::Value;
use mtpgw_engine::TagSnapshot;
use serde::Deserialize;
use serde_json::json;

fn tag_json(snapshot: &TagSnapshot) -> serde_json::Value {
    json!({
        "name": snapshot.definition.name,
        "connector": snapshot.definition.connector,
        "address": snapshot.definition.address,
        "datatype": snapshot.definition.datatype.to_string(),
        "writable": snapshot.definition.writable,
        "unit": snapshot.definition.unit,
        "description": snapshot.definition.description,
        "value": snapshot.current_value.as_ref().map(|v| v.value.clone()),
        "quality": snapshot.quality.to_string(),
        "timestamp": snapshot.current_value.as_ref().map(|v| v.timestamp.to_rfc3339()),
        "read_count": snapshot.read_count,
        "write_count": snapshot.write_count,
        "error_count": snapshot.error_count,
    })
}

pub async fn list_tags(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("tags:read")?;
    let tags: Vec<serde_json::Value> = state.tag_manager.all_tags().iter().map(tag_json).collect();
    Ok(Json(json!({ "tags": tags })))
}

pub async fn get_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("tags:read")?;
    let snapshot = state
        .tag_manager
        .get_tag(&name)
        .ok_or_else(|| ApiError::NotFound(format!("tag '{name}' not found")))?;
    Ok(Json(tag_json(&snapshot)))
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub value: Value,
}

pub async fn write_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("tags:write")?;
    let snapshot = state
        .tag_manager
        .get_tag(&name)
        .ok_or_else(|| ApiError::NotFound(format!("tag '{name}' not found")))?;
    if !snapshot.definition.writable {
        return Err(ApiError::BadRequest(format!("tag '{name}' is not writable")));
    }

    let success = state.tag_manager.write_tag(&name, request.value).await;
    if success {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(ApiError::BadRequest(format!("write to '{name}' refused")))
    }
}
