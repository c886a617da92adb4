// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm listing and lifecycle actions.

use super::{ApiError, AppState};
use crate::auth::AuthUser;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use mtpgw_core::alarm::{Alarm, AlarmState};
use mtpgw_storage::AlarmFilter;
use serde::Deserialize;
use serde_json::json;

fn alarm_json(alarm: &Alarm) -> serde_json::Value {
    json!({
        "id": alarm.id,
        "alarm_id": alarm.alarm_id,
        "source": alarm.source,
        "priority": alarm.priority,
        "state": alarm.state.to_string(),
        "message": alarm.message,
        "value": alarm.value,
        "raised_at": alarm.raised_at.to_rfc3339(),
        "acknowledged_at": alarm.acknowledged_at.map(|t| t.to_rfc3339()),
        "acknowledged_by": alarm.acknowledged_by,
        "cleared_at": alarm.cleared_at.map(|t| t.to_rfc3339()),
        "shelved_until": alarm.shelved_until.map(|t| t.to_rfc3339()),
    })
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_alarms(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("alarms:read")?;

    let state_filter = match query.state.as_deref() {
        None => None,
        Some("active") => Some(AlarmState::Active),
        Some("acknowledged") => Some(AlarmState::Acknowledged),
        Some("cleared") => Some(AlarmState::Cleared),
        Some("shelved") => Some(AlarmState::Shelved),
        Some(other) => {
            return Err(ApiError::BadRequest(format!("unknown alarm state '{other}'")))
        }
    };

    let alarms = state.alarms.list(&AlarmFilter {
        state: state_filter,
        source: query.source,
        from: None,
        to: None,
        limit: query.limit,
    })?;
    Ok(Json(json!({ "alarms": alarms.iter().map(alarm_json).collect::<Vec<_>>() })))
}

pub async fn get_alarm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("alarms:read")?;
    let alarm = state.alarms.get(id)?;
    Ok(Json(alarm_json(&alarm)))
}

pub async fn acknowledge(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("alarms:ack")?;
    let alarm = state.alarms.acknowledge(id, &user.username, Utc::now())?;
    Ok(Json(alarm_json(&alarm)))
}

pub async fn clear(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("alarms:ack")?;
    let alarm = state.alarms.clear(id, Utc::now())?;
    Ok(Json(alarm_json(&alarm)))
}

#[derive(Debug, Deserialize)]
pub struct ShelveRequest {
    #[serde(default = "default_shelve_minutes")]
    pub minutes: i64,
}

fn default_shelve_minutes() -> i64 {
    30
}

pub async fn shelve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<ShelveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("alarms:shelve")?;
    if request.minutes <= 0 {
        return Err(ApiError::BadRequest("shelve minutes must be positive".into()));
    }
    let until = Utc::now() + Duration::minutes(request.minutes);
    let alarm = state.alarms.shelve(id, until)?;
    Ok(Json(alarm_json(&alarm)))
}
