// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service listing and command dispatch.

use super::{ApiError, AppState};
use crate::auth::AuthUser;
use axum::extract::{Path, State};
use axum::Json;
use mtpgw_core::packml::PackMlCommand;
use mtpgw_engine::ServiceStatus;
use serde::Deserialize;
use serde_json::json;

fn service_json(status: &ServiceStatus) -> serde_json::Value {
    json!({
        "name": status.name,
        "mode": status.mode.to_string(),
        "state": status.state.to_string(),
        "state_value": status.state.value(),
        "current_procedure_id": status.current_procedure_id,
        "execute_start_time": status.execute_start_time.map(|t| t.to_rfc3339()),
        "procedures": status.procedures.iter().map(|(id, name, is_default)| json!({
            "id": id,
            "name": name,
            "is_default": is_default,
        })).collect::<Vec<_>>(),
    })
}

pub async fn list_services(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("services:read")?;
    let services: Vec<serde_json::Value> = state
        .service_manager
        .all_statuses()
        .iter()
        .map(service_json)
        .collect();
    Ok(Json(json!({ "services": services })))
}

pub async fn get_service(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("services:read")?;
    let status = state
        .service_manager
        .get_status(&name)
        .ok_or_else(|| ApiError::NotFound(format!("service '{name}' not found")))?;
    Ok(Json(service_json(&status)))
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub procedure_id: Option<u32>,
}

fn parse_command(raw: &str) -> Option<PackMlCommand> {
    // Accept the command name (START) or its numeric value (2)
    if let Ok(value) = raw.parse::<u32>() {
        return PackMlCommand::from_value(value);
    }
    Some(match raw.to_ascii_uppercase().as_str() {
        "RESET" => PackMlCommand::Reset,
        "START" => PackMlCommand::Start,
        "STOP" => PackMlCommand::Stop,
        "HOLD" => PackMlCommand::Hold,
        "UNHOLD" => PackMlCommand::Unhold,
        "SUSPEND" => PackMlCommand::Suspend,
        "UNSUSPEND" => PackMlCommand::Unsuspend,
        "ABORT" => PackMlCommand::Abort,
        "CLEAR" => PackMlCommand::Clear,
        "COMPLETE" => PackMlCommand::Complete,
        _ => return None,
    })
}

pub async fn send_command(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("services:command")?;

    let command = parse_command(&request.command)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown command '{}'", request.command)))?;

    if state.service_manager.get_status(&name).is_none() {
        return Err(ApiError::NotFound(format!("service '{name}' not found")));
    }

    let result = state
        .service_manager
        .send_command(&name, command, request.procedure_id)
        .await;

    if result.success {
        Ok(Json(json!({
            "success": true,
            "from_state": result.from_state.to_string(),
            "to_state": result.to_state.map(|s| s.to_string()),
        })))
    } else {
        // The command was well-formed but invalid for the current state
        Err(ApiError::Conflict(
            result.error.unwrap_or_else(|| "command rejected".into()),
        ))
    }
}
