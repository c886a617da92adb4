// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The unauthenticated health probe.

use super::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn get_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let connectors: serde_json::Map<String, serde_json::Value> = state
        .tag_manager
        .connector_health()
        .into_iter()
        .map(|(name, health)| {
            (
                name,
                json!({
                    "state": health.state.to_string(),
                    "healthy": health.is_healthy(),
                    "consecutive_errors": health.consecutive_errors,
                    "total_reads": health.total_reads,
                    "total_writes": health.total_writes,
                    "total_errors": health.total_errors,
                    "last_error": health.last_error_message,
                }),
            )
        })
        .collect();

    let stats = state.tag_manager.statistics();
    let all_healthy = state
        .tag_manager
        .connector_health()
        .values()
        .all(|h| h.is_healthy());

    Json(json!({
        "status": if all_healthy { "ok" } else { "degraded" },
        "uptime_s": state.started_at.elapsed().as_secs(),
        "connectors": connectors,
        "tags": {
            "total": stats.total_tags,
            "good_quality": stats.good_quality_count,
            "bad_quality": stats.bad_quality_count,
            "total_reads": stats.total_reads,
            "total_writes": stats.total_writes,
            "total_errors": stats.total_errors,
        },
        "websocket_connections": state.ws.connection_count(),
    }))
}
