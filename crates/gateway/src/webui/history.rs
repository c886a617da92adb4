// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History queries: single tag, multi-tag, available tags.

use super::{ApiError, AppState};
use crate::auth::AuthUser;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use mtpgw_storage::{Aggregate, HistoryRecord};
use serde::Deserialize;
use serde_json::json;

fn record_json(record: &HistoryRecord) -> serde_json::Value {
    json!({
        "time": record.time.to_rfc3339(),
        "tag_name": record.tag_name,
        "value": record.value,
        "quality": record.quality,
    })
}

fn parse_time(raw: &Option<String>, field: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(text) => text
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("invalid {field} timestamp '{text}'"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct SingleQuery {
    pub tag: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub aggregate: Option<String>,
}

pub async fn query_single(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SingleQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("history:read")?;
    let from = parse_time(&query.from, "from")?;
    let to = parse_time(&query.to, "to")?;

    if let Some(bucket) = &query.bucket {
        let aggregate = match &query.aggregate {
            Some(raw) => Aggregate::parse(raw)?,
            None => Aggregate::Avg,
        };
        let rows = state.history.aggregate(&query.tag, bucket, aggregate, from, to)?;
        let rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "bucket_start": row.bucket_start.to_rfc3339(),
                    "value": row.value,
                    "count": row.count,
                })
            })
            .collect();
        return Ok(Json(json!({ "tag": query.tag, "buckets": rows })));
    }

    let records = state.history.query(&query.tag, from, to, query.limit);
    Ok(Json(json!({
        "tag": query.tag,
        "records": records.iter().map(record_json).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct MultiQuery {
    /// Comma-separated tag names.
    pub tags: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn query_multi(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MultiQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("history:read")?;
    let from = parse_time(&query.from, "from")?;
    let to = parse_time(&query.to, "to")?;

    let tags: Vec<String> = query
        .tags
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        return Err(ApiError::BadRequest("no tags given".into()));
    }

    let results = state.history.query_multi(&tags, from, to, query.limit);
    let body: serde_json::Map<String, serde_json::Value> = results
        .into_iter()
        .map(|(tag, records)| {
            (
                tag,
                serde_json::Value::Array(records.iter().map(record_json).collect()),
            )
        })
        .collect();
    Ok(Json(serde_json::Value::Object(body)))
}

pub async fn available(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require("history:read")?;
    Ok(Json(json!({ "tags": state.history.available_tags() })))
}
