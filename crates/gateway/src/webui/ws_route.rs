// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket upgrade at `GET /api/v1/ws`.
//!
//! Browsers cannot set headers on WebSocket handshakes, so the token is
//! also accepted as a `token` query parameter.

use super::{ApiError, AppState};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::Unauthorized("missing token".into()))?;

    let user = state
        .auth
        .verify(&token)
        .ok_or_else(|| ApiError::Unauthorized("invalid token".into()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user.username)))
}

async fn handle_socket(socket: WebSocket, state: AppState, username: String) {
    let (id, mut rx) = state.ws.connect(username);
    let (mut sink, mut stream) = socket.split();

    // Writer task: drain the outbound queue into the socket
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => state.ws.handle_message(&id, &text),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.ws.disconnect(&id);
    writer.abort();
}
