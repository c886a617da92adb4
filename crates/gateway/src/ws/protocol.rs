// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket message schema: `{type, payload}` both ways.

use super::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Server-to-client message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TagUpdate,
    StateChange,
    Alarm,
    Error,
    Pong,
    Subscribed,
    Unsubscribed,
}

/// One outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    pub fn tag_update(
        tag_name: &str,
        value: &mtpgw_core::tag::Value,
        quality: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: MessageType::TagUpdate,
            payload: json!({
                "tag_name": tag_name,
                "value": value,
                "quality": quality,
                "timestamp": timestamp.to_rfc3339(),
            }),
        }
    }

    pub fn state_change(service_name: &str, from_state: &str, to_state: &str) -> Self {
        Self {
            message_type: MessageType::StateChange,
            payload: json!({
                "service_name": service_name,
                "from_state": from_state,
                "to_state": to_state,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        }
    }

    pub fn alarm(
        action: &str,
        alarm_id: &str,
        source: &str,
        priority: Option<u8>,
        message: Option<&str>,
    ) -> Self {
        let mut payload = json!({
            "action": action,
            "alarm_id": alarm_id,
            "source": source,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(priority) = priority {
            payload["priority"] = json!(priority);
        }
        if let Some(message) = message {
            payload["message"] = json!(message);
        }
        Self { message_type: MessageType::Alarm, payload }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            message_type: MessageType::Error,
            payload: json!({ "message": message.to_string() }),
        }
    }

    pub fn pong() -> Self {
        Self { message_type: MessageType::Pong, payload: json!({}) }
    }

    pub fn subscribed(channel: Channel) -> Self {
        Self {
            message_type: MessageType::Subscribed,
            payload: json!({ "channel": channel.to_string() }),
        }
    }

    pub fn unsubscribed(channel: Channel) -> Self {
        Self {
            message_type: MessageType::Unsubscribed,
            payload: json!({ "channel": channel.to_string() }),
        }
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        channel: String,
        #[serde(default)]
        tags: Option<Vec<String>>,
        #[serde(default)]
        services: Option<Vec<String>>,
    },
    Unsubscribe {
        channel: String,
    },
    Ping,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
