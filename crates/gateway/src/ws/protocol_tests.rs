// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_core::tag::Value;

#[test]
fn tag_update_shape() {
    let message = ServerMessage::tag_update("temp", &Value::Float(21.5), "Good", Utc::now());
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["type"], "tag_update");
    assert_eq!(json["payload"]["tag_name"], "temp");
    assert_eq!(json["payload"]["value"], 21.5);
    assert_eq!(json["payload"]["quality"], "Good");
    assert!(json["payload"]["timestamp"].is_string());
}

#[test]
fn state_change_shape() {
    let message = ServerMessage::state_change("Mix", "IDLE", "STARTING");
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["type"], "state_change");
    assert_eq!(json["payload"]["service_name"], "Mix");
    assert_eq!(json["payload"]["from_state"], "IDLE");
    assert_eq!(json["payload"]["to_state"], "STARTING");
}

#[test]
fn alarm_shape_with_optionals() {
    let full = ServerMessage::alarm("raised", "TempMon_HH", "TempMon", Some(1), Some("hot"));
    let json = serde_json::to_value(&full).unwrap();
    assert_eq!(json["type"], "alarm");
    assert_eq!(json["payload"]["action"], "raised");
    assert_eq!(json["payload"]["priority"], 1);
    assert_eq!(json["payload"]["message"], "hot");

    let bare = ServerMessage::alarm("cleared", "TempMon_HH", "TempMon", None, None);
    let json = serde_json::to_value(&bare).unwrap();
    assert!(json["payload"].get("priority").is_none());
    assert!(json["payload"].get("message").is_none());
}

#[test]
fn control_messages() {
    assert_eq!(serde_json::to_value(ServerMessage::pong()).unwrap()["type"], "pong");
    let sub = serde_json::to_value(ServerMessage::subscribed(Channel::Tags)).unwrap();
    assert_eq!(sub["type"], "subscribed");
    assert_eq!(sub["payload"]["channel"], "tags");
    let unsub = serde_json::to_value(ServerMessage::unsubscribed(Channel::All)).unwrap();
    assert_eq!(unsub["type"], "unsubscribed");
    assert_eq!(unsub["payload"]["channel"], "all");
}

#[test]
fn client_subscribe_parses() {
    let raw = r#"{"type":"subscribe","channel":"tags","tags":["temp","level"]}"#;
    let message: ClientMessage = serde_json::from_str(raw).unwrap();
    match message {
        ClientMessage::Subscribe { channel, tags, services } => {
            assert_eq!(channel, "tags");
            assert_eq!(tags.unwrap(), vec!["temp", "level"]);
            assert!(services.is_none());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn client_ping_parses() {
    let message: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert!(matches!(message, ClientMessage::Ping));
}

#[test]
fn unknown_type_fails() {
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
}
