// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_core::tag::Value;
use chrono::Utc;

fn recv_json(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
    let text = rx.try_recv().expect("expected a message");
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn broadcast_reaches_channel_subscribers() {
    let manager = WsManager::new();
    let (id, mut rx) = manager.connect("op");
    manager.subscribe(&id, Channel::Tags, None, None);

    let message = ServerMessage::tag_update("temp", &Value::Float(1.0), "Good", Utc::now());
    manager.broadcast(Channel::Tags, &message, Some("temp"));

    let json = recv_json(&mut rx);
    assert_eq!(json["type"], "tag_update");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribed_connection_gets_nothing() {
    let manager = WsManager::new();
    let (_id, mut rx) = manager.connect("op");

    let message = ServerMessage::tag_update("temp", &Value::Float(1.0), "Good", Utc::now());
    manager.broadcast(Channel::Tags, &message, Some("temp"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn all_channel_receives_everything() {
    let manager = WsManager::new();
    let (id, mut rx) = manager.connect("op");
    manager.subscribe(&id, Channel::All, None, None);

    manager.broadcast(
        Channel::Tags,
        &ServerMessage::tag_update("t", &Value::Int(1), "Good", Utc::now()),
        Some("t"),
    );
    manager.broadcast(
        Channel::Services,
        &ServerMessage::state_change("Mix", "IDLE", "STARTING"),
        Some("Mix"),
    );
    manager.broadcast(
        Channel::Alarms,
        &ServerMessage::alarm("raised", "A_H", "A", Some(2), None),
        None,
    );

    assert_eq!(recv_json(&mut rx)["type"], "tag_update");
    assert_eq!(recv_json(&mut rx)["type"], "state_change");
    assert_eq!(recv_json(&mut rx)["type"], "alarm");
}

#[tokio::test]
async fn tag_filter_applies() {
    let manager = WsManager::new();
    let (id, mut rx) = manager.connect("op");
    manager.subscribe(
        &id,
        Channel::Tags,
        Some(["temp".to_string()].into_iter().collect()),
        None,
    );

    manager.broadcast(
        Channel::Tags,
        &ServerMessage::tag_update("other", &Value::Int(1), "Good", Utc::now()),
        Some("other"),
    );
    assert!(rx.try_recv().is_err(), "filtered tag must be skipped");

    manager.broadcast(
        Channel::Tags,
        &ServerMessage::tag_update("temp", &Value::Int(2), "Good", Utc::now()),
        Some("temp"),
    );
    assert_eq!(recv_json(&mut rx)["payload"]["tag_name"], "temp");
}

#[tokio::test]
async fn service_filter_applies() {
    let manager = WsManager::new();
    let (id, mut rx) = manager.connect("op");
    manager.subscribe(
        &id,
        Channel::Services,
        None,
        Some(["Mix".to_string()].into_iter().collect()),
    );

    manager.broadcast(
        Channel::Services,
        &ServerMessage::state_change("Other", "IDLE", "STARTING"),
        Some("Other"),
    );
    assert!(rx.try_recv().is_err());

    manager.broadcast(
        Channel::Services,
        &ServerMessage::state_change("Mix", "IDLE", "STARTING"),
        Some("Mix"),
    );
    assert_eq!(recv_json(&mut rx)["payload"]["service_name"], "Mix");
}

#[tokio::test]
async fn dead_connection_removed_on_broadcast() {
    let manager = WsManager::new();
    let (id, rx) = manager.connect("op");
    manager.subscribe(&id, Channel::Tags, None, None);
    drop(rx); // simulate a dead socket

    assert_eq!(manager.connection_count(), 1);
    manager.broadcast(
        Channel::Tags,
        &ServerMessage::tag_update("t", &Value::Int(1), "Good", Utc::now()),
        Some("t"),
    );
    assert_eq!(manager.connection_count(), 0);
}

#[tokio::test]
async fn protocol_subscribe_unsubscribe_ping() {
    let manager = WsManager::new();
    let (id, mut rx) = manager.connect("op");

    manager.handle_message(&id, r#"{"type":"subscribe","channel":"tags"}"#);
    assert_eq!(recv_json(&mut rx)["type"], "subscribed");

    manager.handle_message(&id, r#"{"type":"ping"}"#);
    assert_eq!(recv_json(&mut rx)["type"], "pong");

    manager.handle_message(&id, r#"{"type":"unsubscribe","channel":"tags"}"#);
    assert_eq!(recv_json(&mut rx)["type"], "unsubscribed");

    manager.handle_message(&id, r#"{"type":"subscribe","channel":"bogus"}"#);
    assert_eq!(recv_json(&mut rx)["type"], "error");

    manager.handle_message(&id, "not json");
    assert_eq!(recv_json(&mut rx)["type"], "error");
}

#[tokio::test]
async fn disconnect_removes_connection() {
    let manager = WsManager::new();
    let (id, _rx) = manager.connect("op");
    assert_eq!(manager.user_of(&id).as_deref(), Some("op"));
    manager.disconnect(&id);
    assert_eq!(manager.connection_count(), 0);
    assert!(manager.user_of(&id).is_none());
}
