// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket connection management and the subscription protocol.
//!
//! Each connection gets a generated id and an unbounded outbound queue; a
//! writer task drains the queue to the socket so producers never block.
//! Failed sends mark the connection for disconnect, performed outside the
//! table lock.

mod protocol;

pub use protocol::{ClientMessage, MessageType, ServerMessage};

use nanoid::nanoid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// Subscription channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Tags,
    Services,
    Alarms,
    All,
}

mtpgw_core::simple_display! {
    Channel {
        Tags => "tags",
        Services => "services",
        Alarms => "alarms",
        All => "all",
    }
}

impl Channel {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "tags" => Channel::Tags,
            "services" => Channel::Services,
            "alarms" => Channel::Alarms,
            "all" => Channel::All,
            _ => return None,
        })
    }
}

/// Per-channel subscription with optional name filters.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    pub filter_tags: Option<HashSet<String>>,
    pub filter_services: Option<HashSet<String>>,
}

impl Subscription {
    /// Apply the channel filter to a message's filter key.
    fn accepts(&self, channel: Channel, filter_key: Option<&str>) -> bool {
        let Some(key) = filter_key else { return true };
        match channel {
            Channel::Tags => match &self.filter_tags {
                Some(filter) => filter.contains(key),
                None => true,
            },
            Channel::Services => match &self.filter_services {
                Some(filter) => filter.contains(key),
                None => true,
            },
            _ => true,
        }
    }
}

struct Connection {
    user: String,
    tx: mpsc::UnboundedSender<String>,
    subscriptions: HashMap<Channel, Subscription>,
}

/// Connection table and dispatch.
#[derive(Default)]
pub struct WsManager {
    connections: Mutex<HashMap<String, Connection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Register a connection; the receiver feeds the socket writer task.
    pub fn connect(&self, user: impl Into<String>) -> (String, mpsc::UnboundedReceiver<String>) {
        let id = nanoid!(12);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().insert(
            id.clone(),
            Connection { user: user.into(), tx, subscriptions: HashMap::new() },
        );
        tracing::debug!(connection = %id, "websocket connected");
        (id, rx)
    }

    pub fn disconnect(&self, id: &str) {
        if self.connections.lock().remove(id).is_some() {
            tracing::debug!(connection = %id, "websocket disconnected");
        }
    }

    pub fn subscribe(
        &self,
        id: &str,
        channel: Channel,
        filter_tags: Option<HashSet<String>>,
        filter_services: Option<HashSet<String>>,
    ) -> bool {
        let mut connections = self.connections.lock();
        let Some(connection) = connections.get_mut(id) else {
            return false;
        };
        connection
            .subscriptions
            .insert(channel, Subscription { filter_tags, filter_services });
        true
    }

    pub fn unsubscribe(&self, id: &str, channel: Channel) -> bool {
        let mut connections = self.connections.lock();
        connections
            .get_mut(id)
            .map(|c| c.subscriptions.remove(&channel).is_some())
            .unwrap_or(false)
    }

    /// Send one message to one connection.
    pub fn send_personal(&self, id: &str, message: &ServerMessage) {
        let Ok(text) = serde_json::to_string(message) else {
            return;
        };
        let stale = {
            let connections = self.connections.lock();
            match connections.get(id) {
                Some(connection) => connection.tx.send(text).is_err(),
                None => false,
            }
        };
        if stale {
            self.disconnect(id);
        }
    }

    /// Broadcast to every connection subscribed to `channel` (or `all`),
    /// honoring per-subscription filters. Disconnects are scheduled
    /// outside the table lock.
    pub fn broadcast(&self, channel: Channel, message: &ServerMessage, filter_key: Option<&str>) {
        let Ok(text) = serde_json::to_string(message) else {
            return;
        };
        let mut stale = Vec::new();
        {
            let connections = self.connections.lock();
            for (id, connection) in connections.iter() {
                let subscription = connection
                    .subscriptions
                    .get(&channel)
                    .or_else(|| connection.subscriptions.get(&Channel::All));
                let Some(subscription) = subscription else {
                    continue;
                };
                if !subscription.accepts(channel, filter_key) {
                    continue;
                }
                if connection.tx.send(text.clone()).is_err() {
                    stale.push(id.clone());
                }
            }
        }
        for id in stale {
            self.disconnect(&id);
        }
    }

    /// Handle one inbound client message, replying on the same connection.
    pub fn handle_message(&self, id: &str, raw: &str) {
        let message: ClientMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                self.send_personal(id, &ServerMessage::error(format!("invalid message: {e}")));
                return;
            }
        };

        match message {
            ClientMessage::Ping => self.send_personal(id, &ServerMessage::pong()),
            ClientMessage::Subscribe { channel, tags, services } => {
                let Some(channel) = Channel::parse(&channel) else {
                    self.send_personal(id, &ServerMessage::error("unknown channel"));
                    return;
                };
                self.subscribe(
                    id,
                    channel,
                    tags.map(|t| t.into_iter().collect()),
                    services.map(|s| s.into_iter().collect()),
                );
                self.send_personal(id, &ServerMessage::subscribed(channel));
            }
            ClientMessage::Unsubscribe { channel } => {
                let Some(channel) = Channel::parse(&channel) else {
                    self.send_personal(id, &ServerMessage::error("unknown channel"));
                    return;
                };
                self.unsubscribe(id, channel);
                self.send_personal(id, &ServerMessage::unsubscribed(channel));
            }
        }
    }

    pub fn user_of(&self, id: &str) -> Option<String> {
        self.connections.lock().get(id).map(|c| c.user.clone())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
