//! WebSocket Connection Hub
//!
//! Tracks dashboard connections and their topic subscriptions, and fans
//! tracker view effects out to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use super::messages::{ServerMessage, WsEvent, TOPIC_ALERTS, TOPIC_DEVS, TOPIC_SYSTEM, TOPIC_TOKENS};
use crate::tracker::{PanelId, ViewEffect};

pub type ConnectionId = String;

pub struct ConnectionHub {
    /// ConnectionId → handle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    /// Topic → subscribed connections
    subscriptions: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    config: HubConfig,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { max_connections: 256 }
    }
}

/// Handle for sending messages to a specific connection
pub struct ConnectionHandle {
    pub sender: mpsc::UnboundedSender<ServerMessage>,
    pub subscriptions: HashSet<String>,
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new connection.
    ///
    /// Fails once the connection limit has been reached.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                subscriptions: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Unregister a connection and clean up its subscriptions
    pub async fn unregister(&self, id: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(handle) = handle {
            let mut subs = self.subscriptions.write().await;
            for topic in handle.subscriptions {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
            }
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    /// Subscribe a connection to topics; invalid topics are skipped
    pub async fn subscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut subscribed = Vec::new();

        for topic in topics {
            if !is_valid_topic(&topic) {
                tracing::warn!(topic = %topic, "Invalid topic ignored");
                continue;
            }
            handle.subscriptions.insert(topic.clone());
            subs.entry(topic.clone()).or_default().insert(id.to_string());
            subscribed.push(topic);
        }

        tracing::debug!(connection_id = %id, topics = ?subscribed, "Subscribed to topics");
        Ok(subscribed)
    }

    pub async fn unsubscribe(&self, id: &str, topics: Vec<String>) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut unsubscribed = Vec::new();

        for topic in topics {
            if handle.subscriptions.remove(&topic) {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
                unsubscribed.push(topic);
            }
        }

        tracing::debug!(connection_id = %id, topics = ?unsubscribed, "Unsubscribed from topics");
        Ok(unsubscribed)
    }

    /// Send an event to every subscriber of its topic, including `<prefix>.*`
    /// wildcard subscribers. Returns the number of connections reached.
    pub async fn broadcast(&self, event: &WsEvent) -> usize {
        // Lock order everywhere: connections, then subscriptions
        let connections = self.connections.read().await;
        let subs = self.subscriptions.read().await;

        let mut ids: HashSet<&ConnectionId> = HashSet::new();
        if let Some(direct) = subs.get(&event.topic) {
            ids.extend(direct);
        }
        if let Some((prefix, _)) = event.topic.split_once('.') {
            if let Some(wildcard) = subs.get(&format!("{}.*", prefix)) {
                ids.extend(wildcard);
            }
        }

        let mut sent = 0;
        for id in ids {
            if let Some(handle) = connections.get(id) {
                if handle.sender.send(event.message.clone()).is_ok() {
                    sent += 1;
                }
            }
        }

        if sent > 0 {
            tracing::trace!(topic = %event.topic, subscribers = sent, "Broadcast event");
        }
        sent
    }

    /// Relay view effects from the engine until the channel closes
    pub async fn forward(self: Arc<Self>, mut views: broadcast::Receiver<ViewEffect>) {
        loop {
            match views.recv().await {
                Ok(effect) => {
                    self.broadcast(&WsEvent::from_effect(effect)).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dashboard relay lagged, view effects dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("View relay stopped");
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;
        handle.sender.send(message).map_err(|_| HubError::SendFailed)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Valid topics:
/// - `panels.*` or `panels.{panel}` (card and panel changes)
/// - `tokens` (card value updates)
/// - `alerts`, `devs`, `system`
pub fn is_valid_topic(topic: &str) -> bool {
    if let Some(panel) = topic.strip_prefix("panels.") {
        return panel == "*" || PanelId::ALL.iter().any(|p| p.as_str() == panel);
    }
    matches!(topic, TOPIC_TOKENS | TOPIC_ALERTS | TOPIC_DEVS | TOPIC_SYSTEM)
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}
