//! WebSocket Message Types
//!
//! Defines the messages exchanged between dashboards and the daemon, and the
//! mapping from tracker view effects to hub topics.

use serde::{Deserialize, Serialize};

use crate::tracker::ViewEffect;

pub const TOPIC_TOKENS: &str = "tokens";
pub const TOPIC_ALERTS: &str = "alerts";
pub const TOPIC_DEVS: &str = "devs";
pub const TOPIC_SYSTEM: &str = "system";

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics (e.g., "panels.new-launches", "panels.*", "alerts")
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// A tracker view change
    Effect { topic: String, effect: ViewEffect },
    Subscribed { topics: Vec<String> },
    Unsubscribed { topics: Vec<String> },
    Pong,
    Error { message: String },
}

/// Internal event for broadcasting through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    /// Route a view effect to its topic
    pub fn from_effect(effect: ViewEffect) -> Self {
        let topic = topic_for(&effect);
        Self {
            message: ServerMessage::Effect {
                topic: topic.clone(),
                effect,
            },
            topic,
        }
    }
}

fn topic_for(effect: &ViewEffect) -> String {
    if let Some(panel) = effect.panel() {
        return format!("panels.{}", panel);
    }
    match effect {
        ViewEffect::CardUpdated { .. } => TOPIC_TOKENS.to_string(),
        ViewEffect::Alert { .. } => TOPIC_ALERTS.to_string(),
        ViewEffect::DevsChanged => TOPIC_DEVS.to_string(),
        _ => TOPIC_SYSTEM.to_string(),
    }
}
