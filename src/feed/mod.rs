//! PumpPortal feed
//!
//! - `messages`: wire types for subscriptions and push messages
//! - `interpreter`: classification into tracker events
//! - `client`: the persistent WebSocket connection with fixed-delay reconnect

pub mod client;
pub mod interpreter;
pub mod messages;

pub use client::{FeedClient, FeedClientConfig, FeedInput};
pub use interpreter::{interpret, FeedEvent, Graduation, MarketSnapshot, TokenCreated, Trade};
pub use messages::{parse_message, FeedMessage, Subscription};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection state as seen by the rest of the system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl FeedStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, FeedStatus::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Connected => "connected",
            FeedStatus::Disconnected => "disconnected",
        }
    }
}

/// Feed errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Malformed feed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Failed to encode subscription: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Connection failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed: {0}")]
    Closed(String),
}
