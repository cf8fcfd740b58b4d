//! WebSocket Real-Time Streaming
//!
//! Streams tracker view effects to dashboard clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: active connections and their topic subscriptions
//! - **Handler**: WebSocket upgrade and per-connection message loop
//! - **Messages**: client and server message formats, effect routing
//!
//! ## Topics
//!
//! - `panels.*` / `panels.{panel}` - cards inserted, removed, resorted, cleared
//! - `tokens` - card value updates
//! - `alerts` - new launch and graduation alerts
//! - `devs` - dev list changes
//! - `system` - feed status, SOL price, elapsed-time ticks, chart provider
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/api/v1/ws');
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: ['panels.*', 'alerts']}));
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{is_valid_topic, ConnectionHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage, WsEvent};
