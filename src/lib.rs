//! # Devwatch
//!
//! Tracks token launches by followed wallets ("devs") on the PumpPortal
//! real-time feed and sorts them into three dashboard panels: new launches,
//! active tokens and graduated tokens.
//!
//! ## Modules
//!
//! - [`tracker`]: tracker state, panels, dev registry, settings bundle
//! - [`feed`]: feed protocol, message interpreter, reconnecting client
//! - [`oracle`]: SOL/USD price source
//! - [`store`]: key-value persistence of devs, tokens and chart provider
//! - [`engine`]: single-owner command loop and timers
//! - [`api`] / [`websocket`]: HTTP API and dashboard streaming
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use devwatch::feed::{interpret, parse_message};
//! use devwatch::tracker::{DevDraft, Tracker};
//!
//! let mut tracker = Tracker::default();
//! tracker.add_dev(DevDraft::new("alpha", "DevWalletAddress"), 0).unwrap();
//!
//! let msg = parse_message(r#"{"txType":"create","mint":"M1","traderPublicKey":"DevWalletAddress","marketCapSol":30}"#).unwrap();
//! if let Some(event) = interpret(&msg, tracker.sol_price_usd()) {
//!     let effects = tracker.handle_feed_event(event, 0);
//!     println!("{} effects", effects.len());
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod feed;
pub mod oracle;
pub mod store;
pub mod tracker;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};

pub use engine::{Command, Engine, EngineError, EngineHandle, ScheduledTask, Scheduler};

pub use feed::{FeedClient, FeedClientConfig, FeedError, FeedEvent, FeedStatus, Subscription};

pub use oracle::{CoinGeckoSource, OracleError, PriceOracle, PriceSource, PriceUpdate};

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, TrackerStore};

pub use tracker::{
    ChartProvider, Dev, DevDraft, Effect, PanelFilter, PanelId, Token, Tracker, TrackerError,
    ViewEffect,
};

pub use websocket::{ConnectionHub, HubConfig, HubError, ServerMessage, WsEvent};
