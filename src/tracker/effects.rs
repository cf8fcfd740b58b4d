//! Effects produced by state transitions
//!
//! Tracker operations never perform I/O. They return a list of effects that the
//! engine carries out afterwards: subscription requests for the feed, view
//! updates for dashboards and persistence of changed keys.

use serde::Serialize;
use std::collections::BTreeMap;

use super::panels::PanelId;
use super::types::{ChartProvider, Token};
use crate::feed::{FeedStatus, Subscription};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Subscribe(Subscription),
    View(ViewEffect),
    Persist(PersistKey),
}

/// A persisted key that needs rewriting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PersistKey {
    Devs,
    Tokens,
    ChartProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NewLaunch,
    Graduation,
}

/// A change dashboards should render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewEffect {
    CardInserted {
        panel: PanelId,
        token: Token,
    },
    CardUpdated {
        panels: Vec<PanelId>,
        token: Token,
    },
    CardRemoved {
        panel: PanelId,
        mint: String,
    },
    PanelResorted {
        panel: PanelId,
    },
    PanelCleared {
        panel: PanelId,
    },
    Alert {
        alert: AlertKind,
        mint: String,
        title: String,
        message: String,
    },
    /// Elapsed-time labels for every shown token
    Tick {
        now: i64,
        elapsed: BTreeMap<String, String>,
    },
    Status {
        feed: FeedStatus,
    },
    Price {
        sol_usd: f64,
    },
    DevsChanged,
    FiltersChanged {
        panel: PanelId,
    },
    ChartProviderChanged {
        provider: ChartProvider,
    },
}

impl ViewEffect {
    /// Panel this effect concerns, if any
    pub fn panel(&self) -> Option<PanelId> {
        match self {
            ViewEffect::CardInserted { panel, .. }
            | ViewEffect::CardRemoved { panel, .. }
            | ViewEffect::PanelResorted { panel }
            | ViewEffect::PanelCleared { panel }
            | ViewEffect::FiltersChanged { panel } => Some(*panel),
            _ => None,
        }
    }
}

/// Drop subscription effects; used while the feed is offline
pub fn without_subscriptions(effects: Vec<Effect>) -> Vec<Effect> {
    effects
        .into_iter()
        .filter(|effect| !matches!(effect, Effect::Subscribe(_)))
        .collect()
}
