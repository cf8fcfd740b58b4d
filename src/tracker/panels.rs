//! Panel membership
//!
//! Three panels partition the tracked tokens for display. Membership is a pure
//! function of a token's stage, age and market cap against the panel's filter;
//! `PanelBoard` remembers what is currently shown so changes can be diffed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::error::TrackerError;
use super::types::Token;

/// Tokens younger than this (and not graduated) are "new"
pub const NEW_LAUNCH_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Market cap at which pump.fun tokens graduate (USD)
pub const GRADUATION_MARKET_CAP_USD: f64 = 69_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelId {
    NewLaunches,
    ActiveTokens,
    Graduated,
}

impl PanelId {
    pub const ALL: [PanelId; 3] = [PanelId::NewLaunches, PanelId::ActiveTokens, PanelId::Graduated];

    pub fn as_str(&self) -> &'static str {
        match self {
            PanelId::NewLaunches => "new-launches",
            PanelId::ActiveTokens => "active-tokens",
            PanelId::Graduated => "graduated",
        }
    }

    fn index(&self) -> usize {
        match self {
            PanelId::NewLaunches => 0,
            PanelId::ActiveTokens => 1,
            PanelId::Graduated => 2,
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelId {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new-launches" | "new" => Ok(PanelId::NewLaunches),
            "active-tokens" | "active" => Ok(PanelId::ActiveTokens),
            "graduated" => Ok(PanelId::Graduated),
            other => Err(TrackerError::UnknownPanel(other.to_string())),
        }
    }
}

/// Lifecycle stage of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStage {
    New,
    Active,
    Graduated,
}

impl TokenStage {
    pub fn of(token: &Token, now: i64) -> Self {
        if token.graduated {
            TokenStage::Graduated
        } else if token.age_ms(now) <= NEW_LAUNCH_WINDOW_MS {
            TokenStage::New
        } else {
            TokenStage::Active
        }
    }
}

/// Per-panel bounds. Ages are minutes, market caps USD; `None` is unbounded.
///
/// Also reads the browser dashboard's `minMC`/`maxMC` keys, which are in
/// thousands of USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PanelFilterWire")]
pub struct PanelFilter {
    pub min_age: Option<f64>,
    pub max_age: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub max_market_cap: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelFilterWire {
    #[serde(default)]
    min_age: Option<f64>,
    #[serde(default)]
    max_age: Option<f64>,
    #[serde(default)]
    min_market_cap: Option<f64>,
    #[serde(default)]
    max_market_cap: Option<f64>,
    #[serde(default, rename = "minMC")]
    min_mc_k: Option<f64>,
    #[serde(default, rename = "maxMC")]
    max_mc_k: Option<f64>,
}

impl From<PanelFilterWire> for PanelFilter {
    fn from(wire: PanelFilterWire) -> Self {
        let usd = |k: Option<f64>| k.map(|v| v * 1000.0);
        Self {
            min_age: wire.min_age,
            max_age: wire.max_age,
            min_market_cap: wire.min_market_cap.or(usd(wire.min_mc_k)),
            max_market_cap: wire.max_market_cap.or(usd(wire.max_mc_k)),
        }
    }
}

impl PanelFilter {
    /// Factory defaults for a panel
    pub fn defaults_for(panel: PanelId) -> Self {
        match panel {
            PanelId::NewLaunches => Self {
                min_age: Some(0.0),
                max_age: Some(5.0),
                min_market_cap: Some(0.0),
                max_market_cap: None,
            },
            PanelId::ActiveTokens => Self {
                min_age: Some(0.0),
                max_age: None,
                min_market_cap: Some(0.0),
                max_market_cap: None,
            },
            PanelId::Graduated => Self {
                min_age: Some(0.0),
                max_age: None,
                min_market_cap: Some(GRADUATION_MARKET_CAP_USD),
                max_market_cap: None,
            },
        }
    }

    /// Reject negative or inverted bounds
    pub fn validate(&self) -> Result<(), TrackerError> {
        let bounds = [
            ("minAge", self.min_age),
            ("maxAge", self.max_age),
            ("minMarketCap", self.min_market_cap),
            ("maxMarketCap", self.max_market_cap),
        ];
        for (name, value) in bounds {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(TrackerError::InvalidFilter(format!(
                        "{} must be a non-negative number",
                        name
                    )));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_age, self.max_age) {
            if lo > hi {
                return Err(TrackerError::InvalidFilter("minAge exceeds maxAge".to_string()));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_market_cap, self.max_market_cap) {
            if lo > hi {
                return Err(TrackerError::InvalidFilter(
                    "minMarketCap exceeds maxMarketCap".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether the token's age and market cap fall within bounds
    pub fn passes(&self, token: &Token, now: i64) -> bool {
        let age = token.age_minutes(now);
        if self.min_age.is_some_and(|min| age < min) {
            return false;
        }
        if self.max_age.is_some_and(|max| age > max) {
            return false;
        }
        if self.min_market_cap.is_some_and(|min| token.market_cap < min) {
            return false;
        }
        if self.max_market_cap.is_some_and(|max| token.market_cap > max) {
            return false;
        }
        true
    }
}

/// The filter set for all panels, serialized keyed by panel id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelFilters {
    #[serde(rename = "new-launches", default = "new_launches_default")]
    new_launches: PanelFilter,
    #[serde(rename = "active-tokens", default = "active_tokens_default")]
    active_tokens: PanelFilter,
    #[serde(rename = "graduated", default = "graduated_default")]
    graduated: PanelFilter,
}

fn new_launches_default() -> PanelFilter {
    PanelFilter::defaults_for(PanelId::NewLaunches)
}

fn active_tokens_default() -> PanelFilter {
    PanelFilter::defaults_for(PanelId::ActiveTokens)
}

fn graduated_default() -> PanelFilter {
    PanelFilter::defaults_for(PanelId::Graduated)
}

impl Default for PanelFilters {
    fn default() -> Self {
        Self {
            new_launches: new_launches_default(),
            active_tokens: active_tokens_default(),
            graduated: graduated_default(),
        }
    }
}

impl PanelFilters {
    pub fn get(&self, panel: PanelId) -> &PanelFilter {
        match panel {
            PanelId::NewLaunches => &self.new_launches,
            PanelId::ActiveTokens => &self.active_tokens,
            PanelId::Graduated => &self.graduated,
        }
    }

    pub fn set(&mut self, panel: PanelId, filter: PanelFilter) {
        match panel {
            PanelId::NewLaunches => self.new_launches = filter,
            PanelId::ActiveTokens => self.active_tokens = filter,
            PanelId::Graduated => self.graduated = filter,
        }
    }

    /// Restore a panel's factory defaults
    pub fn reset(&mut self, panel: PanelId) {
        self.set(panel, PanelFilter::defaults_for(panel));
    }

    /// Overwrite the panels present in `partial`, keep the rest
    pub fn merge(&mut self, partial: BTreeMap<PanelId, PanelFilter>) {
        for (panel, filter) in partial {
            self.set(panel, filter);
        }
    }
}

/// Whether a token belongs on a panel right now
pub fn qualifies(panel: PanelId, token: &Token, filters: &PanelFilters, now: i64) -> bool {
    let stage = TokenStage::of(token, now);
    let in_stage = match panel {
        PanelId::NewLaunches => stage == TokenStage::New,
        PanelId::ActiveTokens => stage != TokenStage::Graduated,
        PanelId::Graduated => stage == TokenStage::Graduated,
    };
    in_stage && filters.get(panel).passes(token, now)
}

/// Order tokens the way a panel displays them
pub fn sort_for_panel(panel: PanelId, tokens: &mut [&Token]) {
    match panel {
        PanelId::NewLaunches => {
            tokens.sort_by(|a, b| b.launch_time.cmp(&a.launch_time).then_with(|| a.mint.cmp(&b.mint)))
        }
        PanelId::ActiveTokens | PanelId::Graduated => tokens.sort_by(|a, b| {
            b.market_cap
                .total_cmp(&a.market_cap)
                .then_with(|| a.mint.cmp(&b.mint))
        }),
    }
}

/// Which mints each panel currently shows
#[derive(Debug, Clone, Default)]
pub struct PanelBoard {
    shown: [BTreeSet<String>; 3],
}

impl PanelBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, panel: PanelId, mint: &str) -> bool {
        self.shown[panel.index()].contains(mint)
    }

    /// Returns true when the mint was not already shown
    pub fn insert(&mut self, panel: PanelId, mint: &str) -> bool {
        self.shown[panel.index()].insert(mint.to_string())
    }

    /// Returns true when the mint was shown
    pub fn remove(&mut self, panel: PanelId, mint: &str) -> bool {
        self.shown[panel.index()].remove(mint)
    }

    /// Drop a mint from every panel, returning the panels it left
    pub fn remove_everywhere(&mut self, mint: &str) -> Vec<PanelId> {
        PanelId::ALL
            .into_iter()
            .filter(|panel| self.remove(*panel, mint))
            .collect()
    }

    /// Panels currently showing a mint
    pub fn panels_showing(&self, mint: &str) -> Vec<PanelId> {
        PanelId::ALL
            .into_iter()
            .filter(|panel| self.contains(*panel, mint))
            .collect()
    }

    pub fn mints(&self, panel: PanelId) -> impl Iterator<Item = &str> {
        self.shown[panel.index()].iter().map(String::as_str)
    }

    pub fn count(&self, panel: PanelId) -> usize {
        self.shown[panel.index()].len()
    }

    pub fn clear(&mut self) {
        for set in &mut self.shown {
            set.clear();
        }
    }
}
