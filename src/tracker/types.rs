//! Core data types for the launch tracker
//!
//! This module defines the records the tracker keeps and persists:
//! - `Dev`: A followed wallet and what the user knows about it
//! - `Token`: A launch by a followed dev and its live market state
//! - `ChartProvider`: Where chart links point
//!
//! JSON field names are camelCase so that dev lists and settings files
//! exported by the browser dashboard load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::TrackerError;

/// A project the dev launched before being followed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PastProject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Free-form all-time-high note, e.g. "$1.2M"
    #[serde(default)]
    pub ath: String,
    /// Chart URL, or a bare mint address
    #[serde(default)]
    pub chart: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mint: String,
}

impl PastProject {
    /// Resolve the chart field into a link.
    ///
    /// Anything that looks like a URL is used as-is; anything else is treated
    /// as a mint and routed through the chart provider.
    pub fn chart_link(&self, provider: ChartProvider) -> Option<String> {
        let chart = self.chart.trim();
        if chart.is_empty() {
            return None;
        }
        if chart.starts_with("http") || chart.contains('.') {
            Some(chart.to_string())
        } else {
            Some(provider.chart_url(chart))
        }
    }
}

/// A followed wallet address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dev {
    /// Opaque identifier; older exports use numeric ids
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub past_projects: Vec<PastProject>,
    #[serde(default = "default_following")]
    pub following: bool,
    /// Launches observed since the dev was added
    #[serde(default)]
    pub launches: u64,
    /// Cumulative traded volume across this dev's tokens (USD)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_volume: f64,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

fn default_following() -> bool {
    true
}

impl Dev {
    /// Case-insensitive address comparison
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }

    /// `abcd...wxyz` form used in alerts and listings
    pub fn short_address(&self) -> String {
        shorten_address(&self.address)
    }
}

/// User input for adding a dev, and what `edit` hands back for re-entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DevDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub past_projects: Vec<PastProject>,
}

impl DevDraft {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    /// Builder method: set notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Builder method: add a past project
    pub fn past_project(mut self, project: PastProject) -> Self {
        self.past_projects.push(project);
        self
    }
}

impl From<Dev> for DevDraft {
    fn from(dev: Dev) -> Self {
        Self {
            name: dev.name,
            address: dev.address,
            notes: dev.notes,
            past_projects: dev.past_projects,
        }
    }
}

/// A token launched by a followed dev
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub mint: String,
    #[serde(default = "default_token_name")]
    pub name: String,
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    /// Creator wallet address
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub dev_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Unix timestamp in milliseconds
    pub launch_time: i64,
    /// USD per token unit
    #[serde(default)]
    pub price: f64,
    /// USD
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub market_cap_sol: f64,
    /// Cumulative traded volume since tracking started (USD)
    #[serde(default, rename = "volume24h")]
    pub volume: f64,
    #[serde(default)]
    pub buy_count: u64,
    #[serde(default)]
    pub sell_count: u64,
    /// Bonding curve completion, 0-100
    #[serde(default)]
    pub bonding_progress: f64,
    #[serde(default)]
    pub graduated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduated_at: Option<i64>,
    #[serde(default)]
    pub v_sol_in_bonding_curve: f64,
}

fn default_token_name() -> String {
    "Unknown".to_string()
}

fn default_token_symbol() -> String {
    "???".to_string()
}

impl Token {
    /// Create a freshly launched token with zeroed counters
    pub fn launched(mint: impl Into<String>, creator: impl Into<String>, launch_time: i64) -> Self {
        Self {
            mint: mint.into(),
            name: default_token_name(),
            symbol: default_token_symbol(),
            creator: creator.into(),
            dev_name: String::new(),
            uri: None,
            launch_time,
            price: 0.0,
            market_cap: 0.0,
            market_cap_sol: 0.0,
            volume: 0.0,
            buy_count: 0,
            sell_count: 0,
            bonding_progress: 0.0,
            graduated: false,
            graduated_at: None,
            v_sol_in_bonding_curve: 0.0,
        }
    }

    /// Age in milliseconds at `now`, never negative
    pub fn age_ms(&self, now: i64) -> i64 {
        (now - self.launch_time).max(0)
    }

    /// Age in fractional minutes at `now`
    pub fn age_minutes(&self, now: i64) -> f64 {
        self.age_ms(now) as f64 / 60_000.0
    }

    /// Elapsed time since launch as `m:ss`
    pub fn elapsed_label(&self, now: i64) -> String {
        let secs = self.age_ms(now) / 1000;
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    pub fn trade_count(&self) -> u64 {
        self.buy_count + self.sell_count
    }
}

/// Chart site used for token links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartProvider {
    #[default]
    Axiom,
    Photon,
}

impl ChartProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartProvider::Axiom => "axiom",
            ChartProvider::Photon => "photon",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            ChartProvider::Axiom => "Axiom",
            ChartProvider::Photon => "Photon",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ChartProvider::Axiom => "https://axiom.trade/t/",
            ChartProvider::Photon => "https://photon-sol.tinyastro.io/en/lp/",
        }
    }

    pub fn chart_url(&self, mint: &str) -> String {
        format!("{}{}", self.base_url(), mint)
    }

    /// The other provider
    pub fn toggled(&self) -> Self {
        match self {
            ChartProvider::Axiom => ChartProvider::Photon,
            ChartProvider::Photon => ChartProvider::Axiom,
        }
    }
}

impl fmt::Display for ChartProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartProvider {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "axiom" => Ok(ChartProvider::Axiom),
            "photon" => Ok(ChartProvider::Photon),
            other => Err(TrackerError::UnknownChartProvider(other.to_string())),
        }
    }
}

/// `abcd...wxyz`
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Compact USD amount: `$1.23M`, `$4.56K`, `$7.89`
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "$0".to_string();
    }
    if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else {
        format!("${:.2}", value)
    }
}

/// Per-unit price with enough precision for sub-cent tokens
pub fn format_price(price: f64) -> String {
    if !price.is_finite() || price <= 0.0 {
        "$0".to_string()
    } else if price < 0.0001 {
        format!("${:.2e}", price)
    } else if price < 1.0 {
        format!("${:.6}", price)
    } else {
        format!("${:.2}", price)
    }
}

/// Accept an id written as either a JSON string or a number
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Accept a number written as either a JSON number or a numeric string
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if value.is_finite() { value } else { 0.0 })
}
