//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::feed::FeedStatus;
use crate::tracker::{
    format_price, format_usd, ChartProvider, Dev, DevDraft, DevSummary, ImportCounts, PanelFilter,
    PanelId, SyncState, Token,
};

// ============================================
// TOKEN DTOs
// ============================================

/// A token as a dashboard card renders it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCard {
    #[serde(flatten)]
    pub token: Token,
    /// `m:ss` since launch
    pub elapsed: String,
    pub market_cap_display: String,
    pub price_display: String,
    pub volume_display: String,
    pub chart_url: String,
}

impl TokenCard {
    pub fn new(token: Token, provider: ChartProvider, now: i64) -> Self {
        Self {
            elapsed: token.elapsed_label(now),
            market_cap_display: format_usd(token.market_cap),
            price_display: format_price(token.price),
            volume_display: format_usd(token.volume),
            chart_url: provider.chart_url(&token.mint),
            token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PanelResponse {
    pub panel: PanelId,
    pub filter: PanelFilter,
    pub total: usize,
    pub tokens: Vec<TokenCard>,
}

#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub total: usize,
    pub tokens: Vec<Token>,
}

/// Count of removed or reconciled items
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

// ============================================
// DEV DTOs
// ============================================

/// Add-dev request; same shape the dashboard form submits
pub type AddDevRequest = DevDraft;

#[derive(Debug, Serialize)]
pub struct DevListResponse {
    pub total: usize,
    pub devs: Vec<DevSummary>,
}

#[derive(Debug, Serialize)]
pub struct DevResponse {
    pub dev: Dev,
}

/// Prefill for the add-dev form after a destructive edit
#[derive(Debug, Serialize)]
pub struct EditDevResponse {
    pub draft: DevDraft,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub sync_state: SyncState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportDevsResponse {
    pub added: usize,
    pub skipped: usize,
}

impl From<ImportCounts> for ImportDevsResponse {
    fn from(counts: ImportCounts) -> Self {
        Self {
            added: counts.added,
            skipped: counts.skipped,
        }
    }
}

// ============================================
// SETTINGS DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    pub panel: PanelId,
    pub filter: PanelFilter,
}

#[derive(Debug, Deserialize)]
pub struct ChartProviderRequest {
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct ChartProviderResponse {
    pub provider: ChartProvider,
    pub label: String,
}

impl From<ChartProvider> for ChartProviderResponse {
    fn from(provider: ChartProvider) -> Self {
        Self {
            provider,
            label: provider.label().to_string(),
        }
    }
}

// ============================================
// HEALTH DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" when the feed is connected, "degraded" otherwise
    pub status: String,
    pub feed: FeedStatus,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
