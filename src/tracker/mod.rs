//! Launch tracker state
//!
//! `Tracker` is the explicit state container for everything the dashboard
//! shows: the dev registry, the token ledger with its panel board, the panel
//! filters, the chart provider, the SOL price and the feed connection state.
//!
//! Every mutating method returns a list of `Effect`s instead of doing I/O.
//! Subscription effects are dropped while the feed is not connected; the full
//! subscription set is re-issued on the next connect.

pub mod effects;
pub mod error;
pub mod ledger;
pub mod panels;
pub mod registry;
pub mod settings;
pub mod types;

pub use effects::{AlertKind, Effect, PersistKey, ViewEffect};
pub use error::{TrackerError, TrackerResult};
pub use ledger::TokenLedger;
pub use panels::{PanelBoard, PanelFilter, PanelFilters, PanelId, TokenStage};
pub use registry::{DevRegistry, ImportCounts, SyncState};
pub use settings::{ImportSummary, SettingsBundle, SettingsImport, SETTINGS_VERSION};
pub use types::{format_price, format_usd, shorten_address, ChartProvider, Dev, DevDraft, PastProject, Token};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::feed::{FeedEvent, FeedStatus, Subscription};

/// Price used until the oracle reports
pub const DEFAULT_SOL_PRICE_USD: f64 = 100.0;

/// State restored from persistence
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub devs: Vec<Dev>,
    pub tokens: Vec<Token>,
    pub chart_provider: Option<ChartProvider>,
}

/// Point-in-time summary for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub feed: FeedStatus,
    pub sol_price_usd: f64,
    pub chart_provider: ChartProvider,
    pub devs: usize,
    pub followed_devs: usize,
    pub tokens: usize,
    pub new_launches: usize,
    pub active_tokens: usize,
    pub graduated: usize,
}

/// A dev with its sync state and tracked token count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevSummary {
    #[serde(flatten)]
    pub dev: Dev,
    pub sync_state: SyncState,
    pub tracked_tokens: usize,
}

/// What a dashboard shows when a dev's address is clicked
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevProfile {
    pub dev: Dev,
    pub sync_state: SyncState,
    pub tokens: Vec<Token>,
    pub past_project_links: Vec<Option<String>>,
}

fn to_datetime(now: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now).unwrap_or_else(Utc::now)
}

pub struct Tracker {
    registry: DevRegistry,
    ledger: TokenLedger,
    filters: PanelFilters,
    chart_provider: ChartProvider,
    sol_price_usd: f64,
    feed_status: FeedStatus,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(PersistedState::default(), DEFAULT_SOL_PRICE_USD, 0)
    }
}

impl Tracker {
    pub fn new(state: PersistedState, sol_price_usd: f64, now: i64) -> Self {
        let filters = PanelFilters::default();
        let ledger = TokenLedger::new(state.tokens, &filters, now);
        Self {
            registry: DevRegistry::new(state.devs),
            ledger,
            filters,
            chart_provider: state.chart_provider.unwrap_or_default(),
            sol_price_usd,
            feed_status: FeedStatus::Disconnected,
        }
    }

    pub fn registry(&self) -> &DevRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn filters(&self) -> &PanelFilters {
        &self.filters
    }

    pub fn chart_provider(&self) -> ChartProvider {
        self.chart_provider
    }

    pub fn sol_price_usd(&self) -> f64 {
        self.sol_price_usd
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed_status
    }

    fn gate(&self, effects: Vec<Effect>) -> Vec<Effect> {
        if self.feed_status.is_connected() {
            effects
        } else {
            effects::without_subscriptions(effects)
        }
    }

    // -- Feed ---------------------------------------------------------------

    /// The full subscription set for a fresh connection
    pub fn initial_subscriptions(&self) -> Vec<Subscription> {
        let mut subscriptions = vec![Subscription::NewToken, Subscription::Migration];
        let followed = self.registry.followed_addresses();
        if !followed.is_empty() {
            subscriptions.push(Subscription::AccountTrade { keys: followed });
        }
        if !self.ledger.is_empty() {
            subscriptions.push(Subscription::TokenTrade {
                keys: self.ledger.mints(),
            });
        }
        subscriptions
    }

    pub fn set_feed_status(&mut self, status: FeedStatus) -> Vec<Effect> {
        if status == self.feed_status {
            return Vec::new();
        }
        self.feed_status = status;

        let mut effects = Vec::new();
        match status {
            FeedStatus::Connected => {
                self.registry.mark_followed(SyncState::Synced);
                effects.extend(self.initial_subscriptions().into_iter().map(Effect::Subscribe));
                effects.push(Effect::View(ViewEffect::DevsChanged));
            }
            FeedStatus::Disconnected => {
                self.registry.mark_followed(SyncState::Error);
                effects.push(Effect::View(ViewEffect::DevsChanged));
            }
            FeedStatus::Connecting => {}
        }
        effects.push(Effect::View(ViewEffect::Status { feed: status }));
        effects
    }

    pub fn handle_feed_event(&mut self, event: FeedEvent, now: i64) -> Vec<Effect> {
        let effects = match event {
            FeedEvent::TokenCreated(created) => {
                self.ledger
                    .apply_creation(&created, &mut self.registry, &self.filters, now)
            }
            FeedEvent::Trade(trade) => {
                self.ledger
                    .apply_trade(&trade, &mut self.registry, &self.filters, now)
            }
            FeedEvent::Graduation(graduation) => {
                self.ledger.apply_graduation(&graduation, &self.filters, now)
            }
            FeedEvent::Unrecognized(kind) => {
                debug!(kind = %kind, "Unrecognized feed message");
                Vec::new()
            }
        };
        self.gate(effects)
    }

    pub fn set_sol_price(&mut self, usd: f64) -> Vec<Effect> {
        if !usd.is_finite() || usd <= 0.0 {
            warn!(usd, "Ignoring invalid SOL price");
            return Vec::new();
        }
        self.sol_price_usd = usd;
        let mut effects = vec![Effect::View(ViewEffect::Price { sol_usd: usd })];
        effects.extend(self.ledger.refresh_cards());
        effects
    }

    // -- Timers -------------------------------------------------------------

    /// One-second cosmetic refresh of elapsed-time labels
    pub fn tick(&self, now: i64) -> Vec<Effect> {
        vec![Effect::View(ViewEffect::Tick {
            now,
            elapsed: self.ledger.elapsed_labels(now),
        })]
    }

    pub fn reconcile_all(&mut self, now: i64) -> Vec<Effect> {
        self.ledger.reconcile_all(&self.filters, now)
    }

    // -- Tokens -------------------------------------------------------------

    pub fn panel(&self, panel: PanelId, now: i64) -> Vec<Token> {
        self.ledger
            .panel(panel, &self.filters, now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.ledger.snapshot()
    }

    pub fn remove_token(&mut self, mint: &str) -> TrackerResult<(Token, Vec<Effect>)> {
        self.ledger
            .remove(mint)
            .ok_or_else(|| TrackerError::TokenNotFound(mint.to_string()))
    }

    pub fn clear_tokens(&mut self) -> (usize, Vec<Effect>) {
        self.ledger.clear()
    }

    // -- Devs ---------------------------------------------------------------

    fn account_resubscription(&self) -> Vec<Effect> {
        let followed = self.registry.followed_addresses();
        if followed.is_empty() {
            Vec::new()
        } else {
            vec![Effect::Subscribe(Subscription::AccountTrade { keys: followed })]
        }
    }

    fn devs_changed() -> Vec<Effect> {
        vec![
            Effect::Persist(PersistKey::Devs),
            Effect::View(ViewEffect::DevsChanged),
        ]
    }

    pub fn dev_summaries(&self) -> Vec<DevSummary> {
        self.registry
            .devs()
            .iter()
            .map(|dev| DevSummary {
                dev: dev.clone(),
                sync_state: self.registry.sync_state(&dev.address),
                tracked_tokens: self
                    .ledger
                    .tokens()
                    .iter()
                    .filter(|t| dev.matches_address(&t.creator))
                    .count(),
            })
            .collect()
    }

    pub fn dev_profile(&self, address: &str) -> Option<DevProfile> {
        let dev = self.registry.find_by_address(address)?;
        Some(DevProfile {
            dev: dev.clone(),
            sync_state: self.registry.sync_state(&dev.address),
            tokens: self
                .ledger
                .tokens()
                .into_iter()
                .filter(|t| dev.matches_address(&t.creator))
                .cloned()
                .collect(),
            past_project_links: dev
                .past_projects
                .iter()
                .map(|p| p.chart_link(self.chart_provider))
                .collect(),
        })
    }

    pub fn add_dev(&mut self, draft: DevDraft, now: i64) -> TrackerResult<(Dev, Vec<Effect>)> {
        let dev = self.registry.add(draft, to_datetime(now))?.clone();
        if self.feed_status.is_connected() {
            self.registry.mark(&dev.address, SyncState::Synced);
        }
        let mut effects = Self::devs_changed();
        effects.extend(self.account_resubscription());
        Ok((dev, self.gate(effects)))
    }

    pub fn remove_dev(&mut self, id: &str) -> TrackerResult<(Dev, Vec<Effect>)> {
        let dev = self.registry.remove(id)?;
        let mut effects = Self::devs_changed();
        effects.extend(self.account_resubscription());
        Ok((dev, self.gate(effects)))
    }

    /// Destructive edit; the caller re-adds the returned draft
    pub fn edit_dev(&mut self, id: &str) -> TrackerResult<(DevDraft, Vec<Effect>)> {
        let draft = self.registry.edit(id)?;
        Ok((draft, Self::devs_changed()))
    }

    pub fn toggle_follow(&mut self, id: &str) -> TrackerResult<(Dev, Vec<Effect>)> {
        let dev = self.registry.toggle_follow(id)?.clone();
        let mut effects = Self::devs_changed();
        if dev.following {
            effects.push(Effect::Subscribe(Subscription::AccountTrade {
                keys: vec![dev.address.clone()],
            }));
        }
        Ok((dev, self.gate(effects)))
    }

    /// Re-send one dev's account subscription, or mark it errored when offline
    pub fn sync_dev(&mut self, id: &str) -> TrackerResult<(SyncState, Vec<Effect>)> {
        let address = self
            .registry
            .get(id)
            .map(|dev| dev.address.clone())
            .ok_or_else(|| TrackerError::DevNotFound(id.to_string()))?;

        let mut effects = vec![Effect::View(ViewEffect::DevsChanged)];
        let state = if self.feed_status.is_connected() {
            effects.push(Effect::Subscribe(Subscription::AccountTrade {
                keys: vec![address.clone()],
            }));
            SyncState::Synced
        } else {
            SyncState::Error
        };
        self.registry.mark(&address, state);
        info!(address = %address, state = ?state, "Dev sync requested");
        Ok((state, effects))
    }

    /// Re-send the account subscription for every followed dev
    pub fn sync_all(&mut self) -> TrackerResult<(usize, Vec<Effect>)> {
        if !self.feed_status.is_connected() {
            return Err(TrackerError::NotConnected);
        }
        let followed = self.registry.followed_addresses();
        self.registry.mark_followed(SyncState::Synced);
        let mut effects = vec![Effect::View(ViewEffect::DevsChanged)];
        effects.extend(self.account_resubscription());
        Ok((followed.len(), effects))
    }

    pub fn import_devs(&mut self, devs: Vec<Dev>, now: i64) -> (ImportCounts, Vec<Effect>) {
        let counts = self.registry.import(devs, to_datetime(now));
        if counts.added == 0 {
            return (counts, Vec::new());
        }
        if self.feed_status.is_connected() {
            self.registry.mark_followed(SyncState::Synced);
        }
        let mut effects = Self::devs_changed();
        effects.extend(self.account_resubscription());
        (counts, self.gate(effects))
    }

    pub fn export_devs(&self) -> Vec<Dev> {
        self.registry.export()
    }

    pub fn clear_devs(&mut self) -> (usize, Vec<Effect>) {
        let removed = self.registry.clear();
        (removed, Self::devs_changed())
    }

    // -- Settings -----------------------------------------------------------

    pub fn set_filter(&mut self, panel: PanelId, filter: PanelFilter, now: i64) -> TrackerResult<Vec<Effect>> {
        filter.validate()?;
        self.filters.set(panel, filter);
        info!(panel = %panel, "Panel filter updated");
        let mut effects = vec![Effect::View(ViewEffect::FiltersChanged { panel })];
        effects.extend(self.ledger.reconcile_all(&self.filters, now));
        Ok(effects)
    }

    pub fn reset_filter(&mut self, panel: PanelId, now: i64) -> Vec<Effect> {
        self.filters.reset(panel);
        info!(panel = %panel, "Panel filter reset");
        let mut effects = vec![Effect::View(ViewEffect::FiltersChanged { panel })];
        effects.extend(self.ledger.reconcile_all(&self.filters, now));
        effects
    }

    pub fn set_chart_provider(&mut self, provider: ChartProvider) -> Vec<Effect> {
        self.chart_provider = provider;
        info!(provider = %provider, "Chart provider set");
        let mut effects = vec![
            Effect::Persist(PersistKey::ChartProvider),
            Effect::View(ViewEffect::ChartProviderChanged { provider }),
        ];
        effects.extend(self.ledger.refresh_cards());
        effects
    }

    pub fn toggle_chart_provider(&mut self) -> (ChartProvider, Vec<Effect>) {
        let provider = self.chart_provider.toggled();
        (provider, self.set_chart_provider(provider))
    }

    pub fn export_settings(&self, now: i64) -> SettingsBundle {
        SettingsBundle {
            version: SETTINGS_VERSION.to_string(),
            export_date: to_datetime(now),
            devs: self.registry.export(),
            filters: self.filters.clone(),
            chart_provider: self.chart_provider,
            tokens: self.ledger.snapshot(),
        }
    }

    /// Apply a settings document: merge devs, replace filters, chart provider
    /// and (when present) the token set, then rebuild panels.
    pub fn import_settings(
        &mut self,
        settings: SettingsImport,
        now: i64,
    ) -> TrackerResult<(ImportSummary, Vec<Effect>)> {
        settings::validate_settings(&settings)?;
        let provider = match settings.chart_provider.as_deref() {
            Some(name) => match name.parse::<ChartProvider>() {
                Ok(provider) => Some(provider),
                Err(_) => {
                    warn!(provider = name, "Ignoring unknown chart provider in settings");
                    None
                }
            },
            None => None,
        };

        let mut summary = ImportSummary::default();
        let mut effects = Vec::new();

        if let Some(devs) = settings.devs {
            let (counts, dev_effects) = self.import_devs(devs, now);
            summary.devs_added = counts.added;
            summary.devs_skipped = counts.skipped;
            effects.extend(dev_effects);
        }

        let replaced_panels: Vec<PanelId> = settings
            .filters
            .as_ref()
            .map(|filters| filters.keys().copied().collect())
            .unwrap_or_default();
        let (filters, replaced) = settings::merged_filters(&self.filters, settings.filters);
        self.filters = filters;
        summary.filters_replaced = replaced;
        effects.extend(
            replaced_panels
                .into_iter()
                .map(|panel| Effect::View(ViewEffect::FiltersChanged { panel })),
        );

        if let Some(provider) = provider {
            summary.chart_provider_changed = provider != self.chart_provider;
            effects.extend(self.set_chart_provider(provider));
        }

        if let Some(tokens) = settings.tokens {
            summary.tokens_replaced = Some(tokens.len());
            effects.extend(self.ledger.replace_all(tokens, &self.filters, now));
        } else {
            effects.extend(self.ledger.reconcile_all(&self.filters, now));
        }

        info!(
            devs_added = summary.devs_added,
            filters = summary.filters_replaced,
            tokens = ?summary.tokens_replaced,
            "Settings imported"
        );
        Ok((summary, self.gate(effects)))
    }

    // -- Status -------------------------------------------------------------

    pub fn status(&self) -> StatusSnapshot {
        let board = self.ledger.board();
        StatusSnapshot {
            feed: self.feed_status,
            sol_price_usd: self.sol_price_usd,
            chart_provider: self.chart_provider,
            devs: self.registry.len(),
            followed_devs: self.registry.followed_addresses().len(),
            tokens: self.ledger.len(),
            new_launches: board.count(PanelId::NewLaunches),
            active_tokens: board.count(PanelId::ActiveTokens),
            graduated: board.count(PanelId::Graduated),
        }
    }
}
