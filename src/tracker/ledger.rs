//! Token ledger
//!
//! Mint → token state, plus the panel board recording what dashboards show.
//! Each operation mutates state and returns the effects needed to bring the
//! feed subscriptions, the views and the persisted copy in line.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::effects::{AlertKind, Effect, PersistKey, ViewEffect};
use super::panels::{self, PanelBoard, PanelFilters, PanelId};
use super::registry::DevRegistry;
use super::types::{format_usd, shorten_address, Token};
use crate::feed::{Graduation, Subscription, TokenCreated, Trade};

#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: HashMap<String, Token>,
    board: PanelBoard,
}

/// Keep the previous value when the new one is zero or unusable
fn keep_if_zero(new: f64, previous: f64) -> f64 {
    if new.is_finite() && new != 0.0 {
        new
    } else {
        previous
    }
}

impl TokenLedger {
    /// Build from persisted tokens and place them on the board
    pub fn new(tokens: Vec<Token>, filters: &PanelFilters, now: i64) -> Self {
        let mut ledger = Self {
            tokens: tokens.into_iter().map(|t| (t.mint.clone(), t)).collect(),
            board: PanelBoard::new(),
        };
        ledger.reconcile_all(filters, now);
        ledger
    }

    pub fn get(&self, mint: &str) -> Option<&Token> {
        self.tokens.get(mint)
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.tokens.contains_key(mint)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn board(&self) -> &PanelBoard {
        &self.board
    }

    /// All mints, sorted
    pub fn mints(&self) -> Vec<String> {
        let mut mints: Vec<String> = self.tokens.keys().cloned().collect();
        mints.sort();
        mints
    }

    /// All tokens, oldest launch first
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = self.tokens.values().collect();
        tokens.sort_by(|a, b| a.launch_time.cmp(&b.launch_time).then_with(|| a.mint.cmp(&b.mint)));
        tokens
    }

    /// Owned copy for persistence and export
    pub fn snapshot(&self) -> Vec<Token> {
        self.tokens().into_iter().cloned().collect()
    }

    /// Tokens matching a panel, in display order
    pub fn panel(&self, panel: PanelId, filters: &PanelFilters, now: i64) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = self
            .tokens
            .values()
            .filter(|token| panels::qualifies(panel, token, filters, now))
            .collect();
        panels::sort_for_panel(panel, &mut tokens);
        tokens
    }

    /// Track a launch by a followed dev
    pub fn apply_creation(
        &mut self,
        event: &TokenCreated,
        registry: &mut DevRegistry,
        filters: &PanelFilters,
        now: i64,
    ) -> Vec<Effect> {
        let Some(dev) = registry.followed(&event.creator) else {
            debug!(mint = %event.mint, creator = %event.creator, "Ignoring launch by unfollowed wallet");
            return Vec::new();
        };
        if self.tokens.contains_key(&event.mint) {
            debug!(mint = %event.mint, "Ignoring duplicate creation");
            return Vec::new();
        }

        let dev_name = dev.name.clone();
        let mut token = Token::launched(event.mint.clone(), event.creator.clone(), now);
        if let Some(name) = &event.name {
            token.name = name.clone();
        }
        if let Some(symbol) = &event.symbol {
            token.symbol = symbol.clone();
        }
        token.uri = event.uri.clone();
        token.dev_name = dev_name.clone();
        token.price = event.market.price_usd;
        token.market_cap = event.market.market_cap_usd;
        token.market_cap_sol = event.market.market_cap_sol;
        token.bonding_progress = event.market.bonding_progress;
        token.v_sol_in_bonding_curve = event.market.v_sol_in_bonding_curve;

        info!(
            mint = %token.mint,
            symbol = %token.symbol,
            dev = %dev_name,
            market_cap = token.market_cap,
            "New launch by followed dev"
        );

        let alert = ViewEffect::Alert {
            alert: AlertKind::NewLaunch,
            mint: token.mint.clone(),
            title: format!("New launch by {}", dev_name),
            message: format!("{} (${}) just launched", token.name, token.symbol),
        };

        registry.record_launch(&event.creator);
        self.tokens.insert(token.mint.clone(), token);

        let mut effects = vec![Effect::Subscribe(Subscription::TokenTrade {
            keys: vec![event.mint.clone()],
        })];
        effects.extend(self.reconcile(&event.mint, filters, now));
        effects.push(Effect::View(alert));
        effects.push(Effect::Persist(PersistKey::Tokens));
        effects.push(Effect::Persist(PersistKey::Devs));
        effects
    }

    /// Apply a trade to a tracked token; unknown mints are ignored
    pub fn apply_trade(
        &mut self,
        event: &Trade,
        registry: &mut DevRegistry,
        filters: &PanelFilters,
        now: i64,
    ) -> Vec<Effect> {
        let Some(token) = self.tokens.get_mut(&event.mint) else {
            return Vec::new();
        };

        let market = &event.market;
        token.price = keep_if_zero(market.price_usd, token.price);
        token.market_cap = keep_if_zero(market.market_cap_usd, token.market_cap);
        token.market_cap_sol = keep_if_zero(market.market_cap_sol, token.market_cap_sol);
        token.bonding_progress = keep_if_zero(market.bonding_progress, token.bonding_progress);
        token.v_sol_in_bonding_curve =
            keep_if_zero(market.v_sol_in_bonding_curve, token.v_sol_in_bonding_curve);
        if event.volume_usd.is_finite() && event.volume_usd > 0.0 {
            token.volume += event.volume_usd;
        }
        if event.is_buy {
            token.buy_count += 1;
        } else {
            token.sell_count += 1;
        }

        debug!(
            mint = %token.mint,
            side = if event.is_buy { "buy" } else { "sell" },
            volume_usd = event.volume_usd,
            market_cap = token.market_cap,
            "Trade applied"
        );

        let creator = token.creator.clone();
        let snapshot = token.clone();
        let mut effects = Vec::new();

        let showing = self.board.panels_showing(&event.mint);
        if !showing.is_empty() {
            effects.push(Effect::View(ViewEffect::CardUpdated {
                panels: showing,
                token: snapshot,
            }));
        }
        if self.board.contains(PanelId::ActiveTokens, &event.mint) {
            effects.push(Effect::View(ViewEffect::PanelResorted {
                panel: PanelId::ActiveTokens,
            }));
        }
        effects.extend(self.reconcile(&event.mint, filters, now));
        effects.push(Effect::Persist(PersistKey::Tokens));
        if registry.record_volume(&creator, event.volume_usd) {
            effects.push(Effect::Persist(PersistKey::Devs));
        }
        effects
    }

    /// Mark a tracked token graduated. Repeats and unknown mints are no-ops.
    pub fn apply_graduation(&mut self, event: &Graduation, filters: &PanelFilters, now: i64) -> Vec<Effect> {
        let Some(token) = self.tokens.get_mut(&event.mint) else {
            return Vec::new();
        };
        if token.graduated {
            debug!(mint = %event.mint, "Ignoring repeated graduation");
            return Vec::new();
        }

        token.graduated = true;
        token.graduated_at = Some(now);
        info!(mint = %token.mint, symbol = %token.symbol, market_cap = token.market_cap, "Token graduated");

        let alert = ViewEffect::Alert {
            alert: AlertKind::Graduation,
            mint: token.mint.clone(),
            title: format!("{} graduated", token.symbol),
            message: format!(
                "{} by {} completed its bonding curve at {}",
                token.name,
                if token.dev_name.is_empty() {
                    shorten_address(&token.creator)
                } else {
                    token.dev_name.clone()
                },
                format_usd(token.market_cap)
            ),
        };

        let mut effects = vec![Effect::View(alert)];
        effects.extend(self.reconcile(&event.mint, filters, now));
        effects.push(Effect::Persist(PersistKey::Tokens));
        effects
    }

    /// Bring the board in line with a token's current qualification
    pub fn reconcile(&mut self, mint: &str, filters: &PanelFilters, now: i64) -> Vec<Effect> {
        let Some(token) = self.tokens.get(mint) else {
            return self
                .board
                .remove_everywhere(mint)
                .into_iter()
                .map(|panel| {
                    Effect::View(ViewEffect::CardRemoved {
                        panel,
                        mint: mint.to_string(),
                    })
                })
                .collect();
        };

        let mut effects = Vec::new();
        for panel in PanelId::ALL {
            let qualifies = panels::qualifies(panel, token, filters, now);
            let shown = self.board.contains(panel, mint);
            if qualifies && !shown {
                self.board.insert(panel, mint);
                effects.push(Effect::View(ViewEffect::CardInserted {
                    panel,
                    token: token.clone(),
                }));
            } else if !qualifies && shown {
                self.board.remove(panel, mint);
                effects.push(Effect::View(ViewEffect::CardRemoved {
                    panel,
                    mint: mint.to_string(),
                }));
            }
        }
        effects
    }

    /// Reconcile every tracked token and drop board entries for untracked mints
    pub fn reconcile_all(&mut self, filters: &PanelFilters, now: i64) -> Vec<Effect> {
        let mut mints = self.mints();
        for panel in PanelId::ALL {
            for mint in self.board.mints(panel) {
                if !self.tokens.contains_key(mint) {
                    mints.push(mint.to_string());
                }
            }
        }
        mints.sort();
        mints.dedup();

        let mut effects = Vec::new();
        for mint in mints {
            effects.extend(self.reconcile(&mint, filters, now));
        }
        effects
    }

    /// Stop tracking a token
    pub fn remove(&mut self, mint: &str) -> Option<(Token, Vec<Effect>)> {
        let token = self.tokens.remove(mint)?;
        let mut effects: Vec<Effect> = self
            .board
            .remove_everywhere(mint)
            .into_iter()
            .map(|panel| {
                Effect::View(ViewEffect::CardRemoved {
                    panel,
                    mint: mint.to_string(),
                })
            })
            .collect();
        effects.push(Effect::Persist(PersistKey::Tokens));
        info!(mint, "Token removed");
        Some((token, effects))
    }

    /// Drop every token, returning how many were removed
    pub fn clear(&mut self) -> (usize, Vec<Effect>) {
        let removed = self.tokens.len();
        self.tokens.clear();
        self.board.clear();

        let mut effects: Vec<Effect> = PanelId::ALL
            .into_iter()
            .map(|panel| Effect::View(ViewEffect::PanelCleared { panel }))
            .collect();
        effects.push(Effect::Persist(PersistKey::Tokens));
        info!(removed, "All tokens cleared");
        (removed, effects)
    }

    /// Replace the whole token set and rebuild the board
    pub fn replace_all(&mut self, tokens: Vec<Token>, filters: &PanelFilters, now: i64) -> Vec<Effect> {
        let (_, mut effects) = self.clear();
        self.tokens = tokens.into_iter().map(|t| (t.mint.clone(), t)).collect();
        effects.extend(self.reconcile_all(filters, now));
        if !self.tokens.is_empty() {
            effects.push(Effect::Subscribe(Subscription::TokenTrade { keys: self.mints() }));
        }
        effects
    }

    /// Elapsed-time labels for every token currently on a panel
    pub fn elapsed_labels(&self, now: i64) -> BTreeMap<String, String> {
        PanelId::ALL
            .into_iter()
            .flat_map(|panel| self.board.mints(panel))
            .filter_map(|mint| self.tokens.get(mint))
            .map(|token| (token.mint.clone(), token.elapsed_label(now)))
            .collect()
    }

    /// Card updates for every shown token, e.g. after a price change
    pub fn refresh_cards(&self) -> Vec<Effect> {
        self.tokens()
            .into_iter()
            .filter_map(|token| {
                let panels = self.board.panels_showing(&token.mint);
                if panels.is_empty() {
                    None
                } else {
                    Some(Effect::View(ViewEffect::CardUpdated {
                        panels,
                        token: token.clone(),
                    }))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MarketSnapshot;
    use crate::tracker::types::DevDraft;
    use chrono::Utc;

    const MINUTE: i64 = 60_000;
    const NOW: i64 = 1_000 * MINUTE;

    fn registry() -> DevRegistry {
        let mut registry = DevRegistry::default();
        registry.add(DevDraft::new("alpha", "DevA"), Utc::now()).unwrap();
        registry
    }

    fn creation(mint: &str, creator: &str, market_cap_usd: f64) -> TokenCreated {
        TokenCreated {
            mint: mint.to_string(),
            creator: creator.to_string(),
            name: Some("Foo".to_string()),
            symbol: Some("FOO".to_string()),
            uri: None,
            market: MarketSnapshot {
                market_cap_sol: market_cap_usd / 100.0,
                market_cap_usd,
                price_usd: market_cap_usd / 1e9,
                bonding_progress: 10.0,
                v_sol_in_bonding_curve: 30.0,
            },
        }
    }

    fn trade(mint: &str, is_buy: bool, market_cap_usd: f64, volume_usd: f64) -> Trade {
        Trade {
            mint: mint.to_string(),
            trader: None,
            is_buy,
            volume_usd,
            market: MarketSnapshot {
                market_cap_sol: market_cap_usd / 100.0,
                market_cap_usd,
                price_usd: market_cap_usd / 1e9,
                bonding_progress: 0.0,
                v_sol_in_bonding_curve: 0.0,
            },
        }
    }

    fn inserted_panels(effects: &[Effect]) -> Vec<PanelId> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::View(ViewEffect::CardInserted { panel, .. }) => Some(*panel),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_creation_by_followed_dev() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let filters = PanelFilters::default();

        let effects = ledger.apply_creation(&creation("M1", "deva", 5_000.0), &mut registry, &filters, NOW);

        let token = ledger.get("M1").unwrap();
        assert_eq!(token.dev_name, "alpha");
        assert_eq!(token.launch_time, NOW);
        assert_eq!(token.volume, 0.0);
        assert_eq!(token.buy_count, 0);
        assert_eq!(registry.find_by_address("DevA").unwrap().launches, 1);

        assert_eq!(
            effects[0],
            Effect::Subscribe(Subscription::TokenTrade {
                keys: vec!["M1".to_string()]
            })
        );
        assert_eq!(
            inserted_panels(&effects),
            vec![PanelId::NewLaunches, PanelId::ActiveTokens]
        );
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::View(ViewEffect::Alert { alert: AlertKind::NewLaunch, .. })
        )));
        assert!(effects.contains(&Effect::Persist(PersistKey::Tokens)));
    }

    #[test]
    fn test_creation_by_unknown_wallet_is_ignored() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let effects = ledger.apply_creation(
            &creation("M1", "Stranger", 5_000.0),
            &mut registry,
            &PanelFilters::default(),
            NOW,
        );
        assert!(effects.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_creation_by_unfollowed_dev_is_ignored() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let id = registry.devs()[0].id.clone();
        registry.toggle_follow(&id).unwrap();

        let effects = ledger.apply_creation(
            &creation("M1", "DevA", 5_000.0),
            &mut registry,
            &PanelFilters::default(),
            NOW,
        );
        assert!(effects.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(registry.devs()[0].launches, 0);
    }

    #[test]
    fn test_trade_on_unknown_mint_is_noop() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let filters = PanelFilters::default();
        ledger.apply_creation(&creation("M1", "DevA", 5_000.0), &mut registry, &filters, NOW);
        let before = ledger.snapshot();

        let effects = ledger.apply_trade(&trade("Other", true, 9_000.0, 10.0), &mut registry, &filters, NOW);
        assert!(effects.is_empty());
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn test_trade_updates_token_and_dev() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let filters = PanelFilters::default();
        ledger.apply_creation(&creation("M1", "DevA", 5_000.0), &mut registry, &filters, NOW);

        let effects = ledger.apply_trade(&trade("M1", true, 8_000.0, 25.0), &mut registry, &filters, NOW);
        ledger.apply_trade(&trade("M1", false, 0.0, 5.0), &mut registry, &filters, NOW);

        let token = ledger.get("M1").unwrap();
        assert_eq!(token.buy_count, 1);
        assert_eq!(token.sell_count, 1);
        assert_eq!(token.volume, 30.0);
        // zero market cap on the second trade keeps the first value
        assert_eq!(token.market_cap, 8_000.0);
        assert_eq!(token.bonding_progress, 10.0);
        assert_eq!(registry.find_by_address("DevA").unwrap().total_volume, 30.0);

        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::View(ViewEffect::CardUpdated { panels, .. }) if panels.len() == 2
        )));
        assert!(effects.contains(&Effect::View(ViewEffect::PanelResorted {
            panel: PanelId::ActiveTokens
        })));
        assert!(effects.contains(&Effect::Persist(PersistKey::Devs)));
    }

    #[test]
    fn test_graduation_is_deduplicated() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let filters = PanelFilters::default();
        ledger.apply_creation(&creation("M1", "DevA", 80_000.0), &mut registry, &filters, NOW);

        let graduation = Graduation {
            mint: "M1".to_string(),
            signature: None,
        };
        let first = ledger.apply_graduation(&graduation, &filters, NOW + 1);
        let second = ledger.apply_graduation(&graduation, &filters, NOW + 2);

        assert!(second.is_empty());
        let token = ledger.get("M1").unwrap();
        assert!(token.graduated);
        assert_eq!(token.graduated_at, Some(NOW + 1));

        assert_eq!(inserted_panels(&first), vec![PanelId::Graduated]);
        let removed: Vec<PanelId> = first
            .iter()
            .filter_map(|e| match e {
                Effect::View(ViewEffect::CardRemoved { panel, .. }) => Some(*panel),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![PanelId::NewLaunches, PanelId::ActiveTokens]);

        let unknown = ledger.apply_graduation(
            &Graduation {
                mint: "Nope".to_string(),
                signature: None,
            },
            &filters,
            NOW,
        );
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_aging_moves_token_out_of_new_launches() {
        let mut ledger = TokenLedger::default();
        let mut registry = registry();
        let filters = PanelFilters::default();
        ledger.apply_creation(&creation("M1", "DevA", 5_000.0), &mut registry, &filters, NOW - 6 * MINUTE);

        let effects = ledger.reconcile_all(&filters, NOW);
        assert_eq!(
            effects,
            vec![Effect::View(ViewEffect::CardRemoved {
                panel: PanelId::NewLaunches,
                mint: "M1".to_string()
            })]
        );
        assert!(ledger.board().contains(PanelId::ActiveTokens, "M1"));
        assert!(ledger.contains("M1"));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut ledger = TokenLedger::new(
            vec![Token::launched("M1", "DevA", NOW - 10 * MINUTE)],
            &PanelFilters::default(),
            NOW - 10 * MINUTE,
        );
        let filters = PanelFilters::default();

        let first = ledger.reconcile_all(&filters, NOW);
        let board_after_first: Vec<Vec<PanelId>> = vec![ledger.board().panels_showing("M1")];
        let second = ledger.reconcile_all(&filters, NOW);

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(vec![ledger.board().panels_showing("M1")], board_after_first);
    }

    #[test]
    fn test_panel_listing() {
        let mut a = Token::launched("A", "DevA", NOW - 10 * MINUTE);
        a.market_cap = 1_000.0;
        let mut b = Token::launched("B", "DevA", NOW - 20 * MINUTE);
        b.market_cap = 9_000.0;
        let c = Token::launched("C", "DevA", NOW - MINUTE);
        let filters = PanelFilters::default();
        let ledger = TokenLedger::new(vec![a, b, c], &filters, NOW);

        let active: Vec<&str> = ledger
            .panel(PanelId::ActiveTokens, &filters, NOW)
            .iter()
            .map(|t| t.mint.as_str())
            .collect();
        assert_eq!(active, vec!["B", "A", "C"]);

        let new: Vec<&str> = ledger
            .panel(PanelId::NewLaunches, &filters, NOW)
            .iter()
            .map(|t| t.mint.as_str())
            .collect();
        assert_eq!(new, vec!["C"]);
    }

    #[test]
    fn test_remove_clear_and_replace() {
        let filters = PanelFilters::default();
        let mut ledger = TokenLedger::new(
            vec![
                Token::launched("A", "DevA", NOW),
                Token::launched("B", "DevA", NOW),
            ],
            &filters,
            NOW,
        );

        let (removed, effects) = ledger.remove("A").unwrap();
        assert_eq!(removed.mint, "A");
        assert!(effects.contains(&Effect::View(ViewEffect::CardRemoved {
            panel: PanelId::NewLaunches,
            mint: "A".to_string()
        })));
        assert!(ledger.remove("A").is_none());

        let (count, _) = ledger.clear();
        assert_eq!(count, 1);
        assert_eq!(ledger.board().count(PanelId::ActiveTokens), 0);

        let effects = ledger.replace_all(vec![Token::launched("C", "DevA", NOW)], &filters, NOW);
        assert!(ledger.contains("C"));
        assert!(effects.contains(&Effect::Subscribe(Subscription::TokenTrade {
            keys: vec!["C".to_string()]
        })));
    }

    #[test]
    fn test_elapsed_labels_cover_shown_tokens() {
        let filters = PanelFilters::default();
        let ledger = TokenLedger::new(vec![Token::launched("A", "DevA", NOW - 65_000)], &filters, NOW);
        let labels = ledger.elapsed_labels(NOW);
        assert_eq!(labels.get("A").map(String::as_str), Some("1:05"));
    }
}
