//! Dev registry
//!
//! The followed wallets, keyed by address (case-insensitive), plus a per-dev
//! sync state describing whether the feed currently watches that address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::error::{TrackerError, TrackerResult};
use super::types::{Dev, DevDraft};

/// Whether the feed is known to be watching a dev's address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unknown,
    Synced,
    Error,
}

/// Result of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DevRegistry {
    devs: Vec<Dev>,
    sync: HashMap<String, SyncState>,
}

fn address_key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

fn new_dev_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl DevRegistry {
    /// Build from persisted records, filling in missing ids
    pub fn new(devs: Vec<Dev>) -> Self {
        let devs = devs
            .into_iter()
            .map(|mut dev| {
                if dev.id.is_empty() {
                    dev.id = new_dev_id();
                }
                dev
            })
            .collect();
        Self {
            devs,
            sync: HashMap::new(),
        }
    }

    pub fn devs(&self) -> &[Dev] {
        &self.devs
    }

    pub fn len(&self) -> usize {
        self.devs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Dev> {
        self.devs.iter().find(|dev| dev.id == id)
    }

    pub fn find_by_address(&self, address: &str) -> Option<&Dev> {
        self.devs.iter().find(|dev| dev.matches_address(address))
    }

    fn find_by_address_mut(&mut self, address: &str) -> Option<&mut Dev> {
        self.devs.iter_mut().find(|dev| dev.matches_address(address))
    }

    /// The dev owning `address`, only if it is followed
    pub fn followed(&self, address: &str) -> Option<&Dev> {
        self.find_by_address(address).filter(|dev| dev.following)
    }

    /// Addresses of followed devs, in registry order
    pub fn followed_addresses(&self) -> Vec<String> {
        self.devs
            .iter()
            .filter(|dev| dev.following)
            .map(|dev| dev.address.clone())
            .collect()
    }

    fn position(&self, id: &str) -> TrackerResult<usize> {
        self.devs
            .iter()
            .position(|dev| dev.id == id)
            .ok_or_else(|| TrackerError::DevNotFound(id.to_string()))
    }

    /// Add a followed dev
    pub fn add(&mut self, draft: DevDraft, now: DateTime<Utc>) -> TrackerResult<&Dev> {
        let name = draft.name.trim();
        let address = draft.address.trim();
        if name.is_empty() {
            return Err(TrackerError::MissingField("Dev name"));
        }
        if address.is_empty() {
            return Err(TrackerError::MissingField("Wallet address"));
        }
        if self.find_by_address(address).is_some() {
            return Err(TrackerError::DuplicateAddress(address.to_string()));
        }

        let dev = Dev {
            id: new_dev_id(),
            name: name.to_string(),
            address: address.to_string(),
            notes: draft.notes.trim().to_string(),
            past_projects: draft
                .past_projects
                .into_iter()
                .filter(|p| !p.name.trim().is_empty())
                .collect(),
            following: true,
            launches: 0,
            total_volume: 0.0,
            added_at: now,
        };
        info!(name = %dev.name, address = %dev.address, "Dev added");
        self.devs.push(dev);
        Ok(&self.devs[self.devs.len() - 1])
    }

    /// Remove a dev. Tokens attributed to it are left alone.
    pub fn remove(&mut self, id: &str) -> TrackerResult<Dev> {
        let index = self.position(id)?;
        let dev = self.devs.remove(index);
        self.sync.remove(&address_key(&dev.address));
        info!(name = %dev.name, address = %dev.address, "Dev removed");
        Ok(dev)
    }

    /// Destructive edit: the dev is removed and its fields handed back for re-entry
    pub fn edit(&mut self, id: &str) -> TrackerResult<DevDraft> {
        self.remove(id).map(DevDraft::from)
    }

    /// Flip the following flag, returning the updated dev
    pub fn toggle_follow(&mut self, id: &str) -> TrackerResult<&Dev> {
        let index = self.position(id)?;
        let dev = &mut self.devs[index];
        dev.following = !dev.following;
        info!(name = %dev.name, following = dev.following, "Dev follow toggled");
        Ok(&self.devs[index])
    }

    /// Merge devs by address; duplicates (including within `devs`) are skipped.
    ///
    /// An explicit `"following": false` is kept, so a paused dev stays paused
    /// across export and import. Devs without the field default to following.
    pub fn import(&mut self, devs: Vec<Dev>, now: DateTime<Utc>) -> ImportCounts {
        let mut counts = ImportCounts::default();
        for mut dev in devs {
            dev.address = dev.address.trim().to_string();
            if dev.address.is_empty() || self.find_by_address(&dev.address).is_some() {
                counts.skipped += 1;
                continue;
            }
            if dev.id.is_empty() || self.get(&dev.id).is_some() {
                dev.id = new_dev_id();
            }
            if dev.added_at.timestamp_millis() <= 0 {
                dev.added_at = now;
            }
            debug!(name = %dev.name, address = %dev.address, "Dev imported");
            self.devs.push(dev);
            counts.added += 1;
        }
        info!(added = counts.added, skipped = counts.skipped, "Dev import finished");
        counts
    }

    /// All devs, for export
    pub fn export(&self) -> Vec<Dev> {
        self.devs.clone()
    }

    /// Remove every dev, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.devs.len();
        self.devs.clear();
        self.sync.clear();
        info!(removed, "All devs cleared");
        removed
    }

    /// Count a launch against the dev owning `address`
    pub fn record_launch(&mut self, address: &str) {
        if let Some(dev) = self.find_by_address_mut(address) {
            dev.launches += 1;
        }
    }

    /// Add traded volume to the dev owning `address`; returns whether a dev matched
    pub fn record_volume(&mut self, address: &str, volume_usd: f64) -> bool {
        if volume_usd <= 0.0 || !volume_usd.is_finite() {
            return false;
        }
        match self.find_by_address_mut(address) {
            Some(dev) => {
                dev.total_volume += volume_usd;
                true
            }
            None => false,
        }
    }

    pub fn sync_state(&self, address: &str) -> SyncState {
        self.sync
            .get(&address_key(address))
            .copied()
            .unwrap_or_default()
    }

    pub fn mark(&mut self, address: &str, state: SyncState) {
        self.sync.insert(address_key(address), state);
    }

    /// Set the sync state of every followed dev
    pub fn mark_followed(&mut self, state: SyncState) {
        for address in self.followed_addresses() {
            self.mark(&address, state);
        }
    }
}
