//! Persistence adapter
//!
//! Reads and writes the tracker's durable state through a `KeyValueStore`:
//! - `followedDevs`: JSON array of devs
//! - `trackedTokens`: JSON array of tokens
//! - `chartProvider`: the bare provider name
//!
//! Values use the same shape the browser dashboard kept in local storage, so
//! those exports can be dropped into the data directory directly.

pub mod error;
pub mod kv;

pub use error::{StoreError, StoreResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

use crate::tracker::{ChartProvider, Dev, PersistKey, PersistedState, Token, Tracker};

pub const DEVS_KEY: &str = "followedDevs";
pub const TOKENS_KEY: &str = "trackedTokens";
pub const CHART_PROVIDER_KEY: &str = "chartProvider";

impl PersistKey {
    pub fn as_key(&self) -> &'static str {
        match self {
            PersistKey::Devs => DEVS_KEY,
            PersistKey::Tokens => TOKENS_KEY,
            PersistKey::ChartProvider => CHART_PROVIDER_KEY,
        }
    }
}

/// Typed access to the persisted keys
pub struct TrackerStore<S: KeyValueStore> {
    backend: S,
    /// Keys whose stored value could not be read or set aside; never written
    held: BTreeSet<&'static str>,
    /// Keys holding copies of unreadable values
    set_aside: Vec<String>,
}

impl<S: KeyValueStore> TrackerStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            held: BTreeSet::new(),
            set_aside: Vec::new(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.backend.get(key)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let text = serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.backend.set(key, &text)
    }

    pub fn load_devs(&self) -> StoreResult<Vec<Dev>> {
        Ok(self.load_json(DEVS_KEY)?.unwrap_or_default())
    }

    pub fn save_devs(&mut self, devs: &[Dev]) -> StoreResult<()> {
        self.save_json(DEVS_KEY, devs)
    }

    pub fn load_tokens(&self) -> StoreResult<Vec<Token>> {
        Ok(self.load_json(TOKENS_KEY)?.unwrap_or_default())
    }

    pub fn save_tokens(&mut self, tokens: &[Token]) -> StoreResult<()> {
        if tokens.is_empty() {
            return self.backend.remove(TOKENS_KEY);
        }
        self.save_json(TOKENS_KEY, tokens)
    }

    pub fn load_chart_provider(&self) -> StoreResult<Option<ChartProvider>> {
        match self.backend.get(CHART_PROVIDER_KEY)? {
            // Older files hold a JSON string, the dashboard wrote the bare name
            Some(text) => text
                .trim()
                .trim_matches('"')
                .parse()
                .map(Some)
                .map_err(|e: crate::tracker::TrackerError| StoreError::Corrupt {
                    key: CHART_PROVIDER_KEY.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn save_chart_provider(&mut self, provider: ChartProvider) -> StoreResult<()> {
        self.backend.set(CHART_PROVIDER_KEY, provider.as_str())
    }

    /// Load everything, starting empty for any key that cannot be read.
    ///
    /// An undecodable value is first copied to `<key>-corrupt-<ms>`. When it
    /// cannot be copied (or not even read) the key is held: later writes to
    /// it are skipped, so the original stays on disk.
    pub fn load_state(&mut self) -> PersistedState {
        let devs = match self.load_devs() {
            Ok(devs) => devs,
            Err(e) => {
                self.recover(DEVS_KEY, &e);
                Vec::new()
            }
        };
        let tokens = match self.load_tokens() {
            Ok(tokens) => tokens,
            Err(e) => {
                self.recover(TOKENS_KEY, &e);
                Vec::new()
            }
        };
        let chart_provider = match self.load_chart_provider() {
            Ok(provider) => provider,
            Err(e) => {
                self.recover(CHART_PROVIDER_KEY, &e);
                None
            }
        };
        debug!(devs = devs.len(), tokens = tokens.len(), "Loaded persisted state");

        PersistedState {
            devs,
            tokens,
            chart_provider,
        }
    }

    /// Keep an unreadable value out of harm's way before starting empty
    fn recover(&mut self, key: &'static str, cause: &StoreError) {
        let raw = match (cause, self.backend.get(key)) {
            (StoreError::Corrupt { .. }, Ok(Some(raw))) => raw,
            _ => {
                error!(key, error = %cause, "Could not read saved state; it will not be overwritten");
                self.held.insert(key);
                return;
            }
        };

        let backup = format!("{}-corrupt-{}", key, chrono::Utc::now().timestamp_millis());
        match self.backend.set(&backup, &raw) {
            Ok(()) => {
                warn!(key, backup = %backup, error = %cause, "Saved state is corrupt, copied aside and starting empty");
                self.set_aside.push(backup);
            }
            Err(e) => {
                error!(key, error = %e, "Could not copy corrupt state aside; it will not be overwritten");
                self.held.insert(key);
            }
        }
    }

    /// Backup keys written by `load_state`
    pub fn set_aside_keys(&self) -> &[String] {
        &self.set_aside
    }

    pub fn is_held(&self, key: PersistKey) -> bool {
        self.held.contains(&key.as_key())
    }

    /// Write one key from the tracker's current state
    pub fn persist(&mut self, key: PersistKey, tracker: &Tracker) -> StoreResult<()> {
        if self.is_held(key) {
            debug!(key = key.as_key(), "Skipping write to held key");
            return Ok(());
        }
        match key {
            PersistKey::Devs => self.save_devs(tracker.registry().devs()),
            PersistKey::Tokens => self.save_tokens(&tracker.tokens()),
            PersistKey::ChartProvider => self.save_chart_provider(tracker.chart_provider()),
        }
    }

    /// Write every key
    pub fn persist_all(&mut self, tracker: &Tracker) -> StoreResult<()> {
        for key in [PersistKey::Devs, PersistKey::Tokens, PersistKey::ChartProvider] {
            self.persist(key, tracker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::DevDraft;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip_through_files() {
        let dir = tempdir().unwrap();
        let mut tracker = Tracker::default();
        tracker.add_dev(DevDraft::new("alpha", "DevA"), 1_000).unwrap();
        tracker.set_chart_provider(ChartProvider::Photon);

        {
            let mut store = TrackerStore::new(FileStore::open(dir.path()).unwrap());
            store.persist_all(&tracker).unwrap();
        }

        let mut store = TrackerStore::new(FileStore::open(dir.path()).unwrap());
        let state = store.load_state();
        assert_eq!(state.devs, tracker.registry().devs());
        assert!(state.tokens.is_empty());
        assert_eq!(state.chart_provider, Some(ChartProvider::Photon));
    }

    #[test]
    fn test_reads_browser_local_storage_values() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                DEVS_KEY,
                r#"[{"id":1712345678901,"name":"alpha","address":"DevA","notes":"","pastProjects":[],"following":true,"launches":4,"totalVolume":"250.5","addedAt":"2024-04-05T19:34:38.901Z"}]"#,
            )
            .unwrap();
        backend
            .set(
                TOKENS_KEY,
                r#"[{"mint":"M1","name":"Foo","symbol":"FOO","creator":"DevA","devName":"alpha","launchTime":1712345678901,"price":0.0000055,"marketCap":5500,"marketCapSol":30,"volume24h":100,"buyCount":3,"sellCount":1,"bondingProgress":12.5,"graduated":false,"vSolInBondingCurve":32}]"#,
            )
            .unwrap();
        backend.set(CHART_PROVIDER_KEY, "photon").unwrap();

        let mut store = TrackerStore::new(backend);
        let state = store.load_state();
        assert_eq!(state.devs[0].id, "1712345678901");
        assert_eq!(state.devs[0].total_volume, 250.5);
        assert_eq!(state.tokens[0].buy_count, 3);
        assert_eq!(state.chart_provider, Some(ChartProvider::Photon));
    }

    #[test]
    fn test_corrupt_values_fall_back_to_empty() {
        let mut backend = MemoryStore::new();
        backend.set(DEVS_KEY, "{not json").unwrap();
        backend.set(CHART_PROVIDER_KEY, "dexscreener").unwrap();

        let mut store = TrackerStore::new(backend);
        assert!(matches!(store.load_devs(), Err(StoreError::Corrupt { .. })));

        let state = store.load_state();
        assert!(state.devs.is_empty());
        assert_eq!(state.chart_provider, None);
        assert_eq!(store.set_aside_keys().len(), 2);
    }

    #[test]
    fn test_corrupt_devs_file_survives_next_write() {
        let dir = tempdir().unwrap();
        let original = r#"[{"name":"alpha","address":"DevA"},"#;
        std::fs::write(dir.path().join("followedDevs.json"), original).unwrap();

        let mut store = TrackerStore::new(FileStore::open(dir.path()).unwrap());
        let state = store.load_state();
        assert!(state.devs.is_empty());

        let mut tracker = Tracker::new(state, 100.0, 0);
        tracker.add_dev(DevDraft::new("beta", "DevB"), 1).unwrap();
        store.persist_all(&tracker).unwrap();

        let backups = store.set_aside_keys();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("followedDevs-corrupt-"));
        let copied =
            std::fs::read_to_string(dir.path().join(format!("{}.json", backups[0]))).unwrap();
        assert_eq!(copied, original);
    }

    #[test]
    fn test_unreadable_key_is_never_written() {
        struct Unreadable(MemoryStore);

        impl KeyValueStore for Unreadable {
            fn get(&self, key: &str) -> StoreResult<Option<String>> {
                if key == DEVS_KEY {
                    return Err(StoreError::io(
                        key,
                        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                    ));
                }
                self.0.get(key)
            }

            fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
                self.0.set(key, value)
            }

            fn remove(&mut self, key: &str) -> StoreResult<()> {
                self.0.remove(key)
            }
        }

        let mut store = TrackerStore::new(Unreadable(MemoryStore::new()));
        let state = store.load_state();
        assert!(store.is_held(PersistKey::Devs));
        assert!(!store.is_held(PersistKey::Tokens));

        let mut tracker = Tracker::new(state, 100.0, 0);
        tracker.add_dev(DevDraft::new("beta", "DevB"), 1).unwrap();
        store.persist_all(&tracker).unwrap();
        assert!(store.backend().0.get(DEVS_KEY).unwrap().is_none());
        assert!(store.backend().0.get(CHART_PROVIDER_KEY).unwrap().is_some());
    }

    #[test]
    fn test_empty_token_list_removes_key() {
        let mut store = TrackerStore::new(MemoryStore::new());
        store
            .save_tokens(&[Token::launched("M1", "DevA", 1)])
            .unwrap();
        assert!(store.backend().get(TOKENS_KEY).unwrap().is_some());

        store.save_tokens(&[]).unwrap();
        assert!(store.backend().get(TOKENS_KEY).unwrap().is_none());
    }
}
