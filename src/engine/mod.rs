//! Engine
//!
//! The single owner of tracker state. Feed input, price updates, timer ticks
//! and user commands all arrive on one queue and are processed strictly in
//! arrival order. After each command the resulting effects are carried out:
//! subscriptions go to the feed client, view effects to the broadcast channel
//! and changed keys to the store.

pub mod scheduler;

pub use scheduler::{ScheduledTask, Scheduler};

use chrono::Utc;
use std::collections::BTreeSet;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::feed::{interpret, parse_message, FeedEvent, FeedInput, Subscription};
use crate::oracle::PriceUpdate;
use crate::store::{KeyValueStore, TrackerStore};
use crate::tracker::{Effect, PersistKey, Tracker, TrackerResult, ViewEffect};

/// A closure run against the tracker on the engine task
pub type Job = Box<dyn FnOnce(&mut Tracker, i64) -> Vec<Effect> + Send>;

pub enum Command {
    Feed(FeedInput),
    Price(PriceUpdate),
    Scheduled(ScheduledTask),
    User(Job),
    /// Flush state and stop; the sender is notified when done
    Shutdown(oneshot::Sender<()>),
}

impl From<FeedInput> for Command {
    fn from(input: FeedInput) -> Self {
        Command::Feed(input)
    }
}

impl From<PriceUpdate> for Command {
    fn from(update: PriceUpdate) -> Self {
        Command::Price(update)
    }
}

impl From<ScheduledTask> for Command {
    fn from(task: ScheduledTask) -> Self {
        Command::Scheduled(task)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine is not running")]
    Stopped,
}

/// Cloneable handle for talking to the engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
    views: broadcast::Sender<ViewEffect>,
}

impl EngineHandle {
    /// Raw command sender for producer tasks (feed client, oracle, scheduler)
    pub fn sender(&self) -> mpsc::UnboundedSender<Command> {
        self.tx.clone()
    }

    /// Subscribe to view effects
    pub fn subscribe_views(&self) -> broadcast::Receiver<ViewEffect> {
        self.views.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Read tracker state
    pub async fn query<R, F>(&self, f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&Tracker, i64) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.mutate(move |tracker, now| (f(tracker, now), Vec::new()))
            .await
    }

    /// Change tracker state; the returned effects are applied by the engine
    pub async fn mutate<R, F>(&self, f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Tracker, i64) -> (R, Vec<Effect>) + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |tracker, now| {
            let (result, effects) = f(tracker, now);
            let _ = reply_tx.send(result);
            effects
        });
        self.tx
            .send(Command::User(job))
            .map_err(|_| EngineError::Stopped)?;
        reply_rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Run a fallible tracker operation; effects are only applied on success
    pub async fn try_mutate<R, F>(&self, f: F) -> Result<TrackerResult<R>, EngineError>
    where
        F: FnOnce(&mut Tracker, i64) -> TrackerResult<(R, Vec<Effect>)> + Send + 'static,
        R: Send + 'static,
    {
        self.mutate(move |tracker, now| match f(tracker, now) {
            Ok((result, effects)) => (Ok(result), effects),
            Err(e) => (Err(e), Vec::new()),
        })
        .await
    }

    /// Ask the engine to flush and stop, waiting until it has
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(done_tx))
            .map_err(|_| EngineError::Stopped)?;
        done_rx.await.map_err(|_| EngineError::Stopped)
    }
}

pub struct Engine<S: KeyValueStore> {
    tracker: Tracker,
    store: TrackerStore<S>,
    commands: mpsc::UnboundedReceiver<Command>,
    feed: mpsc::UnboundedSender<Subscription>,
    views: broadcast::Sender<ViewEffect>,
}

impl<S: KeyValueStore> Engine<S> {
    pub fn new(
        tracker: Tracker,
        store: TrackerStore<S>,
        feed: mpsc::UnboundedSender<Subscription>,
        views: broadcast::Sender<ViewEffect>,
    ) -> (Self, EngineHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let handle = EngineHandle {
            tx,
            views: views.clone(),
        };
        let engine = Self {
            tracker,
            store,
            commands,
            feed,
            views,
        };
        (engine, handle)
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) -> TrackerStore<S> {
        info!(
            devs = self.tracker.registry().len(),
            tokens = self.tracker.ledger().len(),
            "Engine started"
        );

        while let Some(command) = self.commands.recv().await {
            if let Command::Shutdown(done) = command {
                self.flush();
                let _ = done.send(());
                info!("Engine stopped");
                return self.store;
            }
            self.handle(command);
        }

        self.flush();
        info!("Engine stopped, all handles dropped");
        self.store
    }

    /// Process one command and apply its effects
    pub fn handle(&mut self, command: Command) {
        let now = Utc::now().timestamp_millis();
        let effects = match command {
            Command::Feed(FeedInput::Status(status)) => self.tracker.set_feed_status(status),
            Command::Feed(FeedInput::Message(text)) => self.on_feed_text(&text, now),
            Command::Price(PriceUpdate(usd)) => self.tracker.set_sol_price(usd),
            Command::Scheduled(ScheduledTask::Tick) => self.tracker.tick(now),
            Command::Scheduled(ScheduledTask::Reconcile) => {
                let effects = self.tracker.reconcile_all(now);
                if !effects.is_empty() {
                    debug!(changes = effects.len(), "Periodic reconciliation moved cards");
                }
                effects
            }
            Command::User(job) => job(&mut self.tracker, now),
            Command::Shutdown(done) => {
                self.flush();
                let _ = done.send(());
                Vec::new()
            }
        };
        self.apply(effects);
    }

    fn on_feed_text(&mut self, text: &str, now: i64) -> Vec<Effect> {
        let message = match parse_message(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, preview = %preview(text), "Dropping malformed feed message");
                return Vec::new();
            }
        };

        match interpret(&message, self.tracker.sol_price_usd()) {
            Some(FeedEvent::Unrecognized(kind)) => {
                debug!(kind = %kind, preview = %preview(text), "Unrecognized feed message");
                Vec::new()
            }
            Some(event) => self.tracker.handle_feed_event(event, now),
            None => {
                trace!(preview = %preview(text), "Discarded incomplete feed message");
                Vec::new()
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        let mut dirty = BTreeSet::new();

        for effect in effects {
            match effect {
                Effect::Subscribe(subscription) => {
                    debug!(method = subscription.method(), keys = subscription.keys().len(), "Queueing subscription");
                    if self.feed.send(subscription).is_err() {
                        warn!("Feed client is gone, subscription dropped");
                    }
                }
                Effect::View(view) => {
                    // No dashboards connected is not an error
                    let _ = self.views.send(view);
                }
                Effect::Persist(key) => {
                    dirty.insert(key);
                }
            }
        }

        for key in dirty {
            self.persist(key);
        }
    }

    fn persist(&mut self, key: PersistKey) {
        if let Err(e) = self.store.persist(key, &self.tracker) {
            error!(key = key.as_key(), error = %e, "Failed to persist state");
        }
    }

    /// Write every persisted key
    pub fn flush(&mut self) {
        match self.store.persist_all(&self.tracker) {
            Ok(()) => debug!("State flushed"),
            Err(e) => error!(error = %e, "Failed to flush state"),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedStatus;
    use crate::store::{KeyValueStore, MemoryStore, DEVS_KEY, TOKENS_KEY};
    use crate::tracker::{DevDraft, PersistedState, TrackerError};
    use std::time::Duration;

    struct Harness {
        handle: EngineHandle,
        feed_rx: mpsc::UnboundedReceiver<Subscription>,
        views_rx: broadcast::Receiver<ViewEffect>,
        task: tokio::task::JoinHandle<TrackerStore<MemoryStore>>,
    }

    fn start() -> Harness {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (views_tx, views_rx) = broadcast::channel(256);
        let tracker = Tracker::new(PersistedState::default(), 100.0, Utc::now().timestamp_millis());
        let (engine, handle) = Engine::new(tracker, TrackerStore::new(MemoryStore::new()), feed_tx, views_tx);
        let task = tokio::spawn(engine.run());
        Harness {
            handle,
            feed_rx,
            views_rx,
            task,
        }
    }

    async fn send(harness: &Harness, command: Command) {
        harness.handle.sender().send(command).ok().unwrap();
        // round-trip so the command above has been processed
        harness.handle.query(|_, _| ()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_flushes_subscription_set() {
        let mut h = start();
        h.handle
            .mutate(|t, now| {
                let (_, effects) = t.add_dev(DevDraft::new("alpha", "DevA"), now).unwrap();
                ((), effects)
            })
            .await
            .unwrap();
        // offline: nothing queued for the feed
        assert!(h.feed_rx.try_recv().is_err());

        send(&h, Command::Feed(FeedInput::Status(FeedStatus::Connected))).await;
        let mut methods = Vec::new();
        while let Ok(sub) = h.feed_rx.try_recv() {
            methods.push(sub.method());
        }
        assert_eq!(
            methods,
            vec!["subscribeNewToken", "subscribeMigration", "subscribeAccountTrade"]
        );
    }

    #[tokio::test]
    async fn test_feed_messages_drive_the_ledger() {
        let mut h = start();
        send(&h, Command::Feed(FeedInput::Status(FeedStatus::Connected))).await;
        h.handle
            .mutate(|t, now| {
                let (_, effects) = t.add_dev(DevDraft::new("alpha", "DevA"), now).unwrap();
                ((), effects)
            })
            .await
            .unwrap();
        while h.feed_rx.try_recv().is_ok() {}

        send(&h, Command::Feed(FeedInput::Message("garbage".to_string()))).await;
        send(
            &h,
            Command::Feed(FeedInput::Message(
                r#"{"txType":"create","mint":"M1","traderPublicKey":"DevA","marketCapSol":30}"#.to_string(),
            )),
        )
        .await;

        let tokens = h.handle.query(|t, _| t.tokens()).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].market_cap, 3000.0);
        assert_eq!(
            h.feed_rx.try_recv().unwrap(),
            Subscription::TokenTrade {
                keys: vec!["M1".to_string()]
            }
        );

        let mut saw_alert = false;
        while let Ok(view) = h.views_rx.try_recv() {
            if matches!(view, ViewEffect::Alert { .. }) {
                saw_alert = true;
            }
        }
        assert!(saw_alert);
    }

    #[tokio::test]
    async fn test_user_errors_are_returned() {
        let h = start();
        let result = h.handle.try_mutate(|t, _| t.remove_dev("missing")).await.unwrap();
        assert_eq!(result.unwrap_err(), TrackerError::DevNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_price_updates_are_applied() {
        let h = start();
        send(&h, Command::Price(PriceUpdate(185.0))).await;
        let price = h.handle.query(|t, _| t.sol_price_usd()).await.unwrap();
        assert_eq!(price, 185.0);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_stops() {
        let h = start();
        h.handle
            .mutate(|t, now| {
                let (_, effects) = t.add_dev(DevDraft::new("alpha", "DevA"), now).unwrap();
                ((), effects)
            })
            .await
            .unwrap();

        h.handle.shutdown().await.unwrap();
        let store = tokio::time::timeout(Duration::from_secs(5), h.task)
            .await
            .unwrap()
            .unwrap();

        let saved = store.backend().get(DEVS_KEY).unwrap().unwrap();
        assert!(saved.contains("DevA"));
        assert!(store.backend().get(TOKENS_KEY).unwrap().is_none());

        assert!(!h.handle.is_running());
        assert_eq!(h.handle.query(|_, _| ()).await, Err(EngineError::Stopped));
    }
}
