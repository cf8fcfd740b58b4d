//! SOL/USD price oracle
//!
//! Periodically fetches the native asset price and forwards changes to the
//! engine. The source sits behind the `PriceSource` trait so the HTTP
//! provider can be swapped or faked.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::OracleConfig;

/// A fetched SOL price in USD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceUpdate(pub f64);

/// Something that can quote SOL in USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    async fn fetch_usd(&self) -> Result<f64, OracleError>;
}

/// CoinGecko simple-price endpoint
pub struct CoinGeckoSource {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    solana: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

impl CoinGeckoSource {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(OracleError::Request)?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

/// Extract `solana.usd` from a simple-price body
pub fn parse_simple_price(body: &str) -> Result<f64, OracleError> {
    let response: SimplePriceResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

    response
        .solana
        .and_then(|quote| quote.usd)
        .ok_or(OracleError::MissingPrice)
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_usd(&self) -> Result<f64, OracleError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Request(e)
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(OracleError::Request)?;
        parse_simple_price(&body)
    }
}

/// Polls a `PriceSource` and keeps the last good value
pub struct PriceOracle<S: PriceSource> {
    source: S,
    refresh: Duration,
    last_known: Option<f64>,
}

impl<S: PriceSource> PriceOracle<S> {
    pub fn new(source: S, refresh: Duration) -> Self {
        Self {
            source,
            refresh,
            last_known: None,
        }
    }

    pub fn last_known(&self) -> Option<f64> {
        self.last_known
    }

    /// Fetch once. Returns the new price when it should be published.
    pub async fn refresh_once(&mut self) -> Option<f64> {
        match self.source.fetch_usd().await {
            Ok(price) if price.is_finite() && price > 0.0 => {
                if self.last_known == Some(price) {
                    debug!(source = self.source.name(), price, "SOL price unchanged");
                    return None;
                }
                info!(source = self.source.name(), price, "SOL price updated");
                self.last_known = Some(price);
                Some(price)
            }
            Ok(price) => {
                warn!(source = self.source.name(), price, "Ignoring implausible SOL price");
                None
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    last_known = ?self.last_known,
                    "Failed to fetch SOL price, keeping last value"
                );
                None
            }
        }
    }

    /// Poll until shutdown. The first fetch happens immediately.
    pub async fn run<T>(mut self, updates: mpsc::UnboundedSender<T>, mut shutdown: watch::Receiver<bool>)
    where
        T: From<PriceUpdate> + Send + 'static,
    {
        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(price) = self.refresh_once().await {
                        if updates.send(T::from(PriceUpdate(price))).is_err() {
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Price oracle stopped");
    }
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response did not contain a SOL price")]
    MissingPrice,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned results in order, then fails
    struct ScriptedSource {
        results: Mutex<Vec<Result<f64, OracleError>>>,
    }

    impl ScriptedSource {
        fn new(mut results: Vec<Result<f64, OracleError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
            }
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_usd(&self) -> Result<f64, OracleError> {
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(OracleError::Timeout))
        }
    }

    #[test]
    fn test_parse_simple_price() {
        assert_eq!(parse_simple_price(r#"{"solana":{"usd":185.42}}"#).unwrap(), 185.42);
        assert!(matches!(
            parse_simple_price(r#"{"solana":{}}"#),
            Err(OracleError::MissingPrice)
        ));
        assert!(matches!(
            parse_simple_price(r#"{"bitcoin":{"usd":1}}"#),
            Err(OracleError::MissingPrice)
        ));
        assert!(matches!(
            parse_simple_price("<html>"),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_failures_keep_last_value() {
        let source = ScriptedSource::new(vec![
            Ok(185.0),
            Err(OracleError::RateLimited),
            Ok(f64::NAN),
            Ok(-3.0),
            Ok(185.0),
            Ok(190.0),
        ]);
        let mut oracle = PriceOracle::new(source, Duration::from_secs(60));

        assert_eq!(oracle.refresh_once().await, Some(185.0));
        assert_eq!(oracle.refresh_once().await, None);
        assert_eq!(oracle.refresh_once().await, None);
        assert_eq!(oracle.refresh_once().await, None);
        assert_eq!(oracle.last_known(), Some(185.0));
        // unchanged price is not republished
        assert_eq!(oracle.refresh_once().await, None);
        assert_eq!(oracle.refresh_once().await, Some(190.0));
    }

    #[tokio::test]
    async fn test_run_publishes_first_price_immediately() {
        let oracle = PriceOracle::new(ScriptedSource::new(vec![Ok(150.0)]), Duration::from_secs(3600));
        let (tx, mut rx) = mpsc::unbounded_channel::<PriceUpdate>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(oracle.run(tx, shutdown_rx));

        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update, PriceUpdate(150.0));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
