//! Feed WebSocket client
//!
//! Holds one connection to the feed at a time. Inbound text frames and
//! connection state changes are forwarded to the owner as `FeedInput`;
//! subscription requests arrive on an outbound queue and are only written
//! while a session is open. When a session ends for any reason exactly one
//! reconnect is attempted after a fixed delay.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::Subscription;
use super::{FeedError, FeedStatus};
use crate::config::FeedConfig;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the client reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum FeedInput {
    Status(FeedStatus),
    /// A raw text frame
    Message(String),
}

#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl From<&FeedConfig> for FeedClientConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// How a session ended
enum SessionEnd {
    Shutdown,
    Lost(FeedError),
}

pub struct FeedClient {
    config: FeedClientConfig,
}

impl FeedClient {
    pub fn new(config: FeedClientConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` flips to true or the owner goes away.
    pub async fn run<T>(
        self,
        mut outbound: mpsc::UnboundedReceiver<Subscription>,
        inbound: mpsc::UnboundedSender<T>,
        mut shutdown: watch::Receiver<bool>,
    ) where
        T: From<FeedInput> + Send + 'static,
    {
        let report = |input: FeedInput| inbound.send(T::from(input)).is_ok();

        loop {
            if *shutdown.borrow() {
                break;
            }

            info!(url = %self.config.url, "Connecting to feed");
            if !report(FeedInput::Status(FeedStatus::Connecting)) {
                break;
            }

            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(stream) => {
                    // Requests queued for a previous session are stale; the
                    // owner re-issues the full set on Connected.
                    let mut dropped = 0usize;
                    while outbound.try_recv().is_ok() {
                        dropped += 1;
                    }
                    if dropped > 0 {
                        debug!(dropped, "Discarded stale subscription requests");
                    }

                    info!("Feed connected");
                    if !report(FeedInput::Status(FeedStatus::Connected)) {
                        break;
                    }

                    match self.session(stream, &mut outbound, &inbound, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Lost(e) => {
                            warn!(error = %e, "Feed disconnected");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Feed connection failed");
                }
            }

            if !report(FeedInput::Status(FeedStatus::Disconnected)) {
                break;
            }

            info!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "Reconnecting to feed after delay"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        let _ = inbound.send(T::from(FeedInput::Status(FeedStatus::Disconnected)));
        info!("Feed client stopped");
    }

    /// Open one connection to the configured endpoint
    async fn connect(&self) -> Result<FeedStream, FeedError> {
        let (stream, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(FeedError::Connect)?;
        Ok(stream)
    }

    async fn session<T>(
        &self,
        stream: FeedStream,
        outbound: &mut mpsc::UnboundedReceiver<Subscription>,
        inbound: &mpsc::UnboundedSender<T>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd
    where
        T: From<FeedInput> + Send + 'static,
    {
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                Some(subscription) = outbound.recv() => {
                    let json = match subscription.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Dropping unencodable subscription");
                            continue;
                        }
                    };
                    debug!(method = subscription.method(), keys = subscription.keys().len(), "Sending subscription");
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        return SessionEnd::Lost(FeedError::Send(e));
                    }
                }

                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if inbound.send(T::from(FeedInput::Message(text))).is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if inbound.send(T::from(FeedInput::Message(text))).is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(_) => debug!("Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", f.code, f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        return SessionEnd::Lost(FeedError::Closed(reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(FeedError::Receive(e)),
                    None => return SessionEnd::Lost(FeedError::Closed("stream ended".to_string())),
                },

                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_input(rx: &mut mpsc::UnboundedReceiver<FeedInput>) -> FeedInput {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for feed input")
            .expect("feed client hung up")
    }

    async fn wait_for(rx: &mut mpsc::UnboundedReceiver<FeedInput>, wanted: FeedInput) {
        loop {
            if next_input(rx).await == wanted {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_forwards_messages_and_subscriptions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text(r#"{"txType":"create"}"#.to_string()))
                .await
                .unwrap();

            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {:?}", other),
                }
            }
        });

        let client = FeedClient::new(FeedClientConfig {
            url: format!("ws://{}", addr),
            reconnect_delay: Duration::from_millis(50),
        });
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<FeedInput>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.run(out_rx, in_tx, shutdown_rx));

        wait_for(&mut in_rx, FeedInput::Status(FeedStatus::Connected)).await;
        assert_eq!(
            next_input(&mut in_rx).await,
            FeedInput::Message(r#"{"txType":"create"}"#.to_string())
        );

        out_tx.send(Subscription::NewToken).unwrap();
        let received = server.await.unwrap();
        assert_eq!(received, r#"{"method":"subscribeNewToken"}"#);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First session is closed right away, the second is held open.
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let _ = ws.close(None).await;
            drop(ws);

            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = FeedClient::new(FeedClientConfig {
            url: format!("ws://{}", addr),
            reconnect_delay: Duration::from_millis(20),
        });
        let (_out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<FeedInput>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.run(out_rx, in_tx, shutdown_rx));

        wait_for(&mut in_rx, FeedInput::Status(FeedStatus::Connected)).await;
        wait_for(&mut in_rx, FeedInput::Status(FeedStatus::Disconnected)).await;
        wait_for(&mut in_rx, FeedInput::Status(FeedStatus::Connected)).await;

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_feed_reports_disconnected() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let client = FeedClient::new(FeedClientConfig {
            url: format!("ws://{}", addr),
            reconnect_delay: Duration::from_millis(20),
        });
        let (_out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<FeedInput>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.run(out_rx, in_tx, shutdown_rx));

        assert_eq!(
            next_input(&mut in_rx).await,
            FeedInput::Status(FeedStatus::Connecting)
        );
        assert_eq!(
            next_input(&mut in_rx).await,
            FeedInput::Status(FeedStatus::Disconnected)
        );

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_and_close_errors() {
        let unreachable = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client = FeedClient::new(FeedClientConfig {
            url: format!("ws://{}", unreachable),
            reconnect_delay: Duration::from_millis(20),
        });
        assert!(matches!(client.connect().await, Err(FeedError::Connect(_))));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let _ = ws.close(None).await;
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = FeedClient::new(FeedClientConfig {
            url: format!("ws://{}", addr),
            reconnect_delay: Duration::from_millis(20),
        });
        let stream = client.connect().await.unwrap();
        let (_out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, _in_rx) = mpsc::unbounded_channel::<FeedInput>();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let end = tokio::time::timeout(
            Duration::from_secs(5),
            client.session(stream, &mut out_rx, &in_tx, &mut shutdown_rx),
        )
        .await
        .unwrap();
        assert!(matches!(end, SessionEnd::Lost(FeedError::Closed(_))));
    }
}
