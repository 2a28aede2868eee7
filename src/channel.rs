//! WebSocket transport for terminal sessions.
//!
//! One [`ChannelHandle`] per session. Inbound traffic is delivered through a
//! single ordered queue; dropping or closing the handle tears the connection
//! down.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, ShellError};
use crate::protocol::{ChannelEvent, ClientMessage, ServerEvent};
use crate::session::ConnectRequest;

pub const DEFAULT_BASE_URL: &str = "ws://127.0.0.1:8080";
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;
const TERMINAL_PATH: &str = "/v1/terminal";
const INBOUND_CAPACITY: usize = 1024;
const OUTBOUND_CAPACITY: usize = 32;
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Options for the WebSocket connector.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Backend base URL; `http(s)` is rewritten to `ws(s)`.
    pub base_url: String,
    /// Maximum reconnect attempts before giving up (default: 5).
    pub max_reconnect_attempts: u32,
    /// Maximum reconnect delay in milliseconds (default: 30000).
    pub max_reconnect_delay_ms: u64,
    /// Heartbeat interval.
    pub ping_interval: Duration,
}

impl ChannelOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_max_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Session-side end of a channel.
pub struct ChannelHandle {
    outbound: Option<mpsc::Sender<ClientMessage>>,
    inbound: mpsc::Receiver<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

/// Backend-side end of an in-memory channel.
pub struct ChannelEndpoint {
    pub outbound: mpsc::Receiver<ClientMessage>,
    pub inbound: mpsc::Sender<ChannelEvent>,
}

impl ChannelEndpoint {
    pub async fn emit(&self, event: impl Into<ChannelEvent>) -> Result<()> {
        self.inbound
            .send(event.into())
            .await
            .map_err(|_| ShellError::NotConnected)
    }
}

impl ChannelHandle {
    fn new(
        outbound: mpsc::Sender<ClientMessage>,
        inbound: mpsc::Receiver<ChannelEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
            task,
        }
    }

    /// An in-memory channel with no transport behind it.
    pub fn pair() -> (ChannelHandle, ChannelEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        (
            ChannelHandle::new(outbound_tx, inbound_rx, None),
            ChannelEndpoint {
                outbound: outbound_rx,
                inbound: inbound_tx,
            },
        )
    }

    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        let Some(outbound) = &self.outbound else {
            return Err(ShellError::NotConnected);
        };
        outbound
            .send(message)
            .await
            .map_err(|_| ShellError::NotConnected)
    }

    /// Next inbound event; `None` once the transport has shut down.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.inbound.recv().await
    }

    /// Close the connection and wait briefly for the transport task to finish.
    pub async fn close(mut self) {
        self.outbound.take();
        self.inbound.close();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                warn!(
                    target = "tenant_shell::channel",
                    "transport task did not stop in time; aborting"
                );
                task.abort();
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens channels for sessions.
pub trait Connector {
    fn open(&self, request: ConnectRequest) -> ChannelHandle;
}

/// Connector backed by a real WebSocket. Must be used inside a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    options: ChannelOptions,
}

impl WsConnector {
    pub fn new(options: ChannelOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }
}

impl Connector for WsConnector {
    fn open(&self, request: ConnectRequest) -> ChannelHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let options = self.options.clone();

        let task = tokio::spawn(async move {
            let url = match build_terminal_url(&options.base_url, request.credential.expose()) {
                Ok(url) => url,
                Err(error) => {
                    warn!(
                        target = "tenant_shell::channel",
                        base_url = %options.base_url,
                        error = %error,
                        "invalid terminal base url"
                    );
                    let _ = inbound_tx
                        .send(ChannelEvent::Failed {
                            reason: error.to_string(),
                        })
                        .await;
                    return;
                }
            };
            run_channel(url, &request.target.id, &options, outbound_rx, inbound_tx).await;
        });

        ChannelHandle::new(outbound_tx, inbound_rx, Some(task))
    }
}

async fn run_channel(
    url: Url,
    target_id: &str,
    options: &ChannelOptions,
    mut outbound_rx: mpsc::Receiver<ClientMessage>,
    inbound_tx: mpsc::Sender<ChannelEvent>,
) {
    let endpoint = redacted_endpoint(&url);
    let mut attempt = 0u32;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                attempt = 0;
                info!(
                    target = "tenant_shell::channel",
                    endpoint = %endpoint,
                    target_id = %target_id,
                    "terminal channel open"
                );
                if inbound_tx.send(ChannelEvent::Open).await.is_err() {
                    return;
                }

                let (mut write, mut read) = stream.split();
                let mut ping = tokio::time::interval_at(
                    Instant::now() + options.ping_interval,
                    options.ping_interval,
                );
                ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

                let reason = loop {
                    tokio::select! {
                        frame = read.next() => {
                            match frame {
                                Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                                    Ok(Some(event)) => {
                                        if inbound_tx.send(event.into()).await.is_err() {
                                            let _ = write.send(Message::Close(None)).await;
                                            return;
                                        }
                                    }
                                    Ok(None) => {
                                        debug!(target = "tenant_shell::channel", "ignoring unhandled frame");
                                    }
                                    Err(error) => {
                                        warn!(
                                            target = "tenant_shell::channel",
                                            error = %error,
                                            raw = %text.chars().take(200).collect::<String>(),
                                            "dropped malformed frame"
                                        );
                                    }
                                },
                                Some(Ok(Message::Close(frame))) => {
                                    break frame
                                        .map(|f| f.reason.to_string())
                                        .filter(|reason| !reason.is_empty());
                                }
                                None => break None,
                                Some(Err(error)) => {
                                    warn!(target = "tenant_shell::channel", error = %error, "ws read error");
                                    break Some(error.to_string());
                                }
                                _ => {}
                            }
                        }
                        message = outbound_rx.recv() => {
                            let Some(message) = message else {
                                let _ = write.send(Message::Close(None)).await;
                                debug!(target = "tenant_shell::channel", "terminal channel closed by session");
                                return;
                            };
                            match message.to_frame() {
                                Ok(text) => {
                                    if let Err(error) = write.send(Message::Text(text)).await {
                                        warn!(target = "tenant_shell::channel", error = %error, "ws write error");
                                        break Some(error.to_string());
                                    }
                                }
                                Err(error) => {
                                    warn!(target = "tenant_shell::channel", error = %error, "failed to encode frame");
                                }
                            }
                        }
                        _ = ping.tick() => {
                            if let Ok(text) = ClientMessage::Ping.to_frame() {
                                if let Err(error) = write.send(Message::Text(text)).await {
                                    warn!(target = "tenant_shell::channel", error = %error, "heartbeat failed");
                                    break Some(error.to_string());
                                }
                            }
                        }
                    }
                };

                if inbound_tx.send(ChannelEvent::Closed { reason }).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                warn!(
                    target = "tenant_shell::channel",
                    endpoint = %endpoint,
                    error = %error,
                    "terminal channel connect failed"
                );
                let failed = ChannelEvent::Failed {
                    reason: error.to_string(),
                };
                if inbound_tx.send(failed).await.is_err() {
                    return;
                }
            }
        }

        if attempt >= options.max_reconnect_attempts {
            info!(
                target = "tenant_shell::channel",
                attempts = attempt,
                "giving up on terminal channel"
            );
            return;
        }
        attempt += 1;
        if inbound_tx
            .send(ChannelEvent::Reconnecting { attempt })
            .await
            .is_err()
        {
            return;
        }

        let delay = reconnect_delay(attempt, options.max_reconnect_delay_ms);
        info!(
            target = "tenant_shell::channel",
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting terminal channel"
        );
        let reconnect_sleep = tokio::time::sleep(delay);
        tokio::pin!(reconnect_sleep);
        loop {
            tokio::select! {
                _ = &mut reconnect_sleep => break,
                message = outbound_rx.recv() => {
                    match message {
                        Some(message) => {
                            warn!(
                                target = "tenant_shell::channel",
                                message = ?message,
                                "dropping frame while disconnected"
                            );
                        }
                        None => return,
                    }
                }
            }
        }
    }
}

/// Build the terminal endpoint URL for `base_url`, carrying `token` as the
/// only `token` query pair. Schemeless bases default to `wss`.
pub fn build_terminal_url(base_url: &str, token: &str) -> Result<Url> {
    let raw = base_url.trim();
    let with_scheme = match raw.split_once("://") {
        Some(("https", rest)) => format!("wss://{rest}"),
        Some(("http", rest)) => format!("ws://{rest}"),
        Some(("ws" | "wss", _)) => raw.to_string(),
        Some((scheme, _)) => {
            return Err(ShellError::InvalidConfig(format!(
                "unsupported scheme {scheme:?} in terminal url {base_url}"
            )))
        }
        None => format!("wss://{raw}"),
    };

    let mut url = Url::parse(&with_scheme)?;
    if url.host_str().is_none() {
        return Err(ShellError::InvalidConfig(format!(
            "terminal url has no host: {base_url}"
        )));
    }
    let path = terminal_path(url.path());
    url.set_path(&path);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("token", token);

    Ok(url)
}

/// Mount `/v1/terminal` under `base`, reusing a trailing `/v1`.
fn terminal_path(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(TERMINAL_PATH) {
        return base.to_string();
    }
    let prefix = base.strip_suffix("/v1").unwrap_or(base);
    format!("{prefix}{TERMINAL_PATH}")
}

/// The endpoint without its query string, for logs.
fn redacted_endpoint(url: &Url) -> String {
    let mut endpoint = url.clone();
    endpoint.set_query(None);
    endpoint.to_string()
}

/// Exponential backoff from one second, capped at `max_delay_ms`, plus jitter.
pub fn reconnect_delay(attempt: u32, max_delay_ms: u64) -> Duration {
    let base_ms = 1_000u64.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let bounded = base_ms.min(max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=250);
    Duration::from_millis(bounded + jitter)
}
