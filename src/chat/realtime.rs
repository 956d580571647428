//! Realtime channel: one Socket.IO connection per mounted view.
//!
//! The channel joins the room named after the local identity and feeds
//! `new_request` / `new_response` pushes into the [`Store`]. A dropped
//! connection is retried with exponential backoff and re-joins on success.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::api::events::{self, EnginePacket, IncomingEvent, SocketPacket};
use crate::chat::identity::LocalIdentity;
use crate::chat::store::{Action, Store};
use crate::error::ChannelError;

/// Engine.IO default ping interval plus ping timeout, used until the
/// handshake announces the server's own values.
const DEFAULT_SILENCE_WINDOW: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Retrying { attempt: u32, delay: Duration },
    Closed,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, including the `/socket.io/` path and query.
    pub url: String,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
    /// 0 retries forever.
    pub max_attempts: u32,
}

impl RealtimeConfig {
    /// Derive the Socket.IO endpoint from the HTTP base URL.
    pub fn from_base_url(base_url: &str) -> Result<Self, ChannelError> {
        let mut url = Url::parse(&crate::utils::normalize_url(base_url))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ChannelError::Protocol(format!("cannot use {scheme} for {base_url}")))?;
        url.set_path("/socket.io/");
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(Self { url: url.to_string(), ..Self::default() })
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_base.saturating_mul(factor).min(self.reconnect_max)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000/socket.io/?EIO=4&transport=websocket".to_string(),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

/// Decide what a push means for the local user. Pushes addressed to anyone
/// else are dropped.
pub fn route_event(identity: &LocalIdentity, event: IncomingEvent) -> Option<Action> {
    match event {
        IncomingEvent::NewRequest(thread) if identity.matches(&thread.recipient_id) => Some(Action::AddRequest {
            user_id: thread.sender_id.clone(),
            request: thread,
        }),
        IncomingEvent::NewResponse(thread) if identity.matches(&thread.sender_id) => Some(Action::AddRequest {
            user_id: thread.recipient_id.clone(),
            request: thread,
        }),
        IncomingEvent::NewRequest(thread) | IncomingEvent::NewResponse(thread) => {
            log::debug!("ignoring push for thread {} not addressed to {identity}", thread.id);
            None
        }
        IncomingEvent::Other { event_type, .. } => {
            log::trace!("unhandled realtime event {event_type}");
            None
        }
    }
}

pub struct RealtimeChannel {
    config: RealtimeConfig,
    identity: LocalIdentity,
    store: Store,
    state_tx: watch::Sender<ConnectionState>,
}

/// Owner of a running channel. Dropping it disconnects.
pub struct ChannelHandle {
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChannelHandle {
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl RealtimeChannel {
    /// Spawn the channel on the current tokio runtime.
    pub fn open(config: RealtimeConfig, identity: LocalIdentity, store: Store) -> ChannelHandle {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let channel = Self { config, identity, store, state_tx };
        tokio::spawn(async move { channel.run(shutdown_rx).await });
        ChannelHandle { state_rx, shutdown_tx }
    }

    fn set_state(&self, state: ConnectionState) {
        log::debug!("realtime {}: {state:?}", self.identity);
        self.state_tx.send_replace(state);
    }

    async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut attempt = 0u32;

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            self.set_state(ConnectionState::Connecting);
            log::info!("connecting realtime channel for {} at {}", self.identity, self.config.url);

            match self.connect_and_listen(&mut shutdown_rx).await {
                Ok(()) => break,
                Err(e) => {
                    log::warn!("realtime channel error: {e}");
                    // A session that made it to Open starts a fresh backoff series.
                    if *self.state_tx.borrow() == ConnectionState::Open {
                        attempt = 0;
                    }
                    attempt += 1;
                    if self.config.max_attempts > 0 && attempt > self.config.max_attempts {
                        log::error!("giving up on realtime channel after {} attempts", self.config.max_attempts);
                        break;
                    }
                }
            }

            let delay = self.config.backoff(attempt);
            self.set_state(ConnectionState::Retrying { attempt, delay });
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    /// Returns `Ok` only on a local shutdown; every other exit is an error worth retrying.
    async fn connect_and_listen(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> Result<(), ChannelError> {
        let connect = connect_async(self.config.url.as_str());
        let (ws_stream, _) = tokio::select! {
            res = connect => res?,
            _ = shutdown_rx.recv() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();
        let room = self.identity.to_string();
        let mut window = DEFAULT_SILENCE_WINDOW;
        let mut deadline = Instant::now() + window;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = write.close().await;
                    return Ok(());
                }
                _ = sleep_until(deadline) => return Err(ChannelError::Silent(window)),
                msg = read.next() => {
                    deadline = Instant::now() + window;
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                    };
                    match events::decode(&text) {
                        Ok(EnginePacket::Open(handshake)) => {
                            log::debug!("engine.io session {}", handshake.sid);
                            if let Some(w) = handshake.silence_window() {
                                window = w;
                                deadline = Instant::now() + window;
                            }
                            write.send(Message::Text(events::connect_frame())).await?;
                        }
                        Ok(EnginePacket::Ping) => write.send(Message::Text(events::pong_frame())).await?,
                        Ok(EnginePacket::Close) => return Err(ChannelError::Closed),
                        Ok(EnginePacket::Message(SocketPacket::Connect)) => {
                            write.send(Message::Text(events::join_frame(&room))).await?;
                            self.set_state(ConnectionState::Open);
                        }
                        Ok(EnginePacket::Message(SocketPacket::Disconnect)) => return Err(ChannelError::Closed),
                        Ok(EnginePacket::Message(SocketPacket::ConnectError(data))) => {
                            return Err(ChannelError::Protocol(format!("connect refused: {data}")));
                        }
                        Ok(EnginePacket::Message(SocketPacket::Event { name, data })) => {
                            match IncomingEvent::from_event(&name, data) {
                                Ok(event) => {
                                    if let Some(action) = route_event(&self.identity, event) {
                                        self.store.dispatch(action);
                                    }
                                }
                                Err(e) => log::warn!("{e}"),
                            }
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("undecodable realtime frame: {e}"),
                    }
                }
            }
        }
    }
}
