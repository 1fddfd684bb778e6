//! Native WebSocket client — `tokio-tungstenite`.
//!
//! The connection manager. Runs as a background tokio task:
//! - Handshake: upgrade, `auth` frame, wait for the `connect` ack
//! - Application-level ping/pong health check
//! - Bounded exponential backoff reconnection (see [`ConnectionLifecycle`])
//! - Shared topic set, resubscribed in full on each connect
//! - Event delivery to the owner through an mpsc channel

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::auth::{Credential, CredentialStore};
use crate::error::{ConnectError, SubscribeError, WsError};
use crate::ws::connection::{ConnectionLifecycle, DisconnectReason, ReconnectDecision};
use crate::ws::{ConnectionState, DomainEvent, MessageIn, MessageOut, Topic, WsConfig, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Subscribe(Topic),
    Unsubscribe(Topic),
    Send(MessageOut),
    Disconnect,
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    credentials: CredentialStore,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    topics: Arc<Mutex<BTreeSet<Topic>>>,
    lifecycle: ConnectionLifecycle,
    state: Arc<AtomicU8>,
}

impl TaskState {
    fn emit(&self, event: WsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            tracing::warn!("Dropped WS event: {}", e);
        }
    }

    fn publish_state(&self) {
        self.state
            .store(self.lifecycle.state() as u8, Ordering::SeqCst);
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Native WebSocket client using `tokio-tungstenite`.
///
/// Uses a background tokio task for connection management.
/// The public API communicates with it via mpsc channels.
pub struct WsClient {
    config: WsConfig,
    credentials: CredentialStore,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    topics: Arc<Mutex<BTreeSet<Topic>>>,
    event_rx: tokio::sync::Mutex<mpsc::Receiver<WsEvent>>,
    event_tx: mpsc::Sender<WsEvent>,
    task_handle: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl WsClient {
    /// Create a new WS client. Does not connect yet.
    pub fn new(config: WsConfig, credentials: CredentialStore) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            config,
            credentials,
            cmd_tx: None,
            topics: Arc::new(Mutex::new(BTreeSet::new())),
            event_rx: tokio::sync::Mutex::new(event_rx),
            event_tx,
            task_handle: None,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
        }
    }

    /// Connect and wait for the first handshake to complete.
    ///
    /// `topics` replaces the tracked topic set, which is subscribed in full on
    /// every connect and kept current by `subscribe` / `unsubscribe`.
    /// The first attempt fails fast; once connected, the background task
    /// reconnects on its own until the retry budget runs out.
    pub async fn connect(&mut self, topics: BTreeSet<Topic>) -> Result<(), ConnectError> {
        if self.is_running() {
            return Ok(());
        }
        self.reap().await;
        *self.tracked() = topics;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let state = TaskState {
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            topics: Arc::clone(&self.topics),
            lifecycle: ConnectionLifecycle::new(self.config.reconnect_policy()),
            state: Arc::clone(&self.state),
        };

        self.cmd_tx = Some(cmd_tx);
        self.task_handle = Some(tokio::spawn(run_task(state, ready_tx)));

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.reap().await;
                Err(e)
            }
            Err(_) => {
                self.reap().await;
                Err(ConnectError::Transport("connection task ended".into()))
            }
        }
    }

    /// Close the connection deliberately. No reconnect follows.
    pub async fn disconnect(&mut self) -> Result<(), WsError> {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect);
        }

        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Manual re-initialize, e.g. after the retry budget ran out or a fresh login.
    ///
    /// Tears down the current task (if any) and starts over with `attempt = 0`.
    pub async fn restart(&mut self, topics: BTreeSet<Topic>) -> Result<(), ConnectError> {
        if self.state() == ConnectionState::Connecting {
            tracing::info!("Already connecting, skipping restart");
            return Ok(());
        }

        tracing::info!("Manual reconnection requested");
        self.disconnect().await.ok();
        self.connect(topics).await
    }

    /// Send a message on the open connection. Not queued while disconnected.
    pub fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }
        self.command(Command::Send(msg))
    }

    /// Track `topic` and subscribe to it if connected.
    ///
    /// The topic is tracked even when no task is running, so the next
    /// connect covers it.
    pub fn subscribe(&self, topic: Topic) -> Result<(), WsError> {
        if !self.tracked().insert(topic.clone()) {
            return Ok(());
        }
        match self.command(Command::Subscribe(topic)) {
            Err(WsError::NotConnected) => Ok(()),
            other => other,
        }
    }

    pub fn unsubscribe(&self, topic: Topic) -> Result<(), WsError> {
        if !self.tracked().remove(&topic) {
            return Ok(());
        }
        match self.command(Command::Unsubscribe(topic)) {
            Err(WsError::NotConnected) => Ok(()),
            other => other,
        }
    }

    /// Topics subscribed on every connect.
    pub fn topics(&self) -> BTreeSet<Topic> {
        self.tracked().clone()
    }

    /// Publish a domain event on a topic. Needs a service credential server-side.
    pub fn publish(&self, topic: Topic, event: &DomainEvent) -> Result<(), WsError> {
        let msg = MessageOut::publish(topic, event)
            .map_err(|e| WsError::ProtocolError(e.to_string()))?;
        self.send(msg)
    }

    /// Whether the handshake has completed and the transport is up.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Next event from the connection task.
    pub async fn recv(&self) -> Option<WsEvent> {
        self.event_rx.lock().await.recv().await
    }

    fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn command(&self, cmd: Command) -> Result<(), WsError> {
        match &self.cmd_tx {
            Some(tx) => tx.send(cmd).map_err(|_| WsError::NotConnected),
            None => Err(WsError::NotConnected),
        }
    }

    fn tracked(&self) -> MutexGuard<'_, BTreeSet<Topic>> {
        lock_topics(&self.topics)
    }

    /// Drop the handles of a task that has already exited.
    async fn reap(&mut self) {
        self.cmd_tx = None;
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState, ready: oneshot::Sender<Result<(), ConnectError>>) {
    let mut ready = Some(ready);

    loop {
        // ── 1. Handshake ─────────────────────────────────────────────────
        state.lifecycle.begin_connect();
        state.publish_state();

        let decision = match handshake(&state.config, &state.credentials).await {
            Ok((mut sink, stream)) => {
                // ── 2. Connected ─────────────────────────────────────────
                state.lifecycle.on_connected();
                state.publish_state();
                tracing::info!(url = %state.config.url, "WebSocket connected");
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }

                // ── 3. Resubscribe, then tell the owner ──────────────────
                let live = lock_topics(&state.topics).clone();
                resubscribe_all(&mut sink, &live).await;
                state.emit(WsEvent::Connected);

                // ── 4. Inner select! loop ────────────────────────────────
                let reason = run_connected(&mut state, sink, stream, live).await;
                tracing::info!(reason = %reason, "WebSocket disconnected");
                state.emit(WsEvent::Disconnected { reason });
                state.lifecycle.on_transport_lost(reason)
            }
            Err(e) => {
                tracing::error!(error = %e, attempt = state.lifecycle.attempt(), "WebSocket connection failed");
                let decision = state.lifecycle.on_connect_failed();
                if let Some(tx) = ready.take() {
                    state.publish_state();
                    let _ = tx.send(Err(e));
                    return;
                }
                state.emit(WsEvent::Error(format!("Connection failed: {}", e)));
                decision
            }
        };

        // ── 5. Post-disconnect decision ──────────────────────────────────
        state.publish_state();
        match decision {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::info!(
                    attempt,
                    max = state.lifecycle.policy().max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting"
                );
                if !backoff_wait(&mut state, delay).await {
                    state.lifecycle.reset();
                    state.publish_state();
                    return;
                }
            }
            ReconnectDecision::Stop => return,
            ReconnectDecision::GiveUp => {
                tracing::error!("Reconnect attempts exhausted");
                state.emit(WsEvent::MaxReconnectReached);
                return;
            }
        }
    }
}

/// Upgrade, authenticate and wait for the `connect` ack within the handshake window.
async fn handshake(
    config: &WsConfig,
    credentials: &CredentialStore,
) -> Result<(WsSink, WsSource), ConnectError> {
    let credential = credentials
        .current()
        .await
        .ok_or(ConnectError::MissingCredential)?;

    tokio::time::timeout(
        Duration::from_millis(config.handshake_timeout_ms),
        open_and_authenticate(&config.url, credential),
    )
    .await
    .map_err(|_| ConnectError::Timeout(config.handshake_timeout_ms))?
}

async fn open_and_authenticate(
    url: &str,
    credential: Credential,
) -> Result<(WsSink, WsSource), ConnectError> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| ConnectError::Transport(e.to_string()))?;
    let (mut sink, mut stream) = ws_stream.split();

    send_msg(&mut sink, &MessageOut::Auth(credential.into()))
        .await
        .map_err(ConnectError::Transport)?;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let text_str: &str = text.as_ref();
                match serde_json::from_str::<MessageIn>(text_str) {
                    Ok(MessageIn::Connect) => return Ok((sink, stream)),
                    Ok(MessageIn::ConnectError { message }) => {
                        return Err(ConnectError::AuthRejected(message))
                    }
                    Ok(other) => tracing::debug!(?other, "Frame before connect ack ignored"),
                    Err(e) => tracing::warn!("WS deserialization error: {} — raw: {}", e, text_str),
                }
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = sink.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = extract_close(frame.as_ref());
                return Err(ConnectError::Transport(format!(
                    "closed during handshake ({code}): {reason}"
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ConnectError::Transport(e.to_string())),
            None => {
                return Err(ConnectError::Transport(
                    "stream ended during handshake".into(),
                ))
            }
        }
    }
}

/// The inner connected loop — runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: WsSource,
    mut live: BTreeSet<Topic>,
) -> DisconnectReason {
    let ping_dur = Duration::from_millis(state.config.ping_interval_ms);
    let pong_dur = Duration::from_millis(state.config.pong_timeout_ms);

    let mut ping_interval = tokio::time::interval(ping_dur);
    ping_interval.reset(); // skip immediate first tick

    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        match serde_json::from_str::<MessageIn>(text_str) {
                            Ok(MessageIn::Pong) => {
                                pong_deadline = None;
                                pong_sleep.as_mut().reset(far_future);
                            }
                            Ok(MessageIn::Disconnect { reason }) => {
                                tracing::info!(reason = %reason, "Server requested disconnect");
                                let _ = sink.close().await;
                                return match DisconnectReason::from_wire(&reason) {
                                    DisconnectReason::ClientDisconnect => DisconnectReason::ServerDisconnect,
                                    other => other,
                                };
                            }
                            Ok(msg_in) => {
                                if let MessageIn::Error { message, topic } = &msg_in {
                                    let err = SubscribeError {
                                        topic: topic.as_ref().map(|t| t.to_string()),
                                        message: message.clone(),
                                    };
                                    tracing::warn!("{}", err);
                                }
                                state.emit(WsEvent::Message(msg_in));
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "WS deserialization error: {} — raw: {}",
                                    e,
                                    text_str
                                );
                                state.emit(WsEvent::Error(format!(
                                    "Deserialization error: {}",
                                    e
                                )));
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::debug!(code, reason = %reason, "Close frame received");
                        return match code {
                            1000 => DisconnectReason::ServerDisconnect,
                            _ => DisconnectReason::TransportClose,
                        };
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame — ignore
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        return DisconnectReason::TransportError;
                    }
                    None => return DisconnectReason::TransportClose,
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    // WsClient dropped — clean exit
                    return DisconnectReason::ClientDisconnect;
                };
                let out = match cmd {
                    Command::Subscribe(topic) => {
                        live.insert(topic.clone()).then(|| MessageOut::subscribe(topic))
                    }
                    Command::Unsubscribe(topic) => {
                        live.remove(&topic).then(|| MessageOut::unsubscribe(topic))
                    }
                    Command::Send(msg) => Some(msg),
                    Command::Disconnect => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: DisconnectReason::ClientDisconnect.as_str().into(),
                        }))).await;
                        return DisconnectReason::ClientDisconnect;
                    }
                };
                if let Some(out) = out {
                    tracing::debug!("-> {}", out);
                    if let Err(e) = send_msg(&mut sink, &out).await {
                        tracing::warn!("Send failed: {}", e);
                    }
                }
            }

            // ── c) Ping interval ─────────────────────────────────────────
            _ = ping_interval.tick() => {
                if let Err(e) = send_msg(&mut sink, &MessageOut::Ping).await {
                    tracing::warn!("Failed to send ping: {}", e);
                } else if pong_deadline.is_none() {
                    let deadline = tokio::time::Instant::now() + pong_dur;
                    pong_deadline = Some(deadline);
                    pong_sleep.as_mut().reset(deadline);
                }
            }

            // ── d) Pong timeout ──────────────────────────────────────────
            () = &mut pong_sleep, if pong_deadline.is_some() => {
                tracing::warn!(
                    "Pong timeout — no response within {}ms",
                    state.config.pong_timeout_ms
                );
                let _ = sink.close().await;
                return DisconnectReason::PingTimeout;
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut WsSink, msg: &MessageOut) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

async fn resubscribe_all(sink: &mut WsSink, topics: &BTreeSet<Topic>) {
    if topics.is_empty() {
        return;
    }
    tracing::info!(count = topics.len(), "Resubscribing to tracked topics");
    for topic in topics {
        if let Err(e) = send_msg(sink, &MessageOut::subscribe(topic.clone())).await {
            tracing::warn!(topic = %topic, "Failed to resubscribe: {}", e);
        }
    }
}

fn lock_topics(topics: &Mutex<BTreeSet<Topic>>) -> MutexGuard<'_, BTreeSet<Topic>> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Sleep out the backoff delay. Topic changes meanwhile are already in the
/// shared set and go out with the next resubscribe.
///
/// Returns `false` if a disconnect was requested or the client was dropped.
async fn backoff_wait(state: &mut TaskState, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = state.cmd_rx.recv() => match cmd {
                Some(Command::Disconnect) | None => return false,
                Some(Command::Send(msg)) => {
                    tracing::warn!("Not connected, dropping {}", msg);
                }
                Some(Command::Subscribe(_) | Command::Unsubscribe(_)) => {}
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
