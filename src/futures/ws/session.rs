//! One WebSocket session: dial, welcome, optional login, heartbeat, read loop.
//!
//! ```text
//! Disconnected -> Dialing -> Handshaking -> [Authenticating] -> Live -> Closing -> Disconnected
//!                    \            \                 \              \
//!                     +------------+-----------------+--------------+--> Failed
//! ```
//!
//! A session never reconnects by itself; see
//! [`ReconnectingSession`](crate::futures::ws::ReconnectingSession).

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::{BitunixError, WsOperation};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsReceiver = SplitStream<WsStream>;

/// Shortest heartbeat interval; shorter requests are raised to it.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Produces the login frame; called once per connect.
pub type Authenticator = Arc<dyn Fn() -> Result<String, BitunixError> + Send + Sync>;

/// Produces one heartbeat frame; called on every tick.
pub type HeartbeatPayload = Arc<dyn Fn() -> String + Send + Sync>;

/// Lifecycle state of a [`WsSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No socket.
    Disconnected,
    /// TCP/TLS/upgrade in progress.
    Dialing,
    /// Waiting for the welcome frame.
    Handshaking,
    /// Login sent, waiting for the reply.
    Authenticating,
    /// Ready for writes; heartbeat running.
    Live,
    /// Graceful shutdown in progress.
    Closing,
    /// A step failed; the socket has been closed.
    Failed,
}

#[derive(Clone)]
struct Heartbeat {
    interval: Duration,
    payload: HeartbeatPayload,
}

/// How to open a session.
#[derive(Clone)]
pub struct SessionConfig {
    url: String,
    authenticator: Option<Authenticator>,
    heartbeat: Option<Heartbeat>,
}

impl SessionConfig {
    /// Connect to `url` without login or heartbeat.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authenticator: None,
            heartbeat: None,
        }
    }

    /// Send the frame produced by `authenticator` after the welcome frame
    /// and require a successful reply before going live.
    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Send `payload()` every `interval` while live.
    ///
    /// `interval` is raised to [`MIN_HEARTBEAT_INTERVAL`] if shorter.
    pub fn with_heartbeat(mut self, interval: Duration, payload: HeartbeatPayload) -> Self {
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        self.heartbeat = Some(Heartbeat { interval, payload });
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("url", &self.url)
            .field("login", &self.authenticator.is_some())
            .field("heartbeat", &self.heartbeat.as_ref().map(|h| h.interval))
            .finish()
    }
}

/// A single WebSocket connection.
///
/// Writes from the caller and the heartbeat share one lock around the
/// socket sink, so frames are never interleaved.
pub struct WsSession {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    sink: Arc<Mutex<Option<WsSink>>>,
    receiver: Mutex<Option<WsReceiver>>,
    shutdown: watch::Sender<bool>,
    heartbeat_failure: Mutex<Option<mpsc::Receiver<BitunixError>>>,
    heartbeat_task: StdMutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for WsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSession")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

impl WsSession {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: watch::channel(SessionState::Disconnected).0,
            sink: Arc::new(Mutex::new(None)),
            receiver: Mutex::new(None),
            shutdown: watch::channel(false).0,
            heartbeat_failure: Mutex::new(None),
            heartbeat_task: StdMutex::new(None),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Whether writes are currently accepted.
    pub fn is_live(&self) -> bool {
        self.state() == SessionState::Live
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(url = %self.config.url, from = ?previous, to = ?state, "session state");
        }
    }

    /// Dial, read the welcome frame, log in if configured, start the heartbeat.
    ///
    /// On error the session is [`SessionState::Failed`] and the socket is closed.
    pub async fn connect(&self) -> Result<(), BitunixError> {
        match self.state() {
            SessionState::Disconnected | SessionState::Failed => {}
            other => {
                return Err(BitunixError::websocket(
                    WsOperation::Dial,
                    format!("cannot connect while {other:?}"),
                ));
            }
        }
        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        self.set_state(SessionState::Dialing);

        let dial = async {
            connect_async(self.config.url.as_str()).await.map_err(|e| {
                BitunixError::websocket(
                    WsOperation::Dial,
                    format!("failed to connect to {}: {e}", self.config.url),
                )
            })
        };
        let (ws, _) = match until_shutdown(&mut shutdown, WsOperation::Dial, dial).await {
            Ok(pair) => pair,
            Err(e) => {
                self.settle_failure();
                return Err(e);
            }
        };
        let (mut sink, mut receiver) = ws.split();

        self.set_state(SessionState::Handshaking);
        let welcome = read_text(&mut receiver, WsOperation::Welcome);
        let welcome = match until_shutdown(&mut shutdown, WsOperation::Welcome, welcome).await {
            Ok(text) => text,
            Err(e) => return Err(self.abort(sink, e).await),
        };
        debug!(url = %self.config.url, %welcome, "welcome frame");

        if let Some(authenticator) = &self.config.authenticator {
            self.set_state(SessionState::Authenticating);
            let login = login(authenticator, &mut sink, &mut receiver);
            if let Err(e) = until_shutdown(&mut shutdown, WsOperation::Login, login).await {
                return Err(self.abort(sink, e).await);
            }
        }

        // close() takes the sink lock after raising shutdown, so checking
        // under the lock means either it sees this sink or we see the flag.
        let mut guard = self.sink.lock().await;
        if self.is_shutting_down() {
            drop(guard);
            let err = BitunixError::websocket(WsOperation::Dial, "closed while connecting");
            return Err(self.abort(sink, err).await);
        }
        *guard = Some(sink);
        *self.receiver.lock().await = Some(receiver);
        self.set_state(SessionState::Live);
        self.start_heartbeat().await;
        drop(guard);
        info!(url = %self.config.url, "websocket session live");
        Ok(())
    }

    async fn abort(&self, mut sink: WsSink, err: BitunixError) -> BitunixError {
        warn!(url = %self.config.url, error = %err, "websocket handshake failed");
        let _ = sink.send(close_frame(CloseCode::Error)).await;
        let _ = sink.close().await;
        self.settle_failure();
        err
    }

    /// A connect that was cut short by close() ends Disconnected, not Failed.
    fn settle_failure(&self) {
        if self.is_shutting_down() {
            self.set_state(SessionState::Disconnected);
        } else {
            self.set_state(SessionState::Failed);
        }
    }

    async fn start_heartbeat(&self) {
        let Some(heartbeat) = self.config.heartbeat.clone() else {
            return;
        };
        let (failure_tx, failure_rx) = mpsc::channel(1);
        *self.heartbeat_failure.lock().await = Some(failure_rx);

        let sink = Arc::clone(&self.sink);
        let mut shutdown = self.shutdown.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat.interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        let frame = (heartbeat.payload)();
                        let mut guard = sink.lock().await;
                        let Some(sink) = guard.as_mut() else { return };
                        if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                            let _ = failure_tx.try_send(BitunixError::websocket(
                                WsOperation::Heartbeat,
                                e.to_string(),
                            ));
                            return;
                        }
                    }
                }
            }
        });
        *self
            .heartbeat_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    fn stop_heartbeat(&self) {
        if let Some(task) = self
            .heartbeat_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    /// Send one text frame. Fails unless the session is live.
    pub async fn write(&self, text: String) -> Result<(), BitunixError> {
        if !self.is_live() {
            return Err(BitunixError::websocket(WsOperation::Write, "not connected"));
        }
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| BitunixError::websocket(WsOperation::Write, "not connected"))?;
        sink.send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| BitunixError::websocket(WsOperation::Write, e.to_string()))
    }

    /// Read frames until the session ends, passing each text frame to `handler`.
    ///
    /// Returns `Ok(())` after [`WsSession::close`] and an error when the
    /// connection is lost, the heartbeat fails, or `handler` fails. The
    /// session is [`SessionState::Failed`] after an error.
    pub async fn listen<F>(&self, mut handler: F) -> Result<(), BitunixError>
    where
        F: FnMut(&str) -> Result<(), BitunixError>,
    {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| BitunixError::websocket(WsOperation::Read, "not connected"))?;
        let mut heartbeat_failure = self.heartbeat_failure.lock().await.take();
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                failure = next_failure(&mut heartbeat_failure) => match failure {
                    Some(err) => return Err(self.fail(err).await),
                    None => heartbeat_failure = None,
                },
                frame = receiver.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text.as_str().to_owned(),
                        Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                debug!("ignoring non-UTF-8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(WsMessage::Close(frame))) => {
                            if self.is_shutting_down() {
                                return Ok(());
                            }
                            let reason = frame
                                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                                .unwrap_or_default();
                            return Err(self
                                .fail(BitunixError::websocket(
                                    WsOperation::Read,
                                    format!("closed by server {reason}").trim_end().to_string(),
                                ))
                                .await);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            if self.is_shutting_down() {
                                return Ok(());
                            }
                            return Err(self
                                .fail(BitunixError::websocket(WsOperation::Read, e.to_string()))
                                .await);
                        }
                        None => {
                            if self.is_shutting_down() {
                                return Ok(());
                            }
                            return Err(self
                                .fail(BitunixError::websocket(WsOperation::Read, "connection closed"))
                                .await);
                        }
                    };
                    if let Err(e) = handler(&text) {
                        return Err(self.fail(e).await);
                    }
                }
            }
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn fail(&self, err: BitunixError) -> BitunixError {
        warn!(url = %self.config.url, error = %err, "websocket session failed");
        self.stop_heartbeat();
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(close_frame(CloseCode::Error)).await;
            let _ = sink.close().await;
        }
        self.set_state(SessionState::Failed);
        err
    }

    /// Stop the heartbeat, end [`WsSession::listen`] and send a normal close.
    ///
    /// Calling it again, or on a session that never connected, does nothing.
    pub async fn close(&self) {
        match self.state() {
            SessionState::Disconnected | SessionState::Closing => return,
            SessionState::Failed => {
                self.shutdown.send_replace(true);
                self.set_state(SessionState::Disconnected);
                return;
            }
            _ => {}
        }
        self.set_state(SessionState::Closing);
        self.shutdown.send_replace(true);
        let sink = self.sink.lock().await.take();
        self.stop_heartbeat();
        if let Some(mut sink) = sink {
            let _ = sink.send(close_frame(CloseCode::Normal)).await;
            let _ = sink.close().await;
        }
        self.set_state(SessionState::Disconnected);
        info!(url = %self.config.url, "websocket session closed");
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

fn close_frame(code: CloseCode) -> WsMessage {
    WsMessage::Close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
}

/// Run one connect step, giving up as soon as close() raises shutdown.
async fn until_shutdown<T>(
    shutdown: &mut watch::Receiver<bool>,
    operation: WsOperation,
    step: impl Future<Output = Result<T, BitunixError>>,
) -> Result<T, BitunixError> {
    tokio::select! {
        result = step => result,
        _ = shutdown.wait_for(|closing| *closing) => {
            Err(BitunixError::websocket(operation, "closed while connecting"))
        }
    }
}

async fn next_failure(rx: &mut Option<mpsc::Receiver<BitunixError>>) -> Option<BitunixError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read the next text frame, skipping control frames.
async fn read_text(receiver: &mut WsReceiver, operation: WsOperation) -> Result<String, BitunixError> {
    loop {
        match receiver.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(WsMessage::Binary(bytes))) => {
                return String::from_utf8(bytes.to_vec())
                    .map_err(|_| BitunixError::websocket(operation, "non-UTF-8 frame"));
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(BitunixError::websocket(operation, "connection closed by server"));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(BitunixError::websocket(operation, e.to_string())),
        }
    }
}

async fn login(
    authenticator: &Authenticator,
    sink: &mut WsSink,
    receiver: &mut WsReceiver,
) -> Result<(), BitunixError> {
    let frame = authenticator()?;
    sink.send(WsMessage::Text(frame.into()))
        .await
        .map_err(|e| BitunixError::websocket(WsOperation::Login, e.to_string()))?;
    let reply = read_text(receiver, WsOperation::Login).await?;
    check_login_reply(&reply)
}

/// A login reply succeeds unless it carries a non-zero `code` or `data.result == false`.
pub(crate) fn check_login_reply(reply: &str) -> Result<(), BitunixError> {
    let value: Value = serde_json::from_str(reply).map_err(|_| {
        BitunixError::websocket(WsOperation::Login, format!("unreadable login reply: {reply}"))
    })?;
    let code = value.get("code").and_then(|c| match c {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    if let Some(code) = code.filter(|c| *c != 0) {
        let msg = value
            .get("msg")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("login rejected");
        return Err(BitunixError::websocket(
            WsOperation::Login,
            format!("{msg} (code {code})"),
        ));
    }
    if value.pointer("/data/result") == Some(&Value::Bool(false)) {
        return Err(BitunixError::websocket(WsOperation::Login, "login rejected"));
    }
    Ok(())
}
