//! Session wrapper that re-dials after a failure and replays subscriptions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{BitunixError, WsOperation};
use crate::futures::ws::session::{SessionConfig, SessionState, WsSession};

/// Default wait between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// When to retry a lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Give up after this many consecutive failed attempts; `0` retries forever.
    pub max_attempts: u32,
    /// Wait before each attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Delay before attempt number `attempt` (0-based), or `None` to give up.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts != 0 && attempt >= self.max_attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

/// Owns one [`WsSession`] at a time and replaces it when it fails.
///
/// Every subscribe frame passed through [`ReconnectingSession::subscribe`]
/// is remembered until the matching [`ReconnectingSession::unsubscribe`],
/// and the whole set is written again on each new session.
pub struct ReconnectingSession {
    config: SessionConfig,
    policy: ReconnectPolicy,
    session: RwLock<Arc<WsSession>>,
    intents: Mutex<BTreeMap<String, String>>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for ReconnectingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSession")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("subscriptions", &self.intent_keys())
            .finish()
    }
}

impl ReconnectingSession {
    /// Wrap sessions built from `config`.
    pub fn new(config: SessionConfig, policy: ReconnectPolicy) -> Self {
        let session = Arc::new(WsSession::new(config.clone()));
        Self {
            config,
            policy,
            session: RwLock::new(session),
            intents: Mutex::new(BTreeMap::new()),
            shutdown: watch::channel(false).0,
        }
    }

    fn current(&self) -> Arc<WsSession> {
        Arc::clone(&self.session.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn intents(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.intents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// State of the current underlying session.
    pub fn state(&self) -> SessionState {
        self.current().state()
    }

    /// Keys of the recorded subscriptions, in replay order.
    pub fn intent_keys(&self) -> Vec<String> {
        self.intents().keys().cloned().collect()
    }

    /// Connect the current session and send every recorded subscription.
    pub async fn connect(&self) -> Result<(), BitunixError> {
        if self.is_closed() {
            return Err(BitunixError::websocket(WsOperation::Dial, "session closed"));
        }
        let session = self.current();
        session.connect().await?;
        if self.is_closed() {
            session.close().await;
            return Err(BitunixError::websocket(WsOperation::Dial, "session closed"));
        }
        self.replay(&session).await
    }

    async fn replay(&self, session: &WsSession) -> Result<(), BitunixError> {
        let frames: Vec<(String, String)> = self
            .intents()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, frame) in frames {
            debug!(subscription = %key, "replaying subscription");
            session.write(frame).await.map_err(as_subscribe_error)?;
        }
        Ok(())
    }

    /// Record a subscription and send it if the session is live.
    ///
    /// The record is kept even when the write fails, so the next session
    /// sends it.
    pub async fn subscribe(&self, key: impl Into<String>, frame: String) -> Result<(), BitunixError> {
        self.intents().insert(key.into(), frame.clone());
        let session = self.current();
        if !session.is_live() {
            return Ok(());
        }
        session.write(frame).await.map_err(as_subscribe_error)
    }

    /// Forget a subscription and send `frame` if the session is live.
    pub async fn unsubscribe(&self, key: &str, frame: String) -> Result<(), BitunixError> {
        if self.intents().remove(key).is_none() {
            return Ok(());
        }
        let session = self.current();
        if !session.is_live() {
            return Ok(());
        }
        session.write(frame).await.map_err(as_subscribe_error)
    }

    /// Send a raw frame on the live session.
    pub async fn write(&self, frame: String) -> Result<(), BitunixError> {
        self.current().write(frame).await
    }

    /// Read frames until [`ReconnectingSession::close`], reconnecting on loss.
    ///
    /// Call [`ReconnectingSession::connect`] first; streaming a session that
    /// was never connected fails with a `Read` error instead of dialing.
    /// Otherwise returns an error only when the policy gives up; the error
    /// is the last connect failure.
    pub async fn stream<F>(&self, mut handler: F) -> Result<(), BitunixError>
    where
        F: FnMut(&str) -> Result<(), BitunixError>,
    {
        let mut shutdown = self.shutdown.subscribe();
        if !self.is_closed() && self.state() == SessionState::Disconnected {
            return Err(BitunixError::websocket(WsOperation::Read, "not connected"));
        }
        loop {
            if self.is_closed() {
                return Ok(());
            }
            let session = self.current();
            let mut last = match session.listen(&mut handler).await {
                Ok(()) if self.is_closed() => return Ok(()),
                Ok(()) => BitunixError::websocket(WsOperation::Read, "session ended"),
                Err(e) => e,
            };
            if self.is_closed() {
                return Ok(());
            }
            warn!(error = %last, "websocket connection lost");

            let mut attempt = 0;
            loop {
                let Some(delay) = self.policy.next_delay(attempt) else {
                    warn!(attempts = attempt, "giving up on reconnect");
                    return Err(last);
                };
                attempt += 1;
                tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
                if self.is_closed() {
                    return Ok(());
                }
                let fresh = Arc::new(WsSession::new(self.config.clone()));
                let connected = tokio::select! {
                    _ = shutdown.wait_for(|closed| *closed) => return Ok(()),
                    result = fresh.connect() => result,
                };
                if let Err(e) = connected {
                    warn!(attempt, error = %e, "reconnect failed");
                    last = e;
                    continue;
                }
                *self.session.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&fresh);
                if self.is_closed() {
                    fresh.close().await;
                    return Ok(());
                }
                if let Err(e) = self.replay(&fresh).await {
                    warn!(attempt, error = %e, "replay failed");
                    last = e;
                    continue;
                }
                info!(attempt, "websocket reconnected");
                break;
            }
        }
    }

    /// Close the session for good. No reconnect follows.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        self.current().close().await;
    }
}

fn as_subscribe_error(err: BitunixError) -> BitunixError {
    match err {
        BitunixError::WebSocket(e) => BitunixError::websocket(WsOperation::Subscribe, e.message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert_eq!(policy.next_delay(0), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_policy_bounded() {
        let policy = ReconnectPolicy::new(2, Duration::from_millis(10));
        assert!(policy.next_delay(0).is_some());
        assert!(policy.next_delay(1).is_some());
        assert_eq!(policy.next_delay(2), None);
    }

    #[tokio::test]
    async fn test_intents_recorded_before_connect() {
        let session = ReconnectingSession::new(SessionConfig::new("ws://127.0.0.1:9"), ReconnectPolicy::default());
        session.subscribe("balance", "{}".into()).await.unwrap();
        session.subscribe("order", "{}".into()).await.unwrap();
        assert_eq!(session.intent_keys(), vec!["balance", "order"]);

        session.unsubscribe("balance", "{}".into()).await.unwrap();
        session.unsubscribe("balance", "{}".into()).await.unwrap();
        assert_eq!(session.intent_keys(), vec!["order"]);
    }

    #[tokio::test]
    async fn test_connect_after_close_fails() {
        let session = ReconnectingSession::new(SessionConfig::new("ws://127.0.0.1:9"), ReconnectPolicy::default());
        session.close().await;
        assert!(session.connect().await.is_err());
        assert!(session.stream(|_| Ok(())).await.is_ok());
    }

    #[test]
    fn test_subscribe_error_operation() {
        let err = as_subscribe_error(BitunixError::websocket(WsOperation::Write, "not connected"));
        assert_eq!(err.websocket_error().unwrap().operation, WsOperation::Subscribe);
    }
}
