//! Shared configuration for the futures WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Clock, SystemClock};
use crate::futures::ws::messages::{PingRequest, to_frame};
use crate::futures::ws::reconnect::ReconnectPolicy;
use crate::futures::ws::session::{HeartbeatPayload, SessionConfig};

/// Default ping interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-subscriber buffer.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 10;

/// Configuration for WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Endpoint override; `None` uses the client's production endpoint.
    pub url: Option<String>,
    /// Ping interval.
    pub heartbeat_interval: Duration,
    /// Reconnect behavior after a lost connection.
    pub reconnect: ReconnectPolicy,
    /// Messages buffered per subscriber before new ones are dropped.
    pub subscriber_buffer: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl WsConfig {
    /// Create a new configuration builder.
    pub fn builder() -> WsConfigBuilder {
        WsConfigBuilder::new()
    }

    /// Session configuration with a ping heartbeat, against `url` or `default_url`.
    pub(crate) fn session_config(&self, default_url: &str) -> SessionConfig {
        let url = self.url.as_deref().unwrap_or(default_url);
        SessionConfig::new(url).with_heartbeat(self.heartbeat_interval, ping_payload(Arc::new(SystemClock)))
    }
}

/// Builder for [`WsConfig`].
#[derive(Debug, Clone, Default)]
pub struct WsConfigBuilder {
    config: WsConfig,
}

impl WsConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `url` instead of the production endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Set the ping interval; values below
    /// [`MIN_HEARTBEAT_INTERVAL`](crate::futures::ws::MIN_HEARTBEAT_INTERVAL) are raised to it.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Replace the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Give up after `attempts` failed reconnects; `0` retries forever.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect.max_attempts = attempts;
        self
    }

    /// Wait between reconnect attempts.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.delay = delay;
        self
    }

    /// Set the per-subscriber buffer.
    pub fn subscriber_buffer(mut self, buffer: usize) -> Self {
        self.config.subscriber_buffer = buffer;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> WsConfig {
        self.config
    }
}

/// Heartbeat producing `{"op":"ping","ping":<secs>}` from `clock`.
pub(crate) fn ping_payload(clock: Arc<dyn Clock>) -> HeartbeatPayload {
    Arc::new(move || to_frame(&PingRequest::new(clock.now_secs())).unwrap_or_default())
}
