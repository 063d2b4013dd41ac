//! Bitunix futures WebSocket API.
//!
//! Two clients share one session stack:
//!
//! - [`PrivateWsClient`] logs in and streams balance, position, order and
//!   TP/SL pushes.
//! - [`PublicWsClient`] streams klines keyed by symbol, interval and price
//!   type.
//!
//! Both wrap a [`ReconnectingSession`], which owns a single [`WsSession`],
//! re-dials after a failure and replays every recorded subscription.
//! Subscribers get a bounded [`Subscription`]; a subscriber that stops
//! reading misses messages instead of stalling the connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bitunix_api_client::futures::ws::{KlineInterval, KlinePriceType, PublicWsClient};
//!
//! # async fn run() -> bitunix_api_client::Result<()> {
//! let client = Arc::new(PublicWsClient::new());
//! client.connect().await?;
//! let mut klines = client
//!     .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Market)
//!     .await?;
//!
//! let reader = Arc::clone(&client);
//! tokio::spawn(async move { reader.stream().await });
//!
//! while let Some(kline) = klines.recv().await {
//!     println!("{} close {}", kline.symbol, kline.close);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication
//!
//! The private session sends a login frame right after the welcome frame:
//! `sign = sha256_hex(sha256_hex(nonce_hex + timestamp_secs + api_key) + secret)`.
//! See [`crate::auth::sign_ws_login`].

mod client;
mod messages;
mod private;
mod public;
mod reconnect;
mod session;
mod subscription;

pub use client::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SUBSCRIBER_BUFFER, WsConfig, WsConfigBuilder};
pub use messages::*;
pub use private::PrivateWsClient;
pub use public::{KlineKey, PublicWsClient};
pub use reconnect::{DEFAULT_RECONNECT_DELAY, ReconnectPolicy, ReconnectingSession};
pub use session::{Authenticator, HeartbeatPayload, MIN_HEARTBEAT_INTERVAL, SessionConfig, SessionState, WsSession};
pub use subscription::{Subscription, SubscriptionId};

/// WebSocket endpoint URLs.
pub mod endpoints {
    /// Private (authenticated) endpoint.
    pub const WS_PRIVATE: &str = "wss://fapi.bitunix.com/private/";
    /// Public market data endpoint.
    pub const WS_PUBLIC: &str = "wss://fapi.bitunix.com/public/";
}

/// Private channel names.
pub mod channels {
    /// Wallet balance.
    pub const BALANCE: &str = "balance";
    /// Positions.
    pub const POSITION: &str = "position";
    /// Orders.
    pub const ORDER: &str = "order";
    /// TP/SL orders.
    pub const TPSL: &str = "tpsl";
}
