//! Authenticated futures stream: balance, position, order and TP/SL pushes.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Signer;
use crate::error::BitunixError;
use crate::futures::ws::client::WsConfig;
use crate::futures::ws::messages::{
    BalanceUpdate, ChannelArg, LoginRequest, OrderUpdate, PositionUpdate, Push, SubscriptionRequest,
    TpslUpdate, to_frame,
};
use crate::futures::ws::reconnect::ReconnectingSession;
use crate::futures::ws::session::{Authenticator, SessionState};
use crate::futures::ws::subscription::{Registry, Subscription, SubscriptionId, release_orphan};
use crate::futures::ws::{channels, endpoints};
use crate::types::Decode;

/// Private futures WebSocket client.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use bitunix_api_client::auth::{Signer, StaticCredentials};
/// use bitunix_api_client::futures::ws::PrivateWsClient;
///
/// # async fn run() -> bitunix_api_client::Result<()> {
/// let signer = Signer::new(Arc::new(StaticCredentials::new("key", "secret")));
/// let client = Arc::new(PrivateWsClient::new(signer));
/// client.connect().await?;
///
/// let mut orders = client.subscribe_orders().await?;
/// let reader = Arc::clone(&client);
/// tokio::spawn(async move { reader.stream().await });
///
/// while let Some(push) = orders.recv().await {
///     println!("{:?} {}", push.data.event, push.data.order_id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PrivateWsClient {
    session: Arc<ReconnectingSession>,
    buffer: usize,
    balance: Arc<Registry<(), Push<BalanceUpdate>>>,
    positions: Arc<Registry<(), Push<PositionUpdate>>>,
    orders: Arc<Registry<(), Push<OrderUpdate>>>,
    tpsl: Arc<Registry<(), Push<TpslUpdate>>>,
}

impl std::fmt::Debug for PrivateWsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateWsClient")
            .field("session", &self.session)
            .field("buffer", &self.buffer)
            .field("balance", &self.balance.len())
            .field("positions", &self.positions.len())
            .field("orders", &self.orders.len())
            .field("tpsl", &self.tpsl.len())
            .finish()
    }
}

impl PrivateWsClient {
    /// Client for the production private endpoint.
    pub fn new(signer: Signer) -> Self {
        Self::with_config(signer, WsConfig::default())
    }

    /// Client with custom configuration.
    pub fn with_config(signer: Signer, config: WsConfig) -> Self {
        let authenticator: Authenticator =
            Arc::new(move || to_frame(&LoginRequest::new(signer.login_params()?)));
        let session_config = config
            .session_config(endpoints::WS_PRIVATE)
            .with_authenticator(authenticator);
        Self {
            session: Arc::new(ReconnectingSession::new(session_config, config.reconnect)),
            buffer: config.subscriber_buffer,
            balance: Arc::new(Registry::new(channels::BALANCE)),
            positions: Arc::new(Registry::new(channels::POSITION)),
            orders: Arc::new(Registry::new(channels::ORDER)),
            tpsl: Arc::new(Registry::new(channels::TPSL)),
        }
    }

    /// Dial, log in and send any subscriptions recorded so far.
    pub async fn connect(&self) -> Result<(), BitunixError> {
        self.session.connect().await
    }

    /// Route pushes to subscribers until [`PrivateWsClient::close`].
    ///
    /// Reconnects according to the configured policy.
    pub async fn stream(&self) -> Result<(), BitunixError> {
        self.session
            .stream(|text| {
                self.route(text);
                Ok(())
            })
            .await
    }

    /// Close the connection; no reconnect follows.
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// State of the underlying session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Wallet balance updates.
    pub async fn subscribe_balance(&self) -> Result<Subscription<Push<BalanceUpdate>>, BitunixError> {
        self.subscribe_channel(&self.balance, channels::BALANCE).await
    }

    /// Position open/update/close events.
    pub async fn subscribe_positions(&self) -> Result<Subscription<Push<PositionUpdate>>, BitunixError> {
        self.subscribe_channel(&self.positions, channels::POSITION).await
    }

    /// Order lifecycle events.
    pub async fn subscribe_orders(&self) -> Result<Subscription<Push<OrderUpdate>>, BitunixError> {
        self.subscribe_channel(&self.orders, channels::ORDER).await
    }

    /// TP/SL order events.
    pub async fn subscribe_tpsl_orders(&self) -> Result<Subscription<Push<TpslUpdate>>, BitunixError> {
        self.subscribe_channel(&self.tpsl, channels::TPSL).await
    }

    /// Remove a balance subscriber.
    pub async fn unsubscribe_balance(&self, id: SubscriptionId) -> Result<(), BitunixError> {
        self.unsubscribe_channel(&self.balance, channels::BALANCE, id).await
    }

    /// Remove a position subscriber.
    pub async fn unsubscribe_positions(&self, id: SubscriptionId) -> Result<(), BitunixError> {
        self.unsubscribe_channel(&self.positions, channels::POSITION, id).await
    }

    /// Remove an order subscriber.
    pub async fn unsubscribe_orders(&self, id: SubscriptionId) -> Result<(), BitunixError> {
        self.unsubscribe_channel(&self.orders, channels::ORDER, id).await
    }

    /// Remove a TP/SL subscriber.
    pub async fn unsubscribe_tpsl_orders(&self, id: SubscriptionId) -> Result<(), BitunixError> {
        self.unsubscribe_channel(&self.tpsl, channels::TPSL, id).await
    }

    async fn subscribe_channel<T: Clone>(
        &self,
        registry: &Registry<(), T>,
        channel: &'static str,
    ) -> Result<Subscription<T>, BitunixError> {
        let frame = to_frame(&SubscriptionRequest::subscribe(vec![ChannelArg::private(channel)]))?;
        let _changes = registry.lock_changes().await;
        let subscription = registry.register((), self.buffer);
        if let Err(e) = self.session.subscribe(channel, frame).await {
            registry.remove(subscription.id());
            return Err(e);
        }
        debug!(channel, subscription = %subscription.id(), "subscribed");
        Ok(subscription)
    }

    async fn unsubscribe_channel<T: Clone>(
        &self,
        registry: &Registry<(), T>,
        channel: &'static str,
        id: SubscriptionId,
    ) -> Result<(), BitunixError> {
        let frame = to_frame(&SubscriptionRequest::unsubscribe(vec![ChannelArg::private(channel)]))?;
        let _changes = registry.lock_changes().await;
        if registry.remove(id).is_none() || registry.has_key(&()) {
            return Ok(());
        }
        self.session.unsubscribe(channel, frame).await
    }

    fn route(&self, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping unparseable frame");
                return;
            }
        };
        let Some(ch) = frame.get("ch").and_then(Value::as_str) else {
            debug!(frame = text, "frame without channel");
            return;
        };
        match ch {
            channels::BALANCE => self.deliver(&self.balance, channels::BALANCE, &frame),
            channels::POSITION => self.deliver(&self.positions, channels::POSITION, &frame),
            channels::ORDER => self.deliver(&self.orders, channels::ORDER, &frame),
            channels::TPSL => self.deliver(&self.tpsl, channels::TPSL, &frame),
            other => debug!(channel = other, "no route for channel"),
        }
    }

    fn deliver<T>(&self, registry: &Arc<Registry<(), Push<T>>>, channel: &'static str, frame: &Value)
    where
        T: Decode + Clone + Send + 'static,
    {
        let pushes = match Push::<T>::decode_all(frame) {
            Ok(pushes) => pushes,
            Err(e) => {
                warn!(channel, error = %e, "dropping undecodable push");
                return;
            }
        };
        let mut orphaned = false;
        for push in pushes {
            orphaned |= registry.deliver(&(), push).orphaned;
        }
        if !orphaned {
            return;
        }
        match to_frame(&SubscriptionRequest::unsubscribe(vec![ChannelArg::private(channel)])) {
            Ok(unsubscribe) => {
                release_orphan(&self.session, registry, (), channel.to_string(), unsubscribe);
            }
            Err(e) => warn!(channel, error = %e, "cannot build unsubscribe frame"),
        }
    }
}
