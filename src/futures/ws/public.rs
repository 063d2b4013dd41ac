//! Public futures stream: klines by symbol, interval and price type.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BitunixError;
use crate::futures::ws::client::WsConfig;
use crate::futures::ws::endpoints;
use crate::futures::ws::messages::{
    ChannelArg, Kline, KlineInterval, KlinePriceType, SubscriptionRequest, kline_channel, to_frame,
};
use crate::futures::ws::reconnect::ReconnectingSession;
use crate::futures::ws::session::SessionState;
use crate::futures::ws::subscription::{Registry, Subscription, SubscriptionId, release_orphan};

/// Routing key of a kline stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KlineKey {
    /// Trading pair
    pub symbol: String,
    /// Bucket width
    pub interval: KlineInterval,
    /// Price series
    pub price_type: KlinePriceType,
}

impl KlineKey {
    /// Channel name on the wire, e.g. `mark_kline_5min`.
    pub fn channel(&self) -> String {
        kline_channel(self.price_type, self.interval)
    }

    fn intent_key(&self) -> String {
        format!("kline:{}:{}", self.symbol, self.channel())
    }

    fn arg(&self) -> ChannelArg {
        ChannelArg::public(self.symbol.clone(), self.channel())
    }
}

/// Public futures WebSocket client.
pub struct PublicWsClient {
    session: Arc<ReconnectingSession>,
    buffer: usize,
    klines: Arc<Registry<KlineKey, Kline>>,
}

impl std::fmt::Debug for PublicWsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicWsClient")
            .field("session", &self.session)
            .field("buffer", &self.buffer)
            .field("klines", &self.klines.keys())
            .finish()
    }
}

impl Default for PublicWsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicWsClient {
    /// Client for the production public endpoint.
    pub fn new() -> Self {
        Self::with_config(WsConfig::default())
    }

    /// Client with custom configuration.
    pub fn with_config(config: WsConfig) -> Self {
        Self {
            session: Arc::new(ReconnectingSession::new(
                config.session_config(endpoints::WS_PUBLIC),
                config.reconnect,
            )),
            buffer: config.subscriber_buffer,
            klines: Arc::new(Registry::new("kline")),
        }
    }

    /// Dial and send any subscriptions recorded so far.
    pub async fn connect(&self) -> Result<(), BitunixError> {
        self.session.connect().await
    }

    /// Route klines to subscribers until [`PublicWsClient::close`].
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

    /// Klines for `symbol` at `interval` on the `price_type` series.
    pub async fn subscribe_kline(
        &self,
        symbol: impl Into<String>,
        interval: KlineInterval,
        price_type: KlinePriceType,
    ) -> Result<Subscription<Kline>, BitunixError> {
        let key = KlineKey {
            symbol: symbol.into(),
            interval,
            price_type,
        };
        let frame = to_frame(&SubscriptionRequest::subscribe(vec![key.arg()]))?;
        let intent = key.intent_key();
        let _changes = self.klines.lock_changes().await;
        let subscription = self.klines.register(key, self.buffer);
        if let Err(e) = self.session.subscribe(intent, frame).await {
            self.klines.remove(subscription.id());
            return Err(e);
        }
        Ok(subscription)
    }

    /// Remove a kline subscriber; the last one for a key unsubscribes on the wire.
    pub async fn unsubscribe_kline(&self, id: SubscriptionId) -> Result<(), BitunixError> {
        let _changes = self.klines.lock_changes().await;
        let Some(key) = self.klines.remove(id) else {
            return Ok(());
        };
        if self.klines.has_key(&key) {
            return Ok(());
        }
        let frame = to_frame(&SubscriptionRequest::unsubscribe(vec![key.arg()]))?;
        self.session.unsubscribe(&key.intent_key(), frame).await
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
        if !ch.contains("_kline_") {
            debug!(channel = ch, "no route for channel");
            return;
        }
        match Kline::from_frame(&frame) {
            Ok(kline) => {
                let key = KlineKey {
                    symbol: kline.symbol.clone(),
                    interval: kline.interval,
                    price_type: kline.price_type,
                };
                if self.klines.deliver(&key, kline).orphaned {
                    self.release(key);
                }
            }
            Err(e) => warn!(channel = ch, error = %e, "dropping undecodable kline"),
        }
    }

    fn release(&self, key: KlineKey) {
        let intent = key.intent_key();
        match to_frame(&SubscriptionRequest::unsubscribe(vec![key.arg()])) {
            Ok(frame) => release_orphan(&self.session, &self.klines, key, intent, frame),
            Err(e) => warn!(subscription = %intent, error = %e, "cannot build unsubscribe frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PublicWsClient {
        PublicWsClient::with_config(WsConfig::builder().url("ws://127.0.0.1:9").build())
    }

    const MARK_1MIN: &str = r#"{"ch":"mark_kline_1min","symbol":"BTCUSDT","ts":1732178884994,"data":{"o":"0.0010","c":"0.0020","h":"0.0025","l":"0.0015","b":"1.01","q":"1.09"}}"#;

    #[test]
    fn test_key_channel() {
        let key = KlineKey {
            symbol: "ETHUSDT".into(),
            interval: KlineInterval::Min5,
            price_type: KlinePriceType::Market,
        };
        assert_eq!(key.channel(), "market_kline_5min");
        assert_eq!(key.intent_key(), "kline:ETHUSDT:market_kline_5min");
    }

    #[tokio::test]
    async fn test_route_by_key() {
        let client = client();
        let mut mark = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Mark)
            .await
            .unwrap();
        let mut market = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Market)
            .await
            .unwrap();

        client.route(MARK_1MIN);

        let kline = mark.try_recv().unwrap();
        assert_eq!(kline.close, 0.002);
        assert_eq!(kline.price_type, KlinePriceType::Mark);
        assert!(market.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_shared_key() {
        let client = client();
        let a = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Mark)
            .await
            .unwrap();
        let mut b = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Mark)
            .await
            .unwrap();

        client.unsubscribe_kline(a.id()).await.unwrap();
        assert_eq!(client.session.intent_keys(), vec!["kline:BTCUSDT:mark_kline_1min"]);

        client.route(MARK_1MIN);
        assert!(b.try_recv().is_some());

        client.unsubscribe_kline(b.id()).await.unwrap();
        assert!(client.session.intent_keys().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_releases_intent() {
        let client = client();
        let mark = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Mark)
            .await
            .unwrap();
        let _market = client
            .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Market)
            .await
            .unwrap();
        drop(mark);

        client.route(MARK_1MIN);
        for _ in 0..100 {
            if client.session.intent_keys() == vec!["kline:BTCUSDT:market_kline_1min"] {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("mark intent kept: {:?}", client.session.intent_keys());
    }
}
