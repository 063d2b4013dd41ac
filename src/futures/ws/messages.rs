//! WebSocket message types for the Bitunix futures streams.
//!
//! Outgoing frames are small `{"op": ..., "args": [...]}` objects. Incoming
//! pushes carry a channel name, a millisecond timestamp and a `data`
//! payload that is decoded with the same coercion rules as REST responses.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::auth::LoginParams;
use crate::error::BitunixError;
use crate::types::common::string_enum;
use crate::types::{
    Decode, Fields, MarginMode, OrderStatus, OrderType, PositionMode, PositionSide, Side, StopType,
    TimeInForce,
};

// Outgoing.

/// `{"op":"login","args":[...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    op: &'static str,
    args: Vec<LoginParams>,
}

impl LoginRequest {
    /// Wrap signed login parameters.
    pub fn new(params: LoginParams) -> Self {
        Self {
            op: "login",
            args: vec![params],
        }
    }
}

/// `{"op":"ping","ping":<unix seconds>}`.
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    op: &'static str,
    /// Seconds since the UNIX epoch
    pub ping: u64,
}

impl PingRequest {
    /// Ping stamped with `secs`.
    pub fn new(secs: u64) -> Self {
        Self { op: "ping", ping: secs }
    }
}

/// One channel argument of a subscribe frame.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelArg {
    /// Symbol, for public channels
    pub symbol: Option<String>,
    /// Channel name
    pub ch: String,
}

impl ChannelArg {
    /// A private channel such as `balance`.
    pub fn private(ch: impl Into<String>) -> Self {
        Self {
            symbol: None,
            ch: ch.into(),
        }
    }

    /// A public channel bound to a symbol.
    pub fn public(symbol: impl Into<String>, ch: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ch: ch.into(),
        }
    }
}

/// `{"op":"subscribe"|"unsubscribe","args":[...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    op: &'static str,
    args: Vec<ChannelArg>,
}

impl SubscriptionRequest {
    /// Subscribe to channels.
    pub fn subscribe(args: Vec<ChannelArg>) -> Self {
        Self { op: "subscribe", args }
    }

    /// Unsubscribe from channels.
    pub fn unsubscribe(args: Vec<ChannelArg>) -> Self {
        Self {
            op: "unsubscribe",
            args,
        }
    }
}

/// Serialize an outgoing frame.
pub(crate) fn to_frame<T: Serialize>(message: &T) -> Result<String, BitunixError> {
    serde_json::to_string(message)
        .map_err(|e| BitunixError::Internal(format!("failed to encode frame: {e}")))
}

// Incoming.

/// A decoded push for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Push<T> {
    /// Server timestamp of the push
    pub ts: OffsetDateTime,
    /// Decoded payload
    pub data: T,
}

impl<T: Decode> Push<T> {
    /// Decode every payload in a push frame.
    ///
    /// `data` may be a single object or a list; each element becomes one push.
    pub fn decode_all(frame: &Value) -> Result<Vec<Self>, BitunixError> {
        let f = Fields::new(frame, "Push")?;
        let ts = f.timestamp("ts")?;
        match f.raw("data") {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| T::decode(item).map(|data| Push { ts, data }))
                .collect(),
            Some(item) => Ok(vec![Push {
                ts,
                data: T::decode(item)?,
            }]),
        }
    }
}

/// Balance change on the `balance` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    /// Margin coin
    pub coin: String,
    /// Available balance
    pub available: f64,
    /// Locked by orders
    pub frozen: f64,
    /// Locked by isolated orders
    pub isolation_frozen: f64,
    /// Locked by cross orders
    pub cross_frozen: f64,
    /// Position margin
    pub margin: f64,
    /// Isolated position margin
    pub isolation_margin: f64,
    /// Cross position margin
    pub cross_margin: f64,
    /// Experience money
    pub exp_money: f64,
}

impl Decode for BalanceUpdate {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "BalanceUpdate")?;
        Ok(Self {
            coin: f.string("coin")?,
            available: f.float("available")?,
            frozen: f.float("frozen")?,
            isolation_frozen: f.float("isolationFrozen")?,
            cross_frozen: f.float("crossFrozen")?,
            margin: f.float("margin")?,
            isolation_margin: f.float("isolationMargin")?,
            cross_margin: f.float("crossMargin")?,
            exp_money: f.float("expMoney")?,
        })
    }
}

string_enum! {
    /// Lifecycle event of a position push.
    PositionEvent {
        /// Position opened
        Open => "OPEN",
        /// Position changed
        Update => "UPDATE",
        /// Position closed
        Close => "CLOSE",
    }
}

string_enum! {
    /// Lifecycle event of an order or TP/SL push.
    OrderEvent {
        /// Created
        Create => "CREATE",
        /// Changed
        Update => "UPDATE",
        /// Finished
        Close => "CLOSE",
    }
}

/// Position change on the `position` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    /// What happened
    pub event: PositionEvent,
    /// Position ID
    pub position_id: String,
    /// Trading pair
    pub symbol: String,
    /// Margin mode
    pub margin_mode: MarginMode,
    /// Position mode
    pub position_mode: PositionMode,
    /// Long or short
    pub side: PositionSide,
    /// Leverage
    pub leverage: u32,
    /// Locked margin
    pub margin: f64,
    /// Position size
    pub qty: f64,
    /// Entry value
    pub entry_value: f64,
    /// Realized PnL
    pub realized_pnl: f64,
    /// Unrealized PnL
    pub unrealized_pnl: f64,
    /// Funding fees
    pub funding: f64,
    /// Fees
    pub fee: f64,
    /// Open time
    pub ctime: OffsetDateTime,
}

impl Decode for PositionUpdate {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "PositionUpdate")?;
        Ok(Self {
            event: f.token("event")?,
            position_id: f.string("positionId")?,
            symbol: f.string("symbol")?,
            margin_mode: f.token("marginMode")?,
            position_mode: f.token("positionMode")?,
            side: f.token("side")?,
            leverage: f.u32("leverage")?,
            margin: f.float("margin")?,
            qty: f.float("qty")?,
            entry_value: f.float("entryValue")?,
            realized_pnl: f.float("realizedPNL")?,
            unrealized_pnl: f.float("unrealizedPNL")?,
            funding: f.float("funding")?,
            fee: f.float("fee")?,
            ctime: f.timestamp("ctime")?,
        })
    }
}

/// Order change on the `order` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    /// What happened
    pub event: OrderEvent,
    /// Venue order ID
    pub order_id: String,
    /// Trading pair
    pub symbol: String,
    /// Margin mode
    pub margin_mode: Option<MarginMode>,
    /// Position mode
    pub position_mode: Option<PositionMode>,
    /// Buy or sell
    pub side: Side,
    /// Time in force
    pub effect: Option<TimeInForce>,
    /// Limit or market
    pub order_type: OrderType,
    /// Quantity
    pub qty: f64,
    /// Whether the order only reduces
    pub reduce_only: bool,
    /// Limit price
    pub price: f64,
    /// Leverage
    pub leverage: u32,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Fee
    pub fee: f64,
    /// Take-profit trigger
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Stop-loss trigger
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Creation time
    pub ctime: OffsetDateTime,
    /// Last change
    pub mtime: OffsetDateTime,
}

impl Decode for OrderUpdate {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "OrderUpdate")?;
        Ok(Self {
            event: f.token("event")?,
            order_id: f.string("orderId")?,
            symbol: f.string("symbol")?,
            margin_mode: f.token_opt("positionType")?,
            position_mode: f.token_opt("positionMode")?,
            side: f.token("side")?,
            effect: f.token_opt("effect")?,
            order_type: f.token("type")?,
            qty: f.float("qty")?,
            reduce_only: f.bool("reductionOnly")?,
            price: f.float("price")?,
            leverage: f.u32("leverage")?,
            status: f.token("orderStatus")?,
            fee: f.float("fee")?,
            tp_price: f.float_opt("tpPrice")?,
            tp_stop_type: f.token_opt("tpStopType")?,
            sl_price: f.float_opt("slPrice")?,
            sl_stop_type: f.token_opt("slStopType")?,
            ctime: f.timestamp("ctime")?,
            mtime: f.timestamp("mtime")?,
        })
    }
}

/// TP/SL order change on the `tpsl` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TpslUpdate {
    /// What happened
    pub event: OrderEvent,
    /// Position the order protects
    pub position_id: String,
    /// TP/SL order ID
    pub order_id: String,
    /// Trading pair
    pub symbol: String,
    /// Leverage
    pub leverage: u32,
    /// Buy or sell
    pub side: Option<Side>,
    /// Position mode
    pub position_mode: Option<PositionMode>,
    /// Venue status string
    pub status: Option<String>,
    /// Venue TP/SL kind
    pub kind: Option<String>,
    /// Take-profit trigger
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Take-profit quantity
    pub tp_qty: Option<f64>,
    /// Stop-loss trigger
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Stop-loss quantity
    pub sl_qty: Option<f64>,
    /// Creation time
    pub ctime: OffsetDateTime,
}

impl Decode for TpslUpdate {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "TpslUpdate")?;
        Ok(Self {
            event: f.token("event")?,
            position_id: f.string("positionId")?,
            order_id: f.string("orderId")?,
            symbol: f.string("symbol")?,
            leverage: f.u32("leverage")?,
            side: f.token_opt("side")?,
            position_mode: f.token_opt("positionMode")?,
            status: f.string_opt("status")?,
            kind: f.string_opt("type")?,
            tp_price: f.float_opt("tpPrice")?,
            tp_stop_type: f.token_opt("tpStopType")?,
            tp_qty: f.float_opt("tpQty")?,
            sl_price: f.float_opt("slPrice")?,
            sl_stop_type: f.token_opt("slStopType")?,
            sl_qty: f.float_opt("slQty")?,
            ctime: f.timestamp("ctime")?,
        })
    }
}

// Klines.

string_enum! {
    /// Price series a kline is built from.
    KlinePriceType {
        /// Last traded price
        Market => "market",
        /// Mark price
        Mark => "mark",
    }
}

string_enum! {
    /// Kline bucket width.
    KlineInterval {
        /// 1 minute
        Min1 => "1min",
        /// 3 minutes
        Min3 => "3min",
        /// 5 minutes
        Min5 => "5min",
        /// 15 minutes
        Min15 => "15min",
        /// 30 minutes
        Min30 => "30min",
        /// 60 minutes
        Min60 => "60min",
        /// 2 hours
        Hour2 => "2h",
        /// 4 hours
        Hour4 => "4h",
        /// 6 hours
        Hour6 => "6h",
        /// 8 hours
        Hour8 => "8h",
        /// 12 hours
        Hour12 => "12h",
        /// 1 day
        Day1 => "1day",
        /// 3 days
        Day3 => "3day",
        /// 1 week
        Week1 => "1week",
        /// 1 month
        Month1 => "1month",
    }
}

/// Channel name for a kline stream, e.g. `market_kline_1min`.
pub fn kline_channel(price_type: KlinePriceType, interval: KlineInterval) -> String {
    format!("{}_kline_{}", price_type, interval)
}

/// Split a kline channel name into its price type and interval.
pub fn parse_kline_channel(ch: &str) -> Option<(KlinePriceType, KlineInterval)> {
    let (price_type, interval) = ch.split_once("_kline_")?;
    Some((price_type.parse().ok()?, interval.parse().ok()?))
}

/// One kline bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    /// Trading pair
    pub symbol: String,
    /// Price series
    pub price_type: KlinePriceType,
    /// Bucket width
    pub interval: KlineInterval,
    /// Push timestamp
    pub ts: OffsetDateTime,
    /// Open
    pub open: f64,
    /// High
    pub high: f64,
    /// Low
    pub low: f64,
    /// Close
    pub close: f64,
    /// Base coin volume
    pub base_volume: f64,
    /// Quote coin volume
    pub quote_volume: f64,
}

impl Kline {
    /// Decode a kline push frame.
    pub fn from_frame(frame: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(frame, "Kline")?;
        let ch = f.string("ch")?;
        let (price_type, interval) = parse_kline_channel(&ch)
            .ok_or_else(|| BitunixError::validation("ch", format!("`{ch}` is not a kline channel")))?;
        let data = f
            .raw("data")
            .ok_or_else(|| BitunixError::validation("data", "Kline: missing payload"))?;
        let d = Fields::new(data, "Kline")?;
        Ok(Self {
            symbol: f.string("symbol")?,
            price_type,
            interval,
            ts: f.timestamp("ts")?,
            open: d.float("o")?,
            high: d.float("h")?,
            low: d.float("l")?,
            close: d.float("c")?,
            base_volume: d.float("b")?,
            quote_volume: d.float("q")?,
        })
    }
}
