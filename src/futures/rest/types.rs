//! Request and response types for the futures REST endpoints.

use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::error::BitunixError;
use crate::futures::types::{HistoryPosition, Order, TpslOrder, Trade};
use crate::types::serde_helpers::{float_string, opt_float_string};
use crate::types::{
    Decode, Fields, MarginMode, OrderStatus, OrderType, PositionMode, PositionSide, Side, StopType,
    TimeInForce, TradeSide,
};

/// Largest page size the venue accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

fn require_symbol(symbol: &str) -> Result<(), BitunixError> {
    if symbol.trim().is_empty() {
        return Err(BitunixError::validation("symbol", "must not be empty"));
    }
    Ok(())
}

fn require_positive(field: &str, value: f64) -> Result<(), BitunixError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BitunixError::validation(field, format!("must be > 0, got {value}")));
    }
    Ok(())
}

fn check_optional_positive(field: &str, value: Option<f64>) -> Result<(), BitunixError> {
    match value {
        Some(v) => require_positive(field, v),
        None => Ok(()),
    }
}

pub(crate) fn check_limit(limit: Option<u32>) -> Result<(), BitunixError> {
    match limit {
        Some(l) if l == 0 || l > MAX_PAGE_LIMIT => Err(BitunixError::validation(
            "limit",
            format!("must be within 1..={MAX_PAGE_LIMIT}, got {l}"),
        )),
        _ => Ok(()),
    }
}

// Orders.

/// Request to place an order.
///
/// ```rust
/// use bitunix_api_client::futures::rest::PlaceOrderRequest;
/// use bitunix_api_client::types::{Side, StopType, TradeSide};
///
/// let request = PlaceOrderRequest::limit("BTCUSDT", Side::Buy, 0.5, 60000.0)
///     .trade_side(TradeSide::Open)
///     .client_id("my-order-1")
///     .take_profit(65000.0, StopType::MarkPrice);
/// assert!(request.validate().is_ok());
/// ```
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Trading pair
    pub symbol: String,
    /// Quantity in base coin
    #[serde(with = "float_string")]
    pub qty: f64,
    /// Limit price; required for LIMIT orders
    #[serde(with = "opt_float_string")]
    pub price: Option<f64>,
    /// Buy or sell
    pub side: Side,
    /// Open or close, for hedge mode
    pub trade_side: Option<TradeSide>,
    /// Position to close, for hedge mode closes
    pub position_id: Option<String>,
    /// Limit or market
    pub order_type: OrderType,
    /// Time in force
    pub effect: Option<TimeInForce>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Only reduce an existing position
    pub reduce_only: Option<bool>,
    /// Take-profit trigger price
    #[serde(with = "opt_float_string")]
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Take-profit order type
    pub tp_order_type: Option<OrderType>,
    /// Take-profit limit price
    #[serde(with = "opt_float_string")]
    pub tp_order_price: Option<f64>,
    /// Stop-loss trigger price
    #[serde(with = "opt_float_string")]
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Stop-loss order type
    pub sl_order_type: Option<OrderType>,
    /// Stop-loss limit price
    #[serde(with = "opt_float_string")]
    pub sl_order_price: Option<f64>,
}

impl PlaceOrderRequest {
    fn new(symbol: impl Into<String>, side: Side, qty: f64, order_type: OrderType, price: Option<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            qty,
            price,
            side,
            trade_side: None,
            position_id: None,
            order_type,
            effect: None,
            client_id: None,
            reduce_only: None,
            tp_price: None,
            tp_stop_type: None,
            tp_order_type: None,
            tp_order_price: None,
            sl_price: None,
            sl_stop_type: None,
            sl_order_type: None,
            sl_order_price: None,
        }
    }

    /// A limit order.
    pub fn limit(symbol: impl Into<String>, side: Side, qty: f64, price: f64) -> Self {
        Self::new(symbol, side, qty, OrderType::Limit, Some(price))
    }

    /// A market order.
    pub fn market(symbol: impl Into<String>, side: Side, qty: f64) -> Self {
        Self::new(symbol, side, qty, OrderType::Market, None)
    }

    /// Set whether the order opens or closes.
    pub fn trade_side(mut self, trade_side: TradeSide) -> Self {
        self.trade_side = Some(trade_side);
        self
    }

    /// Target a specific position.
    pub fn position_id(mut self, position_id: impl Into<String>) -> Self {
        self.position_id = Some(position_id.into());
        self
    }

    /// Set the time in force.
    pub fn effect(mut self, effect: TimeInForce) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Set a client order ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Only reduce an existing position.
    pub fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = Some(reduce_only);
        self
    }

    /// Attach a market take-profit.
    pub fn take_profit(mut self, trigger: f64, stop_type: StopType) -> Self {
        self.tp_price = Some(trigger);
        self.tp_stop_type = Some(stop_type);
        self
    }

    /// Turn the attached take-profit into a limit order at `price`.
    pub fn take_profit_limit(mut self, price: f64) -> Self {
        self.tp_order_type = Some(OrderType::Limit);
        self.tp_order_price = Some(price);
        self
    }

    /// Attach a market stop-loss.
    pub fn stop_loss(mut self, trigger: f64, stop_type: StopType) -> Self {
        self.sl_price = Some(trigger);
        self.sl_stop_type = Some(stop_type);
        self
    }

    /// Turn the attached stop-loss into a limit order at `price`.
    pub fn stop_loss_limit(mut self, price: f64) -> Self {
        self.sl_order_type = Some(OrderType::Limit);
        self.sl_order_price = Some(price);
        self
    }

    /// Check required fields locally.
    pub fn validate(&self) -> Result<(), BitunixError> {
        require_symbol(&self.symbol)?;
        require_positive("qty", self.qty)?;
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => {
                return Err(BitunixError::validation("price", "required for LIMIT orders"));
            }
            (_, price) => check_optional_positive("price", price)?,
        }
        check_optional_positive("tpPrice", self.tp_price)?;
        check_optional_positive("slPrice", self.sl_price)?;
        check_optional_positive("tpOrderPrice", self.tp_order_price)?;
        check_optional_positive("slOrderPrice", self.sl_order_price)?;
        if self.tp_order_type == Some(OrderType::Limit) && self.tp_order_price.is_none() {
            return Err(BitunixError::validation("tpOrderPrice", "required for LIMIT take-profit"));
        }
        if self.sl_order_type == Some(OrderType::Limit) && self.sl_order_price.is_none() {
            return Err(BitunixError::validation("slOrderPrice", "required for LIMIT stop-loss"));
        }
        Ok(())
    }
}

/// Confirmation of a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Venue order ID
    pub order_id: String,
    /// Client order ID, if one was given
    pub client_id: Option<String>,
}

impl Decode for OrderAck {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "OrderAck")?;
        Ok(Self {
            order_id: f.string("orderId")?,
            client_id: f.string_opt("clientId")?,
        })
    }
}

/// One order to cancel, by venue ID or client ID.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderItem {
    /// Venue order ID
    pub order_id: Option<String>,
    /// Client order ID
    pub client_id: Option<String>,
}

impl CancelOrderItem {
    /// Cancel by venue order ID.
    pub fn order_id(id: impl Into<String>) -> Self {
        Self {
            order_id: Some(id.into()),
            client_id: None,
        }
    }

    /// Cancel by client order ID.
    pub fn client_id(id: impl Into<String>) -> Self {
        Self {
            order_id: None,
            client_id: Some(id.into()),
        }
    }
}

/// Request to cancel orders on one symbol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrdersRequest {
    /// Trading pair
    pub symbol: String,
    /// Orders to cancel
    pub order_list: Vec<CancelOrderItem>,
}

impl CancelOrdersRequest {
    /// Create a cancel request.
    pub fn new(symbol: impl Into<String>, order_list: Vec<CancelOrderItem>) -> Self {
        Self {
            symbol: symbol.into(),
            order_list,
        }
    }

    /// Check required fields locally.
    pub fn validate(&self) -> Result<(), BitunixError> {
        require_symbol(&self.symbol)?;
        if self.order_list.is_empty() {
            return Err(BitunixError::validation("orderList", "must not be empty"));
        }
        let blank = |id: &Option<String>| id.as_deref().is_none_or(|s| s.trim().is_empty());
        if self
            .order_list
            .iter()
            .any(|item| blank(&item.order_id) && blank(&item.client_id))
        {
            return Err(BitunixError::validation(
                "orderList",
                "every entry needs an orderId or a clientId",
            ));
        }
        Ok(())
    }
}

/// An order the venue failed to cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelFailure {
    /// Venue order ID
    pub order_id: Option<String>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Reason
    pub error_msg: String,
    /// Venue error code
    pub error_code: String,
}

impl Decode for CancelFailure {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "CancelFailure")?;
        Ok(Self {
            order_id: f.string_opt("orderId")?,
            client_id: f.string_opt("clientId")?,
            error_msg: f.string("errorMsg")?,
            error_code: f.string("errorCode")?,
        })
    }
}

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrdersResult {
    /// Accepted cancellations
    pub success_list: Vec<OrderAck>,
    /// Rejected cancellations
    pub failure_list: Vec<CancelFailure>,
}

impl Decode for CancelOrdersResult {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "CancelOrdersResult")?;
        Ok(Self {
            success_list: f.list("successList")?,
            failure_list: f.list("failureList")?,
        })
    }
}

/// Filters for historical orders.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOrdersRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Venue order ID
    pub order_id: Option<String>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Order status
    pub status: Option<OrderStatus>,
    /// Order type
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    /// Start time, UNIX milliseconds
    pub start_time: Option<u64>,
    /// End time, UNIX milliseconds
    pub end_time: Option<u64>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// Filters for open orders.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrdersRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Venue order ID
    pub order_id: Option<String>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Order status
    pub status: Option<OrderStatus>,
    /// Start time, UNIX milliseconds
    pub start_time: Option<u64>,
    /// End time, UNIX milliseconds
    pub end_time: Option<u64>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// One page of orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPage {
    /// Orders on this page
    pub orders: Vec<Order>,
    /// Total matching orders
    pub total: u64,
}

impl Decode for OrderPage {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "OrderPage")?;
        Ok(Self {
            orders: f.list("orderList")?,
            total: f.count("total")?,
        })
    }
}

// Trades.

/// Filters for historical fills.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTradesRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Venue order ID
    pub order_id: Option<String>,
    /// Position ID
    pub position_id: Option<String>,
    /// Start time, UNIX milliseconds
    pub start_time: Option<u64>,
    /// End time, UNIX milliseconds
    pub end_time: Option<u64>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// One page of fills.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePage {
    /// Fills on this page
    pub trades: Vec<Trade>,
    /// Total matching fills
    pub total: u64,
}

impl Decode for TradePage {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "TradePage")?;
        Ok(Self {
            trades: f.list("tradeList")?,
            total: f.count("total")?,
        })
    }
}

// Positions.

/// Filters for closed positions.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPositionsRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Position ID
    pub position_id: Option<String>,
    /// Start time, UNIX milliseconds
    pub start_time: Option<u64>,
    /// End time, UNIX milliseconds
    pub end_time: Option<u64>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// One page of closed positions.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPositionPage {
    /// Positions on this page
    pub positions: Vec<HistoryPosition>,
    /// Total matching positions
    pub total: u64,
}

impl Decode for HistoryPositionPage {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "HistoryPositionPage")?;
        Ok(Self {
            positions: f.list("positionList")?,
            total: f.count("total")?,
        })
    }
}

/// Filters for open positions.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPositionsRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Position ID
    pub position_id: Option<String>,
}

// TP/SL.

/// Request to place a take-profit / stop-loss order on a position.
///
/// At least one of the take-profit or stop-loss legs must be set.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTpslRequest {
    /// Trading pair
    pub symbol: String,
    /// Position to protect
    pub position_id: String,
    /// Take-profit trigger price
    #[serde(with = "opt_float_string")]
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Stop-loss trigger price
    #[serde(with = "opt_float_string")]
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Take-profit order type
    pub tp_order_type: Option<OrderType>,
    /// Take-profit limit price
    #[serde(with = "opt_float_string")]
    pub tp_order_price: Option<f64>,
    /// Stop-loss order type
    pub sl_order_type: Option<OrderType>,
    /// Stop-loss limit price
    #[serde(with = "opt_float_string")]
    pub sl_order_price: Option<f64>,
    /// Take-profit quantity
    #[serde(with = "opt_float_string")]
    pub tp_qty: Option<f64>,
    /// Stop-loss quantity
    #[serde(with = "opt_float_string")]
    pub sl_qty: Option<f64>,
}

impl PlaceTpslRequest {
    /// Create an empty TP/SL request for a position.
    pub fn new(symbol: impl Into<String>, position_id: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            position_id: position_id.into(),
            tp_price: None,
            tp_stop_type: None,
            sl_price: None,
            sl_stop_type: None,
            tp_order_type: None,
            tp_order_price: None,
            sl_order_type: None,
            sl_order_price: None,
            tp_qty: None,
            sl_qty: None,
        }
    }

    /// Set the take-profit trigger.
    pub fn take_profit(mut self, trigger: f64, stop_type: StopType) -> Self {
        self.tp_price = Some(trigger);
        self.tp_stop_type = Some(stop_type);
        self
    }

    /// Set the stop-loss trigger.
    pub fn stop_loss(mut self, trigger: f64, stop_type: StopType) -> Self {
        self.sl_price = Some(trigger);
        self.sl_stop_type = Some(stop_type);
        self
    }

    /// Limit the take-profit to part of the position.
    pub fn take_profit_qty(mut self, qty: f64) -> Self {
        self.tp_qty = Some(qty);
        self
    }

    /// Limit the stop-loss to part of the position.
    pub fn stop_loss_qty(mut self, qty: f64) -> Self {
        self.sl_qty = Some(qty);
        self
    }

    /// Check required fields locally.
    pub fn validate(&self) -> Result<(), BitunixError> {
        require_symbol(&self.symbol)?;
        if self.position_id.trim().is_empty() {
            return Err(BitunixError::validation("positionId", "must not be empty"));
        }
        if self.tp_price.is_none() && self.sl_price.is_none() {
            return Err(BitunixError::validation(
                "tpPrice",
                "at least one of tpPrice or slPrice is required",
            ));
        }
        check_optional_positive("tpPrice", self.tp_price)?;
        check_optional_positive("slPrice", self.sl_price)?;
        check_optional_positive("tpOrderPrice", self.tp_order_price)?;
        check_optional_positive("slOrderPrice", self.sl_order_price)?;
        check_optional_positive("tpQty", self.tp_qty)?;
        check_optional_positive("slQty", self.sl_qty)?;
        Ok(())
    }
}

/// Confirmation of a placed TP/SL order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpslAck {
    /// TP/SL order ID
    pub order_id: String,
}

impl Decode for TpslAck {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "TpslAck")?;
        Ok(Self {
            order_id: f.string("orderId")?,
        })
    }
}

/// Filters for open TP/SL orders.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTpslRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Position ID
    pub position_id: Option<String>,
    /// Position direction
    pub side: Option<PositionSide>,
    /// Position mode
    pub position_mode: Option<PositionMode>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// Filters for historical TP/SL orders.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTpslRequest {
    /// Trading pair
    pub symbol: Option<String>,
    /// Position direction
    pub side: Option<PositionSide>,
    /// Position mode
    pub position_mode: Option<PositionMode>,
    /// Margin mode
    pub margin_mode: Option<MarginMode>,
    /// Start time, UNIX milliseconds
    pub start_time: Option<u64>,
    /// End time, UNIX milliseconds
    pub end_time: Option<u64>,
    /// Records to skip
    pub skip: Option<u32>,
    /// Page size, 1..=100
    pub limit: Option<u32>,
}

/// One page of historical TP/SL orders.
#[derive(Debug, Clone, PartialEq)]
pub struct TpslPage {
    /// Orders on this page
    pub orders: Vec<TpslOrder>,
    /// Total matching orders
    pub total: u64,
}

impl Decode for TpslPage {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "TpslPage")?;
        Ok(Self {
            orders: f.list("orderList")?,
            total: f.count("total")?,
        })
    }
}
