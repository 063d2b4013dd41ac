//! Bitunix futures account, order, trade and position types.
//!
//! These are the entities returned by the REST endpoints. Numeric fields
//! arrive as decimal strings and are exposed as `f64`; timestamps arrive as
//! millisecond strings and are exposed as UTC [`OffsetDateTime`] values.

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::BitunixError;
use crate::types::{
    Decode, Fields, MarginMode, OrderStatus, OrderType, PositionMode, PositionSide, Role, Side,
    StopType, TimeInForce,
};

/// Futures account balance for one margin coin.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    /// Margin coin (e.g. "USDT")
    pub margin_coin: String,
    /// Available balance
    pub available: f64,
    /// Locked by open orders
    pub frozen: f64,
    /// Locked by positions
    pub margin: f64,
    /// Transferable amount
    pub transfer: f64,
    /// Account position mode
    pub position_mode: PositionMode,
    /// Unrealized PnL of cross positions
    pub cross_unrealized_pnl: f64,
    /// Unrealized PnL of isolated positions
    pub isolation_unrealized_pnl: f64,
    /// Experience gold
    pub bonus: f64,
}

impl Decode for AccountBalance {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        // The venue sometimes wraps the single balance in a list.
        let value = match value {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| BitunixError::validation("data", "empty account list"))?,
            other => other,
        };
        let f = Fields::new(value, "AccountBalance")?;
        Ok(Self {
            margin_coin: f.string("marginCoin")?,
            available: f.float("available")?,
            frozen: f.float("frozen")?,
            margin: f.float("margin")?,
            transfer: f.float("transfer")?,
            position_mode: f.token("positionMode")?,
            cross_unrealized_pnl: f.float("crossUnrealizedPNL")?,
            isolation_unrealized_pnl: f.float("isolationUnrealizedPNL")?,
            bonus: f.float("bonus")?,
        })
    }
}

/// Take-profit / stop-loss legs attached to an order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachedTpsl {
    /// Take-profit trigger price
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Take-profit order type
    pub tp_order_type: Option<OrderType>,
    /// Take-profit limit price
    pub tp_order_price: Option<f64>,
    /// Stop-loss trigger price
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Stop-loss order type
    pub sl_order_type: Option<OrderType>,
    /// Stop-loss limit price
    pub sl_order_price: Option<f64>,
}

impl AttachedTpsl {
    pub(crate) fn from_fields(f: &Fields<'_>) -> Result<Self, BitunixError> {
        Ok(Self {
            tp_price: f.float_opt("tpPrice")?,
            tp_stop_type: f.token_opt("tpStopType")?,
            tp_order_type: f.token_opt("tpOrderType")?,
            tp_order_price: f.float_opt("tpOrderPrice")?,
            sl_price: f.float_opt("slPrice")?,
            sl_stop_type: f.token_opt("slStopType")?,
            sl_order_type: f.token_opt("slOrderType")?,
            sl_order_price: f.float_opt("slOrderPrice")?,
        })
    }
}

/// A futures order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Venue order ID
    pub order_id: String,
    /// Trading pair
    pub symbol: String,
    /// Order quantity in base coin
    pub qty: f64,
    /// Filled quantity
    pub trade_qty: f64,
    /// Position mode the order was placed under
    pub position_mode: PositionMode,
    /// Margin mode
    pub margin_mode: MarginMode,
    /// Leverage
    pub leverage: u32,
    /// Limit price
    pub price: f64,
    /// Buy or sell
    pub side: Side,
    /// Limit or market
    pub order_type: OrderType,
    /// Time in force
    pub effect: Option<TimeInForce>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Whether the order only reduces a position
    pub reduce_only: bool,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Fee paid
    pub fee: f64,
    /// Realized PnL
    pub realized_pnl: f64,
    /// Attached take-profit / stop-loss
    pub tpsl: AttachedTpsl,
    /// Creation time
    pub ctime: OffsetDateTime,
    /// Last modification time
    pub mtime: OffsetDateTime,
}

impl Decode for Order {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "Order")?;
        Ok(Self {
            order_id: f.string("orderId")?,
            symbol: f.string("symbol")?,
            qty: f.float("qty")?,
            trade_qty: f.float("tradeQty")?,
            position_mode: f.token("positionMode")?,
            margin_mode: f.token("marginMode")?,
            leverage: f.u32("leverage")?,
            price: f.float("price")?,
            side: f.token("side")?,
            order_type: f.token("orderType")?,
            effect: f.token_opt("effect")?,
            client_id: f.string_opt("clientId")?,
            reduce_only: f.bool("reduceOnly")?,
            status: f.token("status")?,
            fee: f.float("fee")?,
            realized_pnl: f.float("realizedPNL")?,
            tpsl: AttachedTpsl::from_fields(&f)?,
            ctime: f.timestamp("ctime")?,
            mtime: f.timestamp("mtime")?,
        })
    }
}

/// A fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Trade ID
    pub trade_id: String,
    /// Order the fill belongs to
    pub order_id: String,
    /// Trading pair
    pub symbol: String,
    /// Filled quantity
    pub qty: f64,
    /// Position mode
    pub position_mode: PositionMode,
    /// Margin mode
    pub margin_mode: MarginMode,
    /// Leverage
    pub leverage: u32,
    /// Fill price
    pub price: f64,
    /// Buy or sell
    pub side: Side,
    /// Limit or market
    pub order_type: OrderType,
    /// Time in force
    pub effect: Option<TimeInForce>,
    /// Client order ID
    pub client_id: Option<String>,
    /// Whether the order only reduced a position
    pub reduce_only: bool,
    /// Fee paid
    pub fee: f64,
    /// Realized PnL
    pub realized_pnl: f64,
    /// Maker or taker
    pub role: Role,
    /// Fill time
    pub ctime: OffsetDateTime,
}

impl Decode for Trade {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "Trade")?;
        Ok(Self {
            trade_id: f.string("tradeId")?,
            order_id: f.string("orderId")?,
            symbol: f.string("symbol")?,
            qty: f.float("qty")?,
            position_mode: f.token("positionMode")?,
            margin_mode: f.token("marginMode")?,
            leverage: f.u32("leverage")?,
            price: f.float("price")?,
            side: f.token("side")?,
            order_type: f.token("orderType")?,
            effect: f.token_opt("effect")?,
            client_id: f.string_opt("clientId")?,
            reduce_only: f.bool("reduceOnly")?,
            fee: f.float("fee")?,
            realized_pnl: f.float("realizedPNL")?,
            role: f.token("roleType")?,
            ctime: f.timestamp("ctime")?,
        })
    }
}

/// A closed position.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPosition {
    /// Position ID
    pub position_id: String,
    /// Trading pair
    pub symbol: String,
    /// Largest size the position reached
    pub max_qty: f64,
    /// Average entry price
    pub entry_price: f64,
    /// Average close price
    pub close_price: f64,
    /// Liquidated quantity
    pub liq_qty: f64,
    /// Long or short
    pub side: PositionSide,
    /// Position mode
    pub position_mode: PositionMode,
    /// Margin mode
    pub margin_mode: MarginMode,
    /// Leverage
    pub leverage: u32,
    /// Total fees
    pub fee: f64,
    /// Total funding fees
    pub funding: f64,
    /// Realized PnL
    pub realized_pnl: f64,
    /// Liquidation price
    pub liq_price: f64,
    /// Open time
    pub ctime: OffsetDateTime,
    /// Close time
    pub mtime: OffsetDateTime,
}

impl Decode for HistoryPosition {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "HistoryPosition")?;
        Ok(Self {
            position_id: f.string("positionId")?,
            symbol: f.string("symbol")?,
            max_qty: f.float("maxQty")?,
            entry_price: f.float("entryPrice")?,
            close_price: f.float("closePrice")?,
            liq_qty: f.float("liqQty")?,
            side: f.token("side")?,
            position_mode: f.token("positionMode")?,
            margin_mode: f.token("marginMode")?,
            leverage: f.u32("leverage")?,
            fee: f.float("fee")?,
            funding: f.float("funding")?,
            realized_pnl: f.float("realizedPNL")?,
            liq_price: f.float("liqPrice")?,
            ctime: f.timestamp("ctime")?,
            mtime: f.timestamp("mtime")?,
        })
    }
}

/// An open position.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPosition {
    /// Position ID
    pub position_id: String,
    /// Trading pair
    pub symbol: String,
    /// Position size
    pub qty: f64,
    /// Entry value
    pub entry_value: f64,
    /// Long or short
    pub side: PositionSide,
    /// Position mode
    pub position_mode: PositionMode,
    /// Margin mode
    pub margin_mode: MarginMode,
    /// Leverage
    pub leverage: u32,
    /// Fees so far
    pub fee: f64,
    /// Funding fees so far
    pub funding: f64,
    /// Realized PnL
    pub realized_pnl: f64,
    /// Locked margin
    pub margin: f64,
    /// Unrealized PnL
    pub unrealized_pnl: f64,
    /// Estimated liquidation price
    pub liq_price: f64,
    /// Margin rate
    pub margin_rate: f64,
    /// Average open price
    pub avg_open_price: f64,
    /// Open time
    pub ctime: OffsetDateTime,
    /// Last update
    pub mtime: OffsetDateTime,
}

impl Decode for PendingPosition {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "PendingPosition")?;
        Ok(Self {
            position_id: f.string("positionId")?,
            symbol: f.string("symbol")?,
            qty: f.float("qty")?,
            entry_value: f.float("entryValue")?,
            side: f.token("side")?,
            position_mode: f.token("positionMode")?,
            margin_mode: f.token("marginMode")?,
            leverage: f.u32("leverage")?,
            fee: f.float("fee")?,
            funding: f.float("funding")?,
            realized_pnl: f.float("realizedPNL")?,
            margin: f.float("margin")?,
            unrealized_pnl: f.float("unrealizedPNL")?,
            liq_price: f.float("liqPrice")?,
            margin_rate: f.float("marginRate")?,
            avg_open_price: f.float("avgOpenPrice")?,
            ctime: f.timestamp("ctime")?,
            mtime: f.timestamp("mtime")?,
        })
    }
}

/// A take-profit / stop-loss order.
#[derive(Debug, Clone, PartialEq)]
pub struct TpslOrder {
    /// TP/SL order ID
    pub id: String,
    /// Position it protects
    pub position_id: String,
    /// Trading pair
    pub symbol: String,
    /// Base coin
    pub base: String,
    /// Quote coin
    pub quote: String,
    /// Take-profit trigger price
    pub tp_price: Option<f64>,
    /// Take-profit trigger source
    pub tp_stop_type: Option<StopType>,
    /// Stop-loss trigger price
    pub sl_price: Option<f64>,
    /// Stop-loss trigger source
    pub sl_stop_type: Option<StopType>,
    /// Take-profit order type
    pub tp_order_type: Option<OrderType>,
    /// Take-profit limit price
    pub tp_order_price: Option<f64>,
    /// Stop-loss order type
    pub sl_order_type: Option<OrderType>,
    /// Stop-loss limit price
    pub sl_order_price: Option<f64>,
    /// Take-profit quantity
    pub tp_qty: Option<f64>,
    /// Stop-loss quantity
    pub sl_qty: Option<f64>,
    /// Venue status string
    pub status: Option<String>,
    /// Creation time
    pub ctime: Option<OffsetDateTime>,
    /// Trigger time, for historical orders
    pub trigger_time: Option<OffsetDateTime>,
}

impl Decode for TpslOrder {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        let f = Fields::new(value, "TpslOrder")?;
        Ok(Self {
            id: f.string("id")?,
            position_id: f.string("positionId")?,
            symbol: f.string("symbol")?,
            base: f.string("base")?,
            quote: f.string("quote")?,
            tp_price: f.float_opt("tpPrice")?,
            tp_stop_type: f.token_opt("tpStopType")?,
            sl_price: f.float_opt("slPrice")?,
            sl_stop_type: f.token_opt("slStopType")?,
            tp_order_type: f.token_opt("tpOrderType")?,
            tp_order_price: f.float_opt("tpOrderPrice")?,
            sl_order_type: f.token_opt("slOrderType")?,
            sl_order_price: f.float_opt("slOrderPrice")?,
            tp_qty: f.float_opt("tpQty")?,
            sl_qty: f.float_opt("slQty")?,
            status: f.string_opt("status")?,
            ctime: f.timestamp_opt("ctime")?,
            trigger_time: f.timestamp_opt("triggerTime")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decode::timestamp_to_ms;
    use serde_json::json;

    #[test]
    fn test_account_balance() {
        let data = json!({
            "marginCoin": "USDT",
            "available": "1000",
            "frozen": "0",
            "margin": "10",
            "transfer": "1000",
            "positionMode": "HEDGE",
            "crossUnrealizedPNL": "2",
            "isolationUnrealizedPNL": "0",
            "bonus": "0"
        });
        let balance = AccountBalance::decode(&data).unwrap();
        assert_eq!(balance.available, 1000.0);
        assert_eq!(balance.position_mode, PositionMode::Hedge);
        assert_eq!(balance.cross_unrealized_pnl, 2.0);

        let wrapped = AccountBalance::decode(&json!([data])).unwrap();
        assert_eq!(wrapped, balance);
    }

    #[test]
    fn test_account_balance_rejects_unknown_mode() {
        let err = AccountBalance::decode(&json!({"marginCoin": "USDT", "positionMode": "BOTH"})).unwrap_err();
        assert!(matches!(&err, BitunixError::Validation { field, .. } if field == "positionMode"));
    }

    #[test]
    fn test_order() {
        let order = Order::decode(&json!({
            "orderId": "11111",
            "symbol": "BTCUSDT",
            "qty": "1",
            "tradeQty": "0.5",
            "positionMode": "HEDGE",
            "marginMode": "CROSS",
            "leverage": 15,
            "price": "60000",
            "side": "BUY",
            "orderType": "LIMIT",
            "effect": "GTC",
            "clientId": "22222",
            "reduceOnly": false,
            "status": "PART_FILLED",
            "fee": "0.01",
            "realizedPNL": "1.78",
            "tpPrice": "61000",
            "tpStopType": "MARK_PRICE",
            "tpOrderType": "LIMIT",
            "tpOrderPrice": "61000.1",
            "slPrice": "",
            "ctime": 1659076670000_i64,
            "mtime": "1659076680000"
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::PartFilled);
        assert_eq!(order.leverage, 15);
        assert_eq!(order.client_id.as_deref(), Some("22222"));
        assert_eq!(order.tpsl.tp_price, Some(61000.0));
        assert_eq!(order.tpsl.tp_stop_type, Some(StopType::MarkPrice));
        assert_eq!(order.tpsl.sl_price, None);
        assert_eq!(timestamp_to_ms(order.mtime), 1659076680000);
    }

    #[test]
    fn test_trade_role() {
        let trade = Trade::decode(&json!({
            "tradeId": "1",
            "orderId": "2",
            "symbol": "BTCUSDT",
            "qty": "0.5",
            "positionMode": "ONE_WAY",
            "marginMode": "ISOLATION",
            "leverage": "10",
            "price": "60000",
            "side": "SELL",
            "orderType": "MARKET",
            "reduceOnly": "true",
            "fee": "0.3",
            "realizedPNL": "-1",
            "roleType": "MAKER",
            "ctime": "1659076670000"
        }))
        .unwrap();
        assert_eq!(trade.role, Role::Maker);
        assert!(trade.reduce_only);
        assert_eq!(trade.effect, None);
    }

    #[test]
    fn test_history_position_funding_is_its_own_field() {
        let position = HistoryPosition::decode(&json!({
            "positionId": "p1",
            "symbol": "BTCUSDT",
            "maxQty": "2",
            "entryPrice": "60000",
            "closePrice": "61000",
            "liqQty": "0",
            "side": "LONG",
            "positionMode": "HEDGE",
            "marginMode": "CROSS",
            "leverage": 5,
            "fee": "1.5",
            "funding": "-0.25",
            "realizedPNL": "2000",
            "liqPrice": "50000",
            "ctime": "1659076670000",
            "mtime": "1659076680000"
        }))
        .unwrap();
        assert_eq!(position.fee, 1.5);
        assert_eq!(position.funding, -0.25);
        assert_eq!(position.side, PositionSide::Long);
    }

    #[test]
    fn test_tpsl_order_optional_legs() {
        let order = TpslOrder::decode(&json!({
            "id": "t1",
            "positionId": "p1",
            "symbol": "BTCUSDT",
            "base": "BTC",
            "quote": "USDT",
            "slPrice": "55000",
            "slStopType": "LAST_PRICE",
            "slQty": "1",
            "ctime": "1659076670000"
        }))
        .unwrap();
        assert_eq!(order.tp_price, None);
        assert_eq!(order.sl_price, Some(55000.0));
        assert_eq!(order.sl_stop_type, Some(StopType::LastPrice));
        assert!(order.trigger_time.is_none());
    }
}
