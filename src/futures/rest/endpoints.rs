//! Futures REST API endpoint constants.

/// Base URL for the Bitunix futures production API.
pub const FUTURES_BASE_URL: &str = "https://fapi.bitunix.com";

/// Private endpoints (signed).
pub mod private {
    /// Get account balance for a margin coin.
    pub const ACCOUNT: &str = "/api/v1/futures/account";

    /// Place an order.
    pub const PLACE_ORDER: &str = "/api/v1/futures/trade/place_order";

    /// Cancel one or more orders.
    pub const CANCEL_ORDERS: &str = "/api/v1/futures/trade/cancel_orders";

    /// Historical orders.
    pub const HISTORY_ORDERS: &str = "/api/v1/futures/trade/get_history_orders";

    /// Open orders.
    pub const PENDING_ORDERS: &str = "/api/v1/futures/trade/get_pending_orders";

    /// Historical fills.
    pub const HISTORY_TRADES: &str = "/api/v1/futures/trade/get_history_trades";

    /// Closed positions.
    pub const HISTORY_POSITIONS: &str = "/api/v1/futures/position/get_history_positions";

    /// Open positions.
    pub const PENDING_POSITIONS: &str = "/api/v1/futures/position/get_pending_positions";

    /// Place a take-profit / stop-loss order.
    pub const PLACE_TPSL_ORDER: &str = "/api/v1/futures/tpsl/place_order";

    /// Open take-profit / stop-loss orders.
    pub const PENDING_TPSL_ORDERS: &str = "/api/v1/futures/tpsl/get_pending_orders";

    /// Historical take-profit / stop-loss orders.
    pub const HISTORY_TPSL_ORDERS: &str = "/api/v1/futures/tpsl/get_history_orders";
}
