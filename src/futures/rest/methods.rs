//! Private REST API endpoints (signed).
//!
//! Each method validates its arguments locally before anything is sent, so
//! a validation error never costs a round trip.

use crate::error::BitunixError;
use crate::futures::rest::RestClient;
use crate::futures::rest::endpoints::private;
use crate::futures::rest::query::Query;
use crate::futures::rest::types::*;
use crate::futures::types::{AccountBalance, PendingPosition, TpslOrder};

impl RestClient {
    // Account.

    /// Get the futures account balance for a margin coin.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bitunix_api_client::auth::StaticCredentials;
    /// use bitunix_api_client::futures::rest::RestClient;
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let credentials = Arc::new(StaticCredentials::new("key", "secret"));
    ///     let client = RestClient::builder().credentials(credentials).build()?;
    ///
    ///     let balance = client.get_account("USDT").await?;
    ///     println!("{} available, {} frozen", balance.available, balance.frozen);
    ///     Ok(())
    /// }
    /// ```
    pub async fn get_account(&self, margin_coin: &str) -> Result<AccountBalance, BitunixError> {
        if margin_coin.trim().is_empty() {
            return Err(BitunixError::validation("marginCoin", "must not be empty"));
        }
        let query = Query::new().with("marginCoin", margin_coin);
        self.private_get(private::ACCOUNT, &query).await
    }

    // Trading.

    /// Place an order.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<OrderAck, BitunixError> {
        request.validate()?;
        self.private_post(private::PLACE_ORDER, request).await
    }

    /// Cancel one or more orders on a symbol.
    ///
    /// Partial failures are reported in [`CancelOrdersResult::failure_list`]
    /// rather than as an error.
    pub async fn cancel_orders(
        &self,
        request: &CancelOrdersRequest,
    ) -> Result<CancelOrdersResult, BitunixError> {
        request.validate()?;
        self.private_post(private::CANCEL_ORDERS, request).await
    }

    /// Get historical orders.
    pub async fn get_history_orders(
        &self,
        request: &HistoryOrdersRequest,
    ) -> Result<OrderPage, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::HISTORY_ORDERS, &query).await
    }

    /// Get open orders.
    pub async fn get_pending_orders(
        &self,
        request: &PendingOrdersRequest,
    ) -> Result<OrderPage, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::PENDING_ORDERS, &query).await
    }

    /// Get historical fills.
    pub async fn get_history_trades(
        &self,
        request: &HistoryTradesRequest,
    ) -> Result<TradePage, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::HISTORY_TRADES, &query).await
    }

    // Positions.

    /// Get closed positions.
    pub async fn get_history_positions(
        &self,
        request: &HistoryPositionsRequest,
    ) -> Result<HistoryPositionPage, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::HISTORY_POSITIONS, &query).await
    }

    /// Get open positions, optionally narrowed to a symbol or position.
    pub async fn get_pending_positions(
        &self,
        request: &PendingPositionsRequest,
    ) -> Result<Vec<PendingPosition>, BitunixError> {
        let query = Query::from_params(request)?;
        self.private_get(private::PENDING_POSITIONS, &query).await
    }

    // TP/SL.

    /// Place a take-profit / stop-loss order on a position.
    pub async fn place_tpsl_order(&self, request: &PlaceTpslRequest) -> Result<TpslAck, BitunixError> {
        request.validate()?;
        self.private_post(private::PLACE_TPSL_ORDER, request).await
    }

    /// Get open TP/SL orders.
    pub async fn get_pending_tpsl_orders(
        &self,
        request: &PendingTpslRequest,
    ) -> Result<Vec<TpslOrder>, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::PENDING_TPSL_ORDERS, &query).await
    }

    /// Get historical TP/SL orders.
    pub async fn get_history_tpsl_orders(
        &self,
        request: &HistoryTpslRequest,
    ) -> Result<TpslPage, BitunixError> {
        check_limit(request.limit)?;
        let query = Query::from_params(request)?;
        self.private_get(private::HISTORY_TPSL_ORDERS, &query).await
    }
}
