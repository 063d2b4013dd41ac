//! # Bitunix Client
//!
//! An async Rust client library for the Bitunix futures REST and WebSocket APIs.
//!
//! ## Features
//!
//! - Signed REST calls for account, orders, trades, positions and TP/SL orders
//! - Private and public WebSocket streams with reconnect and subscription replay
//! - Closed enums and checked decoding of the venue's string-typed numbers
//! - One error type with stable kinds for retry and alerting decisions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bitunix_api_client::auth::StaticCredentials;
//! use bitunix_api_client::futures::rest::{PendingPositionsRequest, RestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestClient::builder()
//!         .credentials(Arc::new(StaticCredentials::new("api-key", "api-secret")))
//!         .build()?;
//!     let positions = client
//!         .get_pending_positions(&PendingPositionsRequest::default())
//!         .await?;
//!     println!("{} open positions", positions.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod futures;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{BitunixError, ErrorKind};
pub use types::common::{OrderStatus, OrderType, Side};

/// Result type alias using BitunixError
pub type Result<T> = std::result::Result<T, BitunixError>;
