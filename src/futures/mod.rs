//! Bitunix futures API client.
//!
//! - [`rest`]: signed REST calls for account, orders, trades, positions and
//!   TP/SL orders.
//! - [`ws`]: private and public WebSocket streams with reconnect.
//! - [`types`]: entities shared by both.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bitunix_api_client::auth::StaticCredentials;
//! use bitunix_api_client::futures::rest::RestClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RestClient::builder()
//!         .credentials(Arc::new(StaticCredentials::new("api-key", "api-secret")))
//!         .build()?;
//!     let account = client.get_account("USDT").await?;
//!     println!("available: {}", account.available);
//!     Ok(())
//! }
//! ```
//!
//! ## Authentication
//!
//! Every REST request carries `api-key`, `nonce`, `timestamp` and `sign`
//! headers:
//!
//! ```text
//! digest = sha256_hex(nonce_b64 + timestamp_ms + api_key + sorted_query_without_separators + body)
//! sign   = sha256_hex(digest + secret)
//! ```
//!
//! ## API Documentation
//!
//! - <https://openapidoc.bitunix.com/doc/common/introduction.html>

pub mod rest;
pub mod types;
pub mod ws;

pub use rest::RestClient;
pub use types::*;
pub use ws::{PrivateWsClient, PublicWsClient};
