//! Futures REST API client.
//!
//! [`RestClient`] signs and sends requests, [`decode_envelope`] turns the
//! venue's `{code, msg, data}` wrapper into typed results, and the
//! endpoint methods (`get_account`, `place_order`, ...) combine the two.

mod client;
mod endpoints;
mod methods;
mod query;
mod types;

pub use client::{DEFAULT_TIMEOUT, RestClient, RestClientBuilder, decode_envelope, with_deadline};
pub use endpoints::*;
pub use query::Query;
pub use types::*;
