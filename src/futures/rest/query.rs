//! Query string construction.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BitunixError;

/// Ordered query parameters.
///
/// Keys are kept sorted, so the encoded form is deterministic and is exactly
/// the string that gets signed and sent.
///
/// ```rust
/// use bitunix_api_client::futures::rest::Query;
///
/// let query = Query::new().with("symbol", "BTCUSDT").with("limit", 10);
/// assert_eq!(query.encode(), "limit=10&symbol=BTCUSDT");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, String>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from a serializable parameter struct.
    ///
    /// `None` fields should be skipped by the struct's serde attributes.
    pub fn from_params<P: Serialize + ?Sized>(params: &P) -> Result<Self, BitunixError> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| BitunixError::Internal(format!("failed to encode query: {e}")))?;
        let params = url::form_urlencoded::parse(encoded.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self { params })
    }

    /// Add or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Add a parameter only when `value` is present.
    pub fn insert_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Builder-style [`Query::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Whether the query has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Percent-encode as `k=v&k=v` in key order.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_sorted() {
        let mut query = Query::new();
        query.insert("symbol", "BTCUSDT").insert("marginCoin", "USDT").insert("limit", 5);
        assert_eq!(query.encode(), "limit=5&marginCoin=USDT&symbol=BTCUSDT");
    }

    #[test]
    fn test_insert_opt_skips_none() {
        let mut query = Query::new();
        query.insert_opt("orderId", None::<&str>).insert_opt("skip", Some(20));
        assert_eq!(query.encode(), "skip=20");
        assert_eq!(query.get("orderId"), None);
    }

    #[test]
    fn test_empty_encodes_to_empty_string() {
        assert!(Query::new().is_empty());
        assert_eq!(Query::new().encode(), "");
    }

    #[test]
    fn test_values_are_escaped() {
        let query = Query::new().with("clientId", "a b&c=d");
        assert_eq!(query.encode(), "clientId=a+b%26c%3Dd");
    }

    #[test]
    fn test_from_params() {
        #[serde_with::skip_serializing_none]
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Params {
            symbol: Option<String>,
            order_id: Option<String>,
            limit: Option<u32>,
        }

        let query = Query::from_params(&Params {
            symbol: Some("ETHUSDT".into()),
            order_id: None,
            limit: Some(50),
        })
        .unwrap();
        assert_eq!(query.encode(), "limit=50&symbol=ETHUSDT");
    }
}
