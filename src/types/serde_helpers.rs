//! Serde helpers for Bitunix's string-encoded decimals in request bodies.
//!
//! Request bodies carry decimals as strings (`"qty": "0.5"`) so that no
//! precision is lost in transit. These helpers format `f64` values with the
//! shortest decimal representation that parses back to the same value.
//! Responses are read through [`Fields`](crate::types::Fields), not serde.

use serde::Serializer;

/// Shortest decimal string that round-trips to `value`.
///
/// ```rust
/// use bitunix_api_client::types::serde_helpers::format_float;
///
/// assert_eq!(format_float(0.1), "0.1");
/// assert_eq!(format_float(50000.0), "50000");
/// assert_eq!(format_float(0.00000123), "0.00000123");
/// ```
pub fn format_float(value: f64) -> String {
    value.to_string()
}

/// Serialize an `f64` as a decimal string.
///
/// # Example
///
/// ```rust
/// use serde::Serialize;
/// use bitunix_api_client::types::serde_helpers::float_string;
///
/// #[derive(Serialize)]
/// struct Order {
///     #[serde(with = "float_string")]
///     qty: f64,
/// }
///
/// let json = serde_json::to_string(&Order { qty: 0.5 }).unwrap();
/// assert_eq!(json, r#"{"qty":"0.5"}"#);
/// ```
pub mod float_string {
    use super::*;

    /// Serialize as the shortest round-tripping decimal string.
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_float(*value))
    }
}

/// Optional variant of [`float_string`]; pair with `skip_serializing_none`.
pub mod opt_float_string {
    use super::*;

    /// Serialize `Some` as a decimal string and `None` as null.
    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format_float(*v)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decode::parse_float;
    use serde::Serialize;

    #[derive(Serialize, Debug, PartialEq)]
    struct Prices {
        #[serde(with = "float_string")]
        price: f64,
        #[serde(with = "opt_float_string", skip_serializing_if = "Option::is_none")]
        trigger: Option<f64>,
    }

    #[test]
    fn test_float_string_parses_back_exactly() {
        for value in [0.1, 1.0 / 3.0, 50000.0, 1e-9, 123456789.123456789, f64::MAX] {
            let json: serde_json::Value =
                serde_json::to_value(Prices { price: value, trigger: None }).unwrap();
            let text = json["price"].as_str().unwrap();
            assert_eq!(parse_float(text).unwrap().to_bits(), value.to_bits(), "{text}");
        }
    }

    #[test]
    fn test_opt_float_skips_none() {
        let json = serde_json::to_string(&Prices { price: 1.5, trigger: None }).unwrap();
        assert_eq!(json, r#"{"price":"1.5"}"#);
        let json = serde_json::to_string(&Prices { price: 1.5, trigger: Some(2.0) }).unwrap();
        assert_eq!(json, r#"{"price":"1.5","trigger":"2"}"#);
    }
}
