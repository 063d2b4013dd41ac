//! Field-by-field decoding of venue payloads.
//!
//! Bitunix sends numbers as decimal strings, timestamps as millisecond
//! strings and enums as tokens, but occasionally switches a field to a bare
//! JSON number. [`Fields`] accepts either form and reports every coercion
//! failure as a [`BitunixError::Validation`] naming the offending field.
//!
//! Absent, `null` and `""` values decode to zero (`0.0`, the UNIX epoch) for
//! required numeric fields and to `None` for optional ones.

use std::str::FromStr;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::BitunixError;
use crate::types::common::UnknownToken;

/// A type that can be built from a decoded JSON payload.
pub trait Decode: Sized {
    /// Decode `value`, reporting the first field that fails.
    fn decode(value: &Value) -> Result<Self, BitunixError>;
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &Value) -> Result<Self, BitunixError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.iter().map(T::decode).collect(),
            other => Err(BitunixError::validation(
                "data",
                format!("expected a list, got {}", type_name(other)),
            )),
        }
    }
}

/// Read-only view over the fields of one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    context: &'static str,
}

impl<'a> Fields<'a> {
    /// Wrap `value`, which must be a JSON object.
    ///
    /// `context` names the entity in error messages.
    pub fn new(value: &'a Value, context: &'static str) -> Result<Self, BitunixError> {
        match value {
            Value::Object(map) => Ok(Self { map, context }),
            other => Err(BitunixError::validation(
                context,
                format!("expected an object, got {}", type_name(other)),
            )),
        }
    }

    /// The raw value, treating `null` as absent.
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    fn error(&self, name: &str, message: impl std::fmt::Display) -> BitunixError {
        BitunixError::validation(name, format!("{}: {}", self.context, message))
    }

    /// String scalar; numbers are rendered in decimal. Absent is `""`.
    pub fn string(&self, name: &str) -> Result<String, BitunixError> {
        match self.raw(name) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(self.error(name, format!("expected a string, got {}", type_name(other)))),
        }
    }

    /// String scalar where absent and `""` are `None`.
    pub fn string_opt(&self, name: &str) -> Result<Option<String>, BitunixError> {
        let s = self.string(name)?;
        Ok((!s.is_empty()).then_some(s))
    }

    /// Decimal number. Absent and `""` decode to `0.0`.
    pub fn float(&self, name: &str) -> Result<f64, BitunixError> {
        Ok(self.float_opt(name)?.unwrap_or(0.0))
    }

    /// Decimal number where absent and `""` are `None`.
    pub fn float_opt(&self, name: &str) -> Result<Option<f64>, BitunixError> {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => parse_float(s).map(Some).map_err(|e| self.error(name, e)),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.error(name, format!("`{n}` is not representable"))),
            Some(other) => Err(self.error(name, format!("expected a number, got {}", type_name(other)))),
        }
    }

    /// Integer that must fit in a `u32`, such as leverage. Absent is `0`.
    pub fn u32(&self, name: &str) -> Result<u32, BitunixError> {
        let value = match self.raw(name) {
            None => return Ok(0),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(0),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| self.error(name, format!("`{s}` is not an integer")))?,
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| self.error(name, format!("`{n}` is not a non-negative integer")))?,
            Some(other) => {
                return Err(self.error(name, format!("expected an integer, got {}", type_name(other))));
            }
        };
        u32::try_from(value).map_err(|_| self.error(name, format!("`{value}` is out of range")))
    }

    /// Integer count such as a page total. Absent is `0`.
    pub fn count(&self, name: &str) -> Result<u64, BitunixError> {
        match self.raw(name) {
            None => Ok(0),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.error(name, format!("`{s}` is not an integer"))),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| self.error(name, format!("`{n}` is not a non-negative integer"))),
            Some(other) => Err(self.error(name, format!("expected an integer, got {}", type_name(other)))),
        }
    }

    /// Boolean, accepted as JSON `true`/`false` or the strings `"true"`/`"false"`.
    /// Absent is `false`.
    pub fn bool(&self, name: &str) -> Result<bool, BitunixError> {
        match self.raw(name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                other => Err(self.error(name, format!("`{other}` is not a boolean"))),
            },
            Some(other) => Err(self.error(name, format!("expected a boolean, got {}", type_name(other)))),
        }
    }

    /// Millisecond timestamp. Absent and `""` decode to the UNIX epoch.
    pub fn timestamp(&self, name: &str) -> Result<OffsetDateTime, BitunixError> {
        Ok(self.timestamp_opt(name)?.unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }

    /// Millisecond timestamp where absent and `""` are `None`.
    pub fn timestamp_opt(&self, name: &str) -> Result<Option<OffsetDateTime>, BitunixError> {
        let ms = match self.raw(name) {
            None => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| self.error(name, format!("`{s}` is not a millisecond timestamp")))?,
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| self.error(name, format!("`{n}` is not a millisecond timestamp")))?,
            Some(other) => {
                return Err(self.error(name, format!("expected a timestamp, got {}", type_name(other))));
            }
        };
        timestamp_from_ms(ms).map(Some).map_err(|e| self.error(name, e))
    }

    /// Required enum token.
    pub fn token<T>(&self, name: &str) -> Result<T, BitunixError>
    where
        T: FromStr<Err = UnknownToken>,
    {
        self.token_opt(name)?
            .ok_or_else(|| self.error(name, "missing required value"))
    }

    /// Optional enum token; absent and `""` are `None`, anything else must be known.
    pub fn token_opt<T>(&self, name: &str) -> Result<Option<T>, BitunixError>
    where
        T: FromStr<Err = UnknownToken>,
    {
        match self.raw(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => s.parse().map(Some).map_err(|e| self.error(name, e)),
            Some(other) => Err(self.error(name, format!("expected a token, got {}", type_name(other)))),
        }
    }

    /// Nested list of entities. Absent is empty.
    pub fn list<T: Decode>(&self, name: &str) -> Result<Vec<T>, BitunixError> {
        match self.raw(name) {
            None => Ok(Vec::new()),
            Some(value) if value.is_array() => Vec::<T>::decode(value),
            Some(other) => Err(self.error(name, format!("expected a list, got {}", type_name(other)))),
        }
    }
}

/// Parse a finite decimal number.
pub(crate) fn parse_float(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("`{s}` is not a decimal number")),
    }
}

/// Convert UNIX milliseconds to a UTC instant.
pub(crate) fn timestamp_from_ms(ms: i64) -> Result<OffsetDateTime, String> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| format!("`{ms}` is out of range: {e}"))
}

/// UNIX milliseconds of a UTC instant.
#[cfg(test)]
pub(crate) fn timestamp_to_ms(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
