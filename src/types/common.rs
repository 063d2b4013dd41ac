//! Common domain types for Bitunix API.
//!
//! The venue encodes enumerations as uppercase tokens. Every enum here has a
//! closed token set: parsing an unknown token fails, and none of them has a
//! default value, so a value of these types has always been validated.

use std::fmt;

/// Error returned when a token is not one of an enum's known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// The rejected token
    pub token: String,
}

impl fmt::Display for UnknownToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} token `{}`", self.kind, self.token)
    }
}

impl std::error::Error for UnknownToken {}

/// Define an enum backed by a closed set of wire tokens.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $token:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire token for this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::types::common::UnknownToken;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err($crate::types::common::UnknownToken {
                        kind: stringify!($name),
                        token: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    /// Price a conditional order triggers on.
    StopType {
        /// Last traded price
        LastPrice => "LAST_PRICE",
        /// Mark price
        MarkPrice => "MARK_PRICE",
    }
}

string_enum! {
    /// Order type.
    OrderType {
        /// Limit order
        Limit => "LIMIT",
        /// Market order
        Market => "MARKET",
    }
}

string_enum! {
    /// Time in force, called `effect` on the wire.
    TimeInForce {
        /// Immediate or cancel
        Ioc => "IOC",
        /// Fill or kill
        Fok => "FOK",
        /// Good till canceled
        Gtc => "GTC",
        /// Maker only
        PostOnly => "POST_ONLY",
    }
}

string_enum! {
    /// Trade action.
    Side {
        /// Buy
        Buy => "BUY",
        /// Sell
        Sell => "SELL",
    }
}

string_enum! {
    /// Whether an order opens or closes a position.
    TradeSide {
        /// Open or increase a position
        Open => "OPEN",
        /// Close or reduce a position
        Close => "CLOSE",
    }
}

string_enum! {
    /// Margin mode of a position.
    MarginMode {
        /// Isolated margin
        Isolation => "ISOLATION",
        /// Cross margin
        Cross => "CROSS",
    }
}

string_enum! {
    /// Account-level position accounting.
    PositionMode {
        /// One position per symbol
        OneWay => "ONE_WAY",
        /// Separate long and short positions
        Hedge => "HEDGE",
    }
}

string_enum! {
    /// Direction of a position.
    PositionSide {
        /// Long
        Long => "LONG",
        /// Short
        Short => "SHORT",
    }
}

string_enum! {
    /// Liquidity role of a fill.
    Role {
        /// Removed liquidity
        Taker => "TAKER",
        /// Provided liquidity
        Maker => "MAKER",
    }
}

string_enum! {
    /// Lifecycle status of an order.
    OrderStatus {
        /// Accepted, not yet on the book
        Init => "INIT",
        /// Resting on the book
        New => "NEW",
        /// Partially filled
        PartFilled => "PART_FILLED",
        /// Canceled by the user
        Canceled => "CANCELED",
        /// Canceled by the venue
        SystemCanceled => "SYSTEM_CANCELED",
        /// Expired
        Expired => "EXPIRED",
        /// Completely filled
        Filled => "FILLED",
    }
}

impl OrderStatus {
    /// Whether no further fills can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled
                | OrderStatus::SystemCanceled
                | OrderStatus::Expired
                | OrderStatus::Filled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn assert_closed<T>(all: &[T], bogus: &[&str])
    where
        T: FromStr<Err = UnknownToken> + fmt::Display + PartialEq + fmt::Debug + Copy,
    {
        for variant in all {
            let token = variant.to_string();
            assert_eq!(T::from_str(&token).unwrap(), *variant);
        }
        for token in bogus {
            assert!(T::from_str(token).is_err(), "`{token}` must be rejected");
        }
    }

    #[test]
    fn test_every_enum_is_closed() {
        let bogus = ["", "limit", "UNKNOWN", " LIMIT"];
        assert_closed(StopType::ALL, &bogus);
        assert_closed(OrderType::ALL, &bogus);
        assert_closed(TimeInForce::ALL, &bogus);
        assert_closed(Side::ALL, &bogus);
        assert_closed(TradeSide::ALL, &bogus);
        assert_closed(MarginMode::ALL, &bogus);
        assert_closed(PositionMode::ALL, &bogus);
        assert_closed(PositionSide::ALL, &bogus);
        assert_closed(Role::ALL, &bogus);
        assert_closed(OrderStatus::ALL, &bogus);
    }

    #[test]
    fn test_tokens() {
        assert_eq!(TimeInForce::PostOnly.as_str(), "POST_ONLY");
        assert_eq!(OrderStatus::SystemCanceled.as_str(), "SYSTEM_CANCELED");
        assert_eq!(PositionMode::OneWay.to_string(), "ONE_WAY");
        assert_eq!(OrderStatus::ALL.len(), 7);
    }

    #[test]
    fn test_unknown_token_message() {
        let err = PositionMode::from_str("BOTH").unwrap_err();
        assert_eq!(err.kind, "PositionMode");
        assert_eq!(err.to_string(), "unknown PositionMode token `BOTH`");
    }

    #[test]
    fn test_serde_uses_tokens() {
        let json = serde_json::to_string(&StopType::MarkPrice).unwrap();
        assert_eq!(json, r#""MARK_PRICE""#);
        let side: Side = serde_json::from_str(r#""SELL""#).unwrap();
        assert_eq!(side, Side::Sell);
        assert!(serde_json::from_str::<Side>(r#""sell""#).is_err());
    }

    #[test]
    fn test_terminal_status() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(!OrderStatus::PartFilled.is_terminal());
    }
}
