//! Error types for the Bitunix client library.
//!
//! Every [`BitunixError`] belongs to exactly one primary [`ErrorKind`].
//! Callers that only care about the category use [`BitunixError::is`]:
//!
//! ```rust
//! use bitunix_api_client::error::{ApiError, BitunixError, ErrorKind};
//!
//! let err = BitunixError::Api(ApiError::new(10006, "Too many requests", "/api/v1/futures/account"));
//! assert!(err.is(ErrorKind::Api));
//! assert!(err.is(ErrorKind::RateLimit));
//! assert!(!err.is(ErrorKind::Network));
//! ```

use std::fmt;

use thiserror::Error;

/// The main error type for all Bitunix client operations.
#[derive(Error, Debug)]
pub enum BitunixError {
    /// The caller supplied an invalid argument, or a response field failed coercion.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// Name of the offending field or argument
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Transport-level failure (DNS, refused connection, aborted stream, random source).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP status >= 400 whose body was not a venue envelope.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The operation exceeded its deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The venue returned a non-zero envelope code.
    #[error("Bitunix API error: {0}")]
    Api(ApiError),

    /// Handshake, frame or login failure during a socket session.
    #[error("WebSocket error: {0}")]
    WebSocket(WebSocketError),

    /// Base URL or WebSocket URL could not be parsed.
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Decoder bug, malformed server reply or broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Primary error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid argument or field.
    Validation,
    /// Transport failure.
    Network,
    /// Deadline exceeded.
    Timeout,
    /// Venue error code.
    Api,
    /// Key or signature rejected.
    Authentication,
    /// Venue rate limit hit; a specialisation of [`ErrorKind::Api`].
    RateLimit,
    /// Socket session failure.
    WebSocket,
    /// Everything that should not happen.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Api => "api",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::WebSocket => "websocket",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl BitunixError {
    /// Build a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BitunixError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a WebSocket error tagged with the failing operation.
    pub fn websocket(operation: WsOperation, message: impl Into<String>) -> Self {
        BitunixError::WebSocket(WebSocketError {
            operation,
            message: message.into(),
        })
    }

    /// The primary kind of this error.
    ///
    /// API errors report [`ErrorKind::RateLimit`] or
    /// [`ErrorKind::Authentication`] when the venue code says so, and
    /// [`ErrorKind::Api`] otherwise.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BitunixError::Validation { .. } | BitunixError::Url(_) => ErrorKind::Validation,
            BitunixError::Network(_) | BitunixError::HttpStatus { .. } => ErrorKind::Network,
            BitunixError::Timeout(_) => ErrorKind::Timeout,
            BitunixError::Api(api) if api.is_rate_limit() => ErrorKind::RateLimit,
            BitunixError::Api(api) if api.is_authentication() => ErrorKind::Authentication,
            BitunixError::Api(_) => ErrorKind::Api,
            BitunixError::WebSocket(_) => ErrorKind::WebSocket,
            BitunixError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error belongs to `kind`.
    ///
    /// Specialised API errors (rate limit, authentication) also answer
    /// `true` for [`ErrorKind::Api`].
    pub fn is(&self, kind: ErrorKind) -> bool {
        let own = self.kind();
        own == kind
            || (kind == ErrorKind::Api
                && matches!(self, BitunixError::Api(_))
                && matches!(own, ErrorKind::RateLimit | ErrorKind::Authentication))
    }

    /// The venue error, if this is an API error.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            BitunixError::Api(api) => Some(api),
            _ => None,
        }
    }

    /// The socket error, if this is a WebSocket error.
    pub fn websocket_error(&self) -> Option<&WebSocketError> {
        match self {
            BitunixError::WebSocket(ws) => Some(ws),
            _ => None,
        }
    }

    /// Classify a transport error from the HTTP stack.
    pub(crate) fn from_http(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Self::from_reqwest(e),
            reqwest_middleware::Error::Middleware(e) => BitunixError::Network(e.to_string()),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BitunixError::Timeout(err.to_string())
        } else {
            BitunixError::Network(err.to_string())
        }
    }
}

/// Error returned by the venue inside a response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Venue error code (never 0)
    pub code: i64,
    /// Human-readable message from `message` or `msg`
    pub message: String,
    /// Endpoint path the error came from
    pub endpoint: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}) at {}", self.message, self.code, self.endpoint)
    }
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: i64, message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self.code,
            error_codes::TOO_MANY_REQUESTS | error_codes::REQUEST_TOO_FREQUENT
        )
    }

    /// Check if the venue rejected the key, IP or signature.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self.code,
            error_codes::API_KEY_EMPTY | error_codes::IP_NOT_WHITELISTED | error_codes::SIGNATURE_ERROR
        )
    }
}

/// Operation tag carried by WebSocket errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WsOperation {
    /// TCP/TLS/upgrade.
    Dial,
    /// Reading the mandatory first frame.
    Welcome,
    /// Sending or confirming the login frame.
    Login,
    /// The read loop.
    Read,
    /// A user-initiated write.
    Write,
    /// The keep-alive sender.
    Heartbeat,
    /// Sending a subscription frame.
    Subscribe,
}

impl WsOperation {
    /// Stable lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            WsOperation::Dial => "dial",
            WsOperation::Welcome => "welcome",
            WsOperation::Login => "login",
            WsOperation::Read => "read",
            WsOperation::Write => "write",
            WsOperation::Heartbeat => "heartbeat",
            WsOperation::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for WsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A WebSocket failure and the operation it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketError {
    /// Which step failed
    pub operation: WsOperation,
    /// Description of the failure
    pub message: String,
}

impl fmt::Display for WebSocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

/// Known Bitunix error codes.
pub mod error_codes {
    /// Network error on the venue side.
    pub const NETWORK_ERROR: i64 = 10001;
    /// Parameter error.
    pub const PARAMETER_ERROR: i64 = 10002;
    /// API key missing or unauthorized.
    pub const API_KEY_EMPTY: i64 = 10003;
    /// Caller IP is not on the key's whitelist.
    pub const IP_NOT_WHITELISTED: i64 = 10004;
    /// Too many requests.
    pub const TOO_MANY_REQUESTS: i64 = 10005;
    /// Request too frequent.
    pub const REQUEST_TOO_FREQUENT: i64 = 10006;
    /// Signature mismatch.
    pub const SIGNATURE_ERROR: i64 = 10007;
    /// Market does not exist.
    pub const MARKET_NOT_EXISTS: i64 = 20001;
    /// Insufficient balance.
    pub const INSUFFICIENT_BALANCE: i64 = 20003;
    /// Order not found.
    pub const ORDER_NOT_FOUND: i64 = 20007;
}
