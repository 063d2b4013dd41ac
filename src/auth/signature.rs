//! Request signing for Bitunix authenticated endpoints.
//!
//! HTTP requests carry a double SHA-256 signature:
//! ```text
//! digest = SHA256_HEX(base64(nonce) + timestamp_ms + api_key + query' + body)
//! sign   = SHA256_HEX(digest + api_secret)
//! ```
//! where `query'` is the raw query string with every `&` and `=` removed.
//!
//! The WebSocket login uses a different composition:
//! ```text
//! sign = SHA256_HEX(SHA256_HEX(hex(nonce) + timestamp_secs + api_key) + api_secret)
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::auth::nonce::{Clock, NONCE_LEN, OsRandom, RandomSource, SystemClock};
use crate::auth::CredentialsProvider;
use crate::error::BitunixError;

/// Lowercase hexadecimal SHA-256 digest of the UTF-8 bytes of `s`.
pub fn sha256_hex(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// The authentication values attached to a signed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTriple {
    /// Hex signature for the `sign` header
    pub sign: String,
    /// Decimal millisecond timestamp for the `timestamp` header
    pub timestamp: String,
    /// Base64 nonce for the `nonce` header
    pub nonce: String,
}

/// Sign an HTTP request.
///
/// `query` must be exactly the query string sent on the wire (possibly empty)
/// and `body` exactly the body bytes (empty for GET).
///
/// # Example
///
/// ```rust
/// use bitunix_api_client::auth::sign_request;
///
/// let auth = sign_request("key", "secret", "marginCoin=USDT", "", 1744918230067, &[0u8; 32]);
/// assert_eq!(auth.timestamp, "1744918230067");
/// assert_eq!(auth.sign.len(), 64);
/// ```
pub fn sign_request(
    api_key: &str,
    api_secret: &str,
    query: &str,
    body: &str,
    timestamp_ms: u64,
    nonce_bytes: &[u8],
) -> AuthTriple {
    let timestamp = timestamp_ms.to_string();
    let nonce = BASE64.encode(nonce_bytes);
    let stripped = strip_query(query);

    let digest = sha256_hex(&format!("{nonce}{timestamp}{api_key}{stripped}{body}"));
    let sign = sha256_hex(&format!("{digest}{api_secret}"));

    AuthTriple {
        sign,
        timestamp,
        nonce,
    }
}

/// Remove `&` and `=` from a raw query string, keeping every other character in place.
fn strip_query(query: &str) -> String {
    query.chars().filter(|c| *c != '&' && *c != '=').collect()
}

/// Arguments of the WebSocket `login` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    /// API key
    pub api_key: String,
    /// Seconds since the UNIX epoch
    pub timestamp: u64,
    /// Lowercase hex of the raw nonce bytes
    pub nonce: String,
    /// Hex signature
    pub sign: String,
}

/// Sign a WebSocket login.
pub fn sign_ws_login(
    api_key: &str,
    api_secret: &str,
    timestamp_secs: u64,
    nonce_bytes: &[u8],
) -> LoginParams {
    let nonce = hex::encode(nonce_bytes);
    let pre = format!("{nonce}{timestamp_secs}{api_key}");
    let sign = sha256_hex(&format!("{}{}", sha256_hex(&pre), api_secret));

    LoginParams {
        api_key: api_key.to_string(),
        timestamp: timestamp_secs,
        nonce,
        sign,
    }
}

/// Headers produced by a [`RequestSigner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value of the `api-key` header
    pub api_key: String,
    /// Signature, timestamp and nonce
    pub auth: AuthTriple,
}

/// Something that can authenticate an outgoing HTTP request.
///
/// The REST client calls this once per request with the encoded query and
/// the serialized body. A client built without a signer sends requests unsigned.
pub trait RequestSigner: Send + Sync {
    /// Produce authentication headers for the given request material.
    fn sign(&self, query: &str, body: &str) -> Result<SignedHeaders, BitunixError>;
}

/// Default signer combining credentials with a clock and a random source.
#[derive(Clone)]
pub struct Signer {
    credentials: Arc<dyn CredentialsProvider>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl Signer {
    /// Create a signer that uses the system clock and the OS random source.
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            credentials,
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the random source.
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// The API key this signer authenticates with.
    pub fn api_key(&self) -> String {
        self.credentials.credentials().api_key().to_string()
    }

    /// Build login arguments for a private WebSocket session.
    pub fn login_params(&self) -> Result<LoginParams, BitunixError> {
        let creds = self.credentials.credentials();
        let nonce_bytes = self.random.random_bytes(NONCE_LEN)?;
        Ok(sign_ws_login(
            creds.api_key(),
            creds.expose_secret(),
            self.clock.now_secs(),
            &nonce_bytes,
        ))
    }
}

impl RequestSigner for Signer {
    fn sign(&self, query: &str, body: &str) -> Result<SignedHeaders, BitunixError> {
        let creds = self.credentials.credentials();
        let nonce_bytes = self.random.random_bytes(NONCE_LEN)?;
        let auth = sign_request(
            creds.api_key(),
            creds.expose_secret(),
            query,
            body,
            self.clock.now_ms(),
            &nonce_bytes,
        );
        Ok(SignedHeaders {
            api_key: creds.api_key().to_string(),
            auth,
        })
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("api_key", &self.api_key())
            .finish_non_exhaustive()
    }
}
