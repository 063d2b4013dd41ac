//! Bitunix futures REST API client implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::auth::{Clock, CredentialsProvider, RandomSource, RequestSigner, Signer};
use crate::error::{ApiError, BitunixError};
use crate::futures::rest::endpoints::FUTURES_BASE_URL;
use crate::futures::rest::query::Query;
use crate::types::Decode;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The Bitunix futures REST API client.
///
/// Every request is signed with the configured [`RequestSigner`]; a client
/// built with [`RestClientBuilder::unsigned`] sends bare requests, which is
/// only useful against a stub server.
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
///     let credentials = Arc::new(StaticCredentials::new("api_key", "api_secret"));
///     let client = RestClient::builder().credentials(credentials).build()?;
///
///     let balance = client.get_account("USDT").await?;
///     println!("available: {}", balance.available);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RestClient {
    http_client: ClientWithMiddleware,
    base_url: Url,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl RestClient {
    /// Create a new client builder.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request and return the raw response body.
    ///
    /// The query is encoded once and the body serialized once; those exact
    /// strings are both signed and sent. A status of 400 or above yields an
    /// error: [`BitunixError::Api`] when the body is a venue envelope with a
    /// non-zero code, [`BitunixError::HttpStatus`] otherwise.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&B>,
    ) -> Result<Vec<u8>, BitunixError>
    where
        B: Serialize + ?Sized,
    {
        let encoded_query = query.encode();
        let body = match body {
            Some(body) => serde_json::to_string(body)
                .map_err(|e| BitunixError::Internal(format!("failed to encode body: {e}")))?,
            None => String::new(),
        };

        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query((!encoded_query.is_empty()).then_some(encoded_query.as_str()));

        let mut builder = self
            .http_client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header("language", "en-US");

        if let Some(signer) = &self.signer {
            let signed = signer.sign(&encoded_query, &body)?;
            builder = builder
                .header("api-key", signed.api_key)
                .header("sign", signed.auth.sign)
                .header("timestamp", signed.auth.timestamp)
                .header("nonce", signed.auth.nonce);
        }

        if !body.is_empty() {
            builder = builder.body(body);
        }

        debug!(%method, path, "sending request");
        let response = builder.send().await.map_err(BitunixError::from_http)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(BitunixError::from_reqwest)?;

        if status.as_u16() >= 400 {
            if let Ok(envelope) = serde_json::from_slice::<Envelope>(&bytes) {
                if envelope.code != 0 {
                    return Err(BitunixError::Api(envelope.into_api_error(path)));
                }
            }
            warn!(status = status.as_u16(), path, "request failed");
            return Err(BitunixError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }

    /// Send an unbodied GET.
    pub async fn get(&self, path: &str, query: &Query) -> Result<Vec<u8>, BitunixError> {
        self.request::<()>(Method::GET, path, query, None).await
    }

    /// Send a POST with a JSON body; `query` is signed along with it.
    pub async fn post<B>(&self, path: &str, query: &Query, body: &B) -> Result<Vec<u8>, BitunixError>
    where
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, query, Some(body)).await
    }

    /// GET `path` and decode the envelope payload.
    pub(crate) async fn private_get<T: Decode>(&self, path: &str, query: &Query) -> Result<T, BitunixError> {
        let body = self.get(path, query).await?;
        decode_envelope(&body, path)
    }

    /// POST `body` to `path` and decode the envelope payload.
    pub(crate) async fn private_post<T, B>(&self, path: &str, body: &B) -> Result<T, BitunixError>
    where
        T: Decode,
        B: Serialize + ?Sized,
    {
        let bytes = self.post(path, &Query::new(), body).await?;
        decode_envelope(&bytes, path)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

/// Run `future` under a caller deadline.
///
/// Expiry drops the in-flight request and reports [`BitunixError::Timeout`].
///
/// ```rust,no_run
/// use std::time::Duration;
/// use bitunix_api_client::futures::rest::{RestClient, with_deadline};
///
/// # async fn run(client: RestClient) -> Result<(), bitunix_api_client::BitunixError> {
/// let orders = with_deadline(Duration::from_secs(2), client.get_pending_orders(&Default::default())).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_deadline<T, F>(deadline: Duration, future: F) -> Result<T, BitunixError>
where
    F: Future<Output = Result<T, BitunixError>>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| BitunixError::Timeout(format!("deadline of {deadline:?} exceeded")))?
}

/// The `{code, msg, data}` wrapper around every response.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

impl Envelope {
    fn into_api_error(self, endpoint: &str) -> ApiError {
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .or(self.msg)
            .unwrap_or_default();
        ApiError::new(self.code, message, endpoint)
    }
}

/// Decode a response body into its typed payload.
///
/// A non-zero `code` becomes [`BitunixError::Api`], malformed JSON becomes
/// [`BitunixError::Internal`], and a payload field that fails coercion
/// becomes [`BitunixError::Validation`] naming the field.
pub fn decode_envelope<T: Decode>(body: &[u8], endpoint: &str) -> Result<T, BitunixError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        BitunixError::Internal(format!(
            "malformed response from {endpoint}: {e}. Body: {}",
            String::from_utf8_lossy(body)
        ))
    })?;

    if envelope.code != 0 {
        return Err(BitunixError::Api(envelope.into_api_error(endpoint)));
    }

    T::decode(&envelope.data)
}

/// Builder for [`RestClient`].
pub struct RestClientBuilder {
    base_url: String,
    timeout: Duration,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    signer: Option<Arc<dyn RequestSigner>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
    user_agent: Option<String>,
}

impl RestClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: FUTURES_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
            signer: None,
            clock: None,
            random: None,
            user_agent: None,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sign requests with these credentials.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sign requests with a custom signer; takes precedence over credentials.
    pub fn signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Send requests without authentication headers.
    pub fn unsigned(mut self) -> Self {
        self.credentials = None;
        self.signer = None;
        self
    }

    /// Set the clock used to timestamp signed requests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the random source used for request nonces.
    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    ///
    /// Fails with a validation error when the base URL does not parse.
    pub fn build(self) -> Result<RestClient, BitunixError> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| BitunixError::validation("base_url", format!("`{}`: {e}", self.base_url)))?;

        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("bitunix-api-client/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("bitunix-api-client"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| BitunixError::Internal(format!("failed to build HTTP client: {e}")))?;

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        let signer = match (self.signer, self.credentials) {
            (Some(signer), _) => Some(signer),
            (None, Some(credentials)) => {
                let mut signer = Signer::new(credentials);
                if let Some(clock) = self.clock {
                    signer = signer.with_clock(clock);
                }
                if let Some(random) = self.random {
                    signer = signer.with_random_source(random);
                }
                Some(Arc::new(signer) as Arc<dyn RequestSigner>)
            }
            (None, None) => None,
        };

        Ok(RestClient {
            http_client,
            base_url,
            signer,
        })
    }
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Fields;
    use serde_json::Value;

    #[derive(Debug)]
    struct Probe {
        available: f64,
    }

    impl Decode for Probe {
        fn decode(value: &Value) -> Result<Self, BitunixError> {
            let f = Fields::new(value, "Probe")?;
            Ok(Self {
                available: f.float("available")?,
            })
        }
    }

    #[test]
    fn test_decode_envelope_success() {
        let body = br#"{"code":0,"msg":"Success","data":{"available":"12.5"}}"#;
        let probe: Probe = decode_envelope(body, "/x").unwrap();
        assert_eq!(probe.available, 12.5);
    }

    #[test]
    fn test_decode_envelope_api_error_prefers_message() {
        let body = br#"{"code":20003,"msg":"short","message":"Insufficient balance","data":null}"#;
        let err = decode_envelope::<Probe>(body, "/api/v1/futures/trade/place_order").unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.code, 20003);
        assert_eq!(api.message, "Insufficient balance");
        assert_eq!(api.endpoint, "/api/v1/futures/trade/place_order");
    }

    #[test]
    fn test_decode_envelope_falls_back_to_msg() {
        let body = br#"{"code":10002,"msg":"Parameter error","data":null}"#;
        let err = decode_envelope::<Probe>(body, "/x").unwrap_err();
        assert_eq!(err.api_error().unwrap().message, "Parameter error");
    }

    #[test]
    fn test_decode_envelope_malformed_is_internal() {
        let err = decode_envelope::<Probe>(b"<html>", "/x").unwrap_err();
        assert!(err.is(ErrorKind::Internal));
    }

    #[test]
    fn test_decode_envelope_field_failure_is_validation() {
        let body = br#"{"code":0,"data":{"available":"lots"}}"#;
        let err = decode_envelope::<Probe>(body, "/x").unwrap_err();
        assert!(matches!(&err, BitunixError::Validation { field, .. } if field == "available"));
    }

    #[test]
    fn test_build_rejects_bad_url() {
        let err = RestClient::builder().base_url("not a url").build().unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_with_deadline_expires() {
        let err = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BitunixError>(())
        })
        .await
        .unwrap_err();
        assert!(err.is(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_with_deadline_passes_result_through() {
        let value = with_deadline(Duration::from_secs(1), async { Ok::<_, BitunixError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
