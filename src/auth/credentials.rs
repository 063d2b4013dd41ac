//! API key pairs and where signers get them from.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::BitunixError;

/// A Bitunix API key and its secret.
///
/// The secret is held in a [`SecretString`] and never printed. Credentials
/// can be deserialized from `{"apiKey": ..., "apiSecret": ...}`.
#[derive(Clone, Deserialize)]
#[serde(from = "RawCredentials")]
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentials {
    api_key: String,
    api_secret: String,
}

impl From<RawCredentials> for Credentials {
    fn from(raw: RawCredentials) -> Self {
        Self::new(raw.api_key, raw.api_secret)
    }
}

impl Credentials {
    /// Create credentials without checking them.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
        }
    }

    /// Create credentials, rejecting a blank key or secret.
    pub fn try_new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, BitunixError> {
        let credentials = Self::new(api_key, api_secret);
        if credentials.api_key.trim().is_empty() {
            return Err(BitunixError::validation("apiKey", "must not be empty"));
        }
        if credentials.expose_secret().trim().is_empty() {
            return Err(BitunixError::validation("apiSecret", "must not be empty"));
        }
        Ok(credentials)
    }

    /// The public key sent in the `api-key` header.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The secret, for signing only.
    pub fn expose_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Supplies credentials to a signer on every request.
///
/// Implement it to pull keys from a secrets manager or to rotate them at
/// runtime; the signer asks again for each request and login.
pub trait CredentialsProvider: Send + Sync {
    /// Current credentials.
    fn credentials(&self) -> Credentials;
}

impl CredentialsProvider for Credentials {
    fn credentials(&self) -> Credentials {
        self.clone()
    }
}

impl<P: CredentialsProvider + ?Sized> CredentialsProvider for Arc<P> {
    fn credentials(&self) -> Credentials {
        (**self).credentials()
    }
}

/// A fixed key pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    /// Wrap a key and secret.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self(Credentials::new(api_key, api_secret))
    }
}

impl From<Credentials> for StaticCredentials {
    fn from(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Credentials {
        self.0.clone()
    }
}

/// A key pair that can be swapped while clients keep running.
///
/// Requests signed after [`RotatingCredentials::rotate`] use the new pair;
/// an open WebSocket session keeps the login it made.
#[derive(Debug)]
pub struct RotatingCredentials {
    current: RwLock<Credentials>,
}

impl RotatingCredentials {
    /// Start with `credentials`.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(credentials),
        }
    }

    /// Replace the key pair.
    pub fn rotate(&self, credentials: Credentials) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credentials;
    }
}

impl CredentialsProvider for RotatingCredentials {
    fn credentials(&self) -> Credentials {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("my_key", "super_secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("my_key"));
        assert!(!debug.contains("super_secret"));

        let debug = format!("{:?}", StaticCredentials::new("my_key", "super_secret"));
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn test_try_new_rejects_blank() {
        let err = Credentials::try_new("", "secret").unwrap_err();
        assert!(matches!(err, BitunixError::Validation { ref field, .. } if field == "apiKey"));
        let err = Credentials::try_new("key", "  ").unwrap_err();
        assert!(matches!(err, BitunixError::Validation { ref field, .. } if field == "apiSecret"));
        assert!(Credentials::try_new("key", "secret").is_ok());
    }

    #[test]
    fn test_deserialize() {
        let creds: Credentials = serde_json::from_str(r#"{"apiKey":"k","apiSecret":"s"}"#).unwrap();
        assert_eq!(creds.api_key(), "k");
        assert_eq!(creds.expose_secret(), "s");
    }

    #[test]
    fn test_rotation() {
        let provider = Arc::new(RotatingCredentials::new(Credentials::new("old", "s1")));
        let shared: Arc<dyn CredentialsProvider> = provider.clone();
        assert_eq!(shared.credentials().api_key(), "old");

        provider.rotate(Credentials::new("new", "s2"));
        let creds = shared.credentials();
        assert_eq!(creds.api_key(), "new");
        assert_eq!(creds.expose_secret(), "s2");
    }
}
