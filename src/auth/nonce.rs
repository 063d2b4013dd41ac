//! Randomness and clock sources used when stamping requests.
//!
//! Bitunix expects a fresh 32-byte random nonce and a millisecond timestamp
//! on every signed request. Both sources are traits so tests can pin them.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::BitunixError;

/// Number of random bytes in a request nonce.
pub const NONCE_LEN: usize = 32;

/// Fill `n` bytes from the operating system's cryptographic random source.
///
/// Fails only when that source fails; the failure is reported as a
/// network-level error so that signing errors classify uniformly.
pub fn nonce(n: usize) -> Result<Vec<u8>, BitunixError> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| BitunixError::Network(format!("random source failed: {e}")))?;
    Ok(buf)
}

/// Source of random bytes for nonces.
pub trait RandomSource: Send + Sync {
    /// Return exactly `n` random bytes.
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, BitunixError>;
}

/// Random source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, BitunixError> {
        nonce(n)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;

    /// Whole seconds since the UNIX epoch.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// Clock that reads the local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
