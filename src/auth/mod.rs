//! Authentication module for Bitunix API.
//!
//! This module provides:
//! - Credential management with secure secret storage
//! - Random nonce and clock sources, injectable for tests
//! - The double SHA-256 signatures used by HTTP requests and WebSocket login

mod credentials;
mod nonce;
mod signature;

pub use credentials::{Credentials, CredentialsProvider, RotatingCredentials, StaticCredentials};
pub use nonce::{Clock, NONCE_LEN, OsRandom, RandomSource, SystemClock, nonce};
pub use signature::{
    AuthTriple, LoginParams, RequestSigner, SignedHeaders, Signer, sha256_hex, sign_request,
    sign_ws_login,
};
