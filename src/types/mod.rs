//! Common types used across the Bitunix client library.

pub mod common;
pub mod decode;
pub mod serde_helpers;

pub use common::*;
pub use decode::{Decode, Fields};
