//! Shared types for recall-bridge

pub mod error;

pub use error::{BridgeError, Result};
