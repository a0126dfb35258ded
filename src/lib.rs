//! recall-bridge - mobile backend for the recall learning platform
//!
//! Sits between the mobile client and the remote learning platform API.
//! The client gets one origin and one authorization scheme; progress is
//! cached locally so reads keep working when the platform is slow or
//! down.
//!
//! ## Services
//!
//! - **Progress**: idempotent stage completion with progressive replay
//!   to the remote platform, remote-wins merged reads, stats fallback
//! - **Leaderboard**: remote leaderboard with a local ranking fallback
//! - **Verification**: email verification passthrough

pub mod config;
pub mod db;
pub mod progress;
pub mod remote;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BridgeError, Result};
