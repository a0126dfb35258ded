//! Remote learning platform client
//!
//! Everything that talks to the remote authority goes through the
//! `RemoteSync` trait so the progress components can be tested without a
//! network.

pub mod client;
pub mod types;

pub use client::{RemoteClientConfig, RemoteSync, RemoteSyncClient, DEFAULT_REMOTE_API_URL};
pub use types::{
    remote_learning_type, RemoteAck, RemoteError, RemoteLeaderboard, RemoteProgress, RemoteStats,
    SyncPayload,
};
