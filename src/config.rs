//! Configuration for recall-bridge
//!
//! CLI arguments and environment variable handling using clap.
//! Environment names match the deployment `.env` files (`MONGO_URL`,
//! `DB_NAME`) so existing environments keep working.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// recall-bridge - mobile backend for the learning platform
#[derive(Parser, Debug, Clone)]
#[command(name = "recall-bridge")]
#[command(about = "Progress cache, replay and leaderboard fallback for the mobile client")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8001")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGO_URL", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "DB_NAME", default_value = "recall_bridge")]
    pub mongodb_db: String,

    /// Base URL of the remote learning platform API (no trailing slash needed)
    #[arg(
        long,
        env = "REMOTE_API_URL",
        default_value = "https://irememberit.replit.app/api"
    )]
    pub remote_api_url: String,

    /// Timeout for remote reads (progress, stats, leaderboard) in milliseconds
    #[arg(long, env = "READ_TIMEOUT_MS", default_value = "10000")]
    pub read_timeout_ms: u64,

    /// Timeout for remote writes (stage completion pushes) in milliseconds
    #[arg(long, env = "WRITE_TIMEOUT_MS", default_value = "30000")]
    pub write_timeout_ms: u64,

    /// Maximum number of progress records scanned for the local leaderboard
    #[arg(long, env = "LEADERBOARD_SCAN_LIMIT", default_value = "1000")]
    pub leaderboard_scan_limit: usize,

    /// Highest stage number accepted in a stage completion
    #[arg(long, env = "MAX_STAGE", default_value = "100")]
    pub max_stage: u32,

    /// Respond without waiting for progressive replay to finish
    #[arg(long, env = "DETACH_REPLAY", default_value = "false")]
    pub detach_replay: bool,

    /// Enable development mode (falls back to an in-memory store without MongoDB)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Remote base URL without a trailing slash
    pub fn remote_base_url(&self) -> &str {
        self.remote_api_url.trim_end_matches('/')
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.remote_api_url.starts_with("http://") && !self.remote_api_url.starts_with("https://")
        {
            return Err(format!(
                "REMOTE_API_URL must be an http(s) URL, got '{}'",
                self.remote_api_url
            ));
        }

        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err("READ_TIMEOUT_MS and WRITE_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.max_stage == 0 {
            return Err("MAX_STAGE must be greater than zero".to_string());
        }

        if self.leaderboard_scan_limit == 0 {
            return Err("LEADERBOARD_SCAN_LIMIT must be greater than zero".to_string());
        }

        Ok(())
    }
}
