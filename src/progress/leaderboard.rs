//! Leaderboard Builder
//!
//! The remote leaderboard is served as-is whenever it has entries. When it
//! is unreachable or empty, a ranking is computed from a bounded scan of
//! the local progress store.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::progress::model::{LeaderboardEntry, ProgressRecord};
use crate::progress::store::ProgressStore;
use crate::remote::{RemoteLeaderboard, RemoteSync};
use crate::types::Result;

/// Default number of records scanned for the local ranking
pub const DEFAULT_SCAN_LIMIT: usize = 1000;

/// Timeframe used when the client does not send one
pub const DEFAULT_TIMEFRAME: &str = "alltime";

/// Leaderboard body returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LeaderboardResponse {
    Remote(RemoteLeaderboard),
    Local {
        leaderboard: Vec<LeaderboardEntry>,
        source: &'static str,
    },
}

pub struct LeaderboardService {
    store: Arc<dyn ProgressStore>,
    remote: Arc<dyn RemoteSync>,
    scan_limit: usize,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn ProgressStore>, remote: Arc<dyn RemoteSync>) -> Self {
        Self {
            store,
            remote,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    pub async fn get_leaderboard(
        &self,
        timeframe: &str,
        auth: Option<&str>,
    ) -> Result<LeaderboardResponse> {
        if let Some(remote) = self.remote.fetch_leaderboard(timeframe, auth).await {
            return Ok(LeaderboardResponse::Remote(remote));
        }

        warn!(timeframe = %timeframe, "Remote leaderboard unavailable, building from local store");
        let records = self.store.scan(self.scan_limit).await?;
        let leaderboard = build_local_leaderboard(&records);

        info!(
            scanned = records.len(),
            entries = leaderboard.len(),
            "Built local leaderboard"
        );

        Ok(LeaderboardResponse::Local {
            leaderboard,
            source: "local",
        })
    }
}

/// Sum points per user and rank descending.
///
/// Ties keep the order in which users were first seen in `records`.
pub fn build_local_leaderboard(records: &[ProgressRecord]) -> Vec<LeaderboardEntry> {
    let mut totals: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        match index.get(record.user_id.as_str()) {
            Some(&i) => totals[i].1 = totals[i].1.saturating_add(record.total_points),
            None => {
                index.insert(&record.user_id, totals.len());
                totals.push((record.user_id.clone(), record.total_points));
            }
        }
    }

    // sort_by is stable
    totals.sort_by(|a, b| b.1.cmp(&a.1));

    totals
        .into_iter()
        .enumerate()
        .map(|(i, (user_id, total_points))| LeaderboardEntry {
            user_id,
            rank: i as u32 + 1,
            total_points,
            name: None,
            email: None,
        })
        .collect()
}
