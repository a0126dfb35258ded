//! Stats Aggregator
//!
//! Remote totals when the remote has them, local sums otherwise. A remote
//! value of zero counts as "no data", so a user whose remote total really
//! is zero sees the local figure instead.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::progress::model::{ProgressRecord, StatsView};
use crate::progress::store::ProgressStore;
use crate::remote::{RemoteStats, RemoteSync};
use crate::types::Result;

/// Length of the weekly window
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

/// Totals computed from the local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalStats {
    pub total_points: u64,
    pub weekly_points: u64,
}

pub struct StatsAggregator {
    store: Arc<dyn ProgressStore>,
    remote: Arc<dyn RemoteSync>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn ProgressStore>, remote: Arc<dyn RemoteSync>) -> Self {
        Self { store, remote }
    }

    pub async fn get_user_stats(&self, user_id: &str, auth: Option<&str>) -> Result<StatsView> {
        let (remote, records) = futures::join!(
            self.remote.fetch_stats(user_id, auth),
            self.store.find_by_user(user_id)
        );
        let local = compute_local_stats(&records?, Utc::now());

        debug!(
            user_id = %user_id,
            remote_total = remote.total_points,
            local_total = local.total_points,
            "Aggregating stats"
        );

        Ok(combine(user_id, &remote, &local))
    }
}

/// Local totals; a stage counts as weekly when completed within the last
/// seven days, boundary included.
pub fn compute_local_stats(records: &[ProgressRecord], now: DateTime<Utc>) -> LocalStats {
    let window_start = now - Duration::days(WEEKLY_WINDOW_DAYS);

    records.iter().fold(LocalStats::default(), |mut acc, record| {
        acc.total_points = acc.total_points.saturating_add(record.total_points);
        acc.weekly_points = record
            .completed_stages
            .values()
            .filter(|stage| stage.completed_at >= window_start)
            .fold(acc.weekly_points, |sum, stage| {
                sum.saturating_add(stage.points_earned)
            });
        acc
    })
}

pub fn combine(user_id: &str, remote: &RemoteStats, local: &LocalStats) -> StatsView {
    let pick = |remote: i64, local: u64| {
        if remote != 0 {
            remote
        } else {
            i64::try_from(local).unwrap_or(i64::MAX)
        }
    };

    StatsView {
        total_points: pick(remote.total_points, local.total_points),
        weekly_points: pick(remote.weekly_points, local.weekly_points),
        rank: remote.rank,
        user_id: user_id.to_string(),
    }
}
