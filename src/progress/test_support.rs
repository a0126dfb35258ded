//! In-process mocks shared by the progress tests

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::progress::model::ProgressRecord;
use crate::progress::store::ProgressStore;
use crate::remote::{
    RemoteAck, RemoteError, RemoteLeaderboard, RemoteProgress, RemoteStats, RemoteSync,
    SyncPayload,
};
use crate::types::{BridgeError, Result};

/// Remote double that records every push and serves canned reads
#[derive(Default)]
pub(crate) struct MockRemote {
    pub pushes: Mutex<Vec<(SyncPayload, String)>>,
    pub failing_stages: HashSet<u32>,
    pub progress: Option<RemoteProgress>,
    pub stats: RemoteStats,
    pub leaderboard: Option<RemoteLeaderboard>,
    /// Delay applied after a push is recorded
    pub push_delay: Option<Duration>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(stages: &[u32]) -> Self {
        Self {
            failing_stages: stages.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            push_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn pushes(&self) -> Vec<SyncPayload> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, auth)| auth.clone())
            .collect()
    }

    pub fn pushed_stages(&self) -> Vec<u32> {
        self.pushes().iter().map(|p| p.stage).collect()
    }
}

#[async_trait::async_trait]
impl RemoteSync for MockRemote {
    async fn push_stage_completion(
        &self,
        payload: &SyncPayload,
        auth: &str,
    ) -> std::result::Result<RemoteAck, RemoteError> {
        self.pushes
            .lock()
            .unwrap()
            .push((payload.clone(), auth.to_string()));
        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_stages.contains(&payload.stage) {
            return Err(RemoteError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(RemoteAck::default())
    }

    async fn fetch_progress(
        &self,
        _user_id: &str,
        _module_id: &str,
        _auth: Option<&str>,
    ) -> Option<RemoteProgress> {
        self.progress.clone()
    }

    async fn fetch_stats(&self, _user_id: &str, _auth: Option<&str>) -> RemoteStats {
        self.stats.clone()
    }

    async fn fetch_leaderboard(
        &self,
        _timeframe: &str,
        _auth: Option<&str>,
    ) -> Option<RemoteLeaderboard> {
        self.leaderboard.clone()
    }
}

/// Store whose every operation fails, for the hard-error paths
pub(crate) struct FailingStore;

fn unavailable<T>() -> Result<T> {
    Err(BridgeError::Database("store unavailable".to_string()))
}

#[async_trait::async_trait]
impl ProgressStore for FailingStore {
    async fn find(&self, _user_id: &str, _module_id: &str) -> Result<Option<ProgressRecord>> {
        unavailable()
    }

    async fn insert(&self, _record: &ProgressRecord) -> Result<()> {
        unavailable()
    }

    async fn update(&self, _record: &ProgressRecord) -> Result<()> {
        unavailable()
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<Vec<ProgressRecord>> {
        unavailable()
    }

    async fn scan(&self, _limit: usize) -> Result<Vec<ProgressRecord>> {
        unavailable()
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// Store whose lookups never finish in time, for cancellation paths
pub(crate) struct StallingStore;

#[async_trait::async_trait]
impl ProgressStore for StallingStore {
    async fn find(&self, _user_id: &str, _module_id: &str) -> Result<Option<ProgressRecord>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn insert(&self, _record: &ProgressRecord) -> Result<()> {
        Ok(())
    }

    async fn update(&self, _record: &ProgressRecord) -> Result<()> {
        Ok(())
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<Vec<ProgressRecord>> {
        Ok(Vec::new())
    }

    async fn scan(&self, _limit: usize) -> Result<Vec<ProgressRecord>> {
        Ok(Vec::new())
    }

    fn backend(&self) -> &'static str {
        "stalling"
    }
}
