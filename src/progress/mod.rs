//! Progress reconciliation and synchronization
//!
//! Local progress cache plus the components that reconcile it with the
//! remote learning platform:
//!
//! - **Recorder**: idempotent stage completion with progressive replay
//! - **Merger**: remote-wins read view, local fills gaps
//! - **Stats**: remote totals with local fallback
//! - **Leaderboard**: local ranking when the remote one is unusable
//! - **Sync**: bulk push of every stored stage

pub mod leaderboard;
pub mod merger;
pub mod model;
pub mod recorder;
pub mod stats;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use leaderboard::{build_local_leaderboard, LeaderboardResponse, LeaderboardService};
pub use merger::ProgressMerger;
pub use model::{
    CompletionResult, LearningType, LeaderboardEntry, ProgressRecord, ProgressView,
    StageCompletionEvent, StageRecord, StatsView,
};
pub use recorder::{CompletionRecorder, ReplayPlan, ReplaySummary};
pub use stats::StatsAggregator;
pub use store::{InMemoryProgressStore, ProgressStore};
pub use sync::{BulkSync, BulkSyncResult};
