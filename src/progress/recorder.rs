//! Completion Recorder
//!
//! Applies stage-completion events to the progress store and replays the
//! user's history for that learning type to the remote authority.
//!
//! ## Write path
//!
//! 1. Validate the event (bad input never reaches the store)
//! 2. Take the per-(user, module) lock
//! 3. Load the record; a stage key already present is a no-op
//! 4. Apply the stage and persist (insert or update)
//! 5. Release the lock, then replay stages `1..=stage` in order
//!
//! Replay runs in a spawned task, so it finishes even when the client
//! disconnects mid-request. Replay is best effort: each push is attempted once and failures are
//! logged and skipped. Only a store failure fails the request.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::progress::model::{
    parse_stage_key, CompletionResult, ProgressRecord, StageCompletionEvent, StageRecord,
    DEFAULT_MAX_STAGE,
};
use crate::progress::store::ProgressStore;
use crate::remote::{RemoteSync, SyncPayload};
use crate::types::Result;

/// Time spent reported for a prior stage that has no local record
pub const SYNTHETIC_TIME_SPENT: u32 = 60;

/// Accuracy reported for a prior stage that has no local record
pub const SYNTHETIC_ACCURACY: f64 = 100.0;

type PairKey = (String, String);

/// Outcome of one replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub synced: usize,
    pub failed: usize,
}

pub struct CompletionRecorder {
    store: Arc<dyn ProgressStore>,
    remote: Arc<dyn RemoteSync>,
    /// In-flight locks keyed by (user, module)
    locks: DashMap<PairKey, Arc<Mutex<()>>>,
    detach_replay: bool,
    max_stage: u32,
}

impl CompletionRecorder {
    pub fn new(store: Arc<dyn ProgressStore>, remote: Arc<dyn RemoteSync>) -> Self {
        Self {
            store,
            remote,
            locks: DashMap::new(),
            detach_replay: false,
            max_stage: DEFAULT_MAX_STAGE,
        }
    }

    /// Respond without waiting for replay to finish
    pub fn with_detached_replay(mut self, detach: bool) -> Self {
        self.detach_replay = detach;
        self
    }

    /// Highest stage number accepted from clients
    pub fn with_max_stage(mut self, max_stage: u32) -> Self {
        self.max_stage = max_stage;
        self
    }

    /// Record a stage completion and replay it when a credential is given
    pub async fn record_completion(
        &self,
        event: &StageCompletionEvent,
        auth: Option<&str>,
    ) -> Result<CompletionResult> {
        event.validate(self.max_stage)?;

        let now = Utc::now();
        let key = event.stage_key();

        let record = match self.apply_exclusive(event, &key, now).await? {
            Some(record) => record,
            None => {
                info!(
                    user_id = %event.user_id,
                    module_id = %event.module_id,
                    stage_key = %key,
                    "Stage already completed, no points awarded"
                );
                return Ok(CompletionResult::already_completed());
            }
        };

        info!(
            user_id = %event.user_id,
            module_id = %event.module_id,
            stage_key = %key,
            points = event.points_earned,
            total_points = record.total_points,
            "Progress saved"
        );

        match auth {
            Some(auth) => self.start_replay(event, &record, auth).await,
            None => {
                warn!(
                    user_id = %event.user_id,
                    module_id = %event.module_id,
                    "No authorization token, skipping remote sync"
                );
            }
        }

        Ok(CompletionResult::awarded(event.points_earned))
    }

    /// Run replay in its own task so a dropped request cannot cut it short.
    ///
    /// Inline mode waits for the task before responding; detached mode
    /// returns at once.
    async fn start_replay(&self, event: &StageCompletionEvent, record: &ProgressRecord, auth: &str) {
        let plan = ReplayPlan::new(event, record);
        let remote = self.remote.clone();
        let auth = auth.to_string();
        let user_id = event.user_id.clone();

        let handle =
            tokio::spawn(async move { replay(remote.as_ref(), &plan, &auth, &user_id).await });

        if self.detach_replay {
            return;
        }
        if let Err(e) = handle.await {
            error!(user_id = %event.user_id, error = %e, "Replay task failed");
        }
    }

    /// Check-and-write under the pair lock.
    ///
    /// Returns `None` when the stage key was already present.
    async fn apply_exclusive(
        &self,
        event: &StageCompletionEvent,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ProgressRecord>> {
        let entry = PairLock::acquire(
            &self.locks,
            (event.user_id.clone(), event.module_id.clone()),
        );
        let _guard = entry.lock().await;
        self.apply_locked(event, key, now).await
    }

    async fn apply_locked(
        &self,
        event: &StageCompletionEvent,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ProgressRecord>> {
        let existing = self.store.find(&event.user_id, &event.module_id).await?;
        let is_new = existing.is_none();
        let mut record = existing
            .unwrap_or_else(|| ProgressRecord::new(event.user_id.clone(), event.module_id.clone()));

        if !record.apply(key.to_string(), event.stage, event.to_stage_record(now), now)? {
            return Ok(None);
        }

        let persisted = if is_new {
            self.store.insert(&record).await
        } else {
            self.store.update(&record).await
        };
        if let Err(e) = persisted {
            error!(
                user_id = %event.user_id,
                module_id = %event.module_id,
                error = %e,
                "Failed to persist progress"
            );
            return Err(e);
        }

        Ok(Some(record))
    }

    #[cfg(test)]
    fn in_flight_locks(&self) -> usize {
        self.locks.len()
    }
}

/// Entry in the pair-lock map, evicted on drop once nobody else holds it.
///
/// Dropping happens on every exit from `apply_exclusive`, including when
/// the caller's future is cancelled mid-await.
struct PairLock<'a> {
    locks: &'a DashMap<PairKey, Arc<Mutex<()>>>,
    key: PairKey,
    mutex: Arc<Mutex<()>>,
}

impl<'a> PairLock<'a> {
    fn acquire(locks: &'a DashMap<PairKey, Arc<Mutex<()>>>, key: PairKey) -> Self {
        let mutex = locks.entry(key.clone()).or_default().clone();
        Self { locks, key, mutex }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for PairLock<'_> {
    fn drop(&mut self) {
        // Release this reference first so the count only sees other holders
        drop(std::mem::take(&mut self.mutex));
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Replay of stages `1..=stage` for the event's learning type.
///
/// Owns a snapshot of the prior stage records it needs and builds each
/// payload only when iterated, so its size follows the stored stages and
/// not the stage number.
#[derive(Debug, Clone)]
pub struct ReplayPlan {
    module_id: String,
    card_id: String,
    learning_type: &'static str,
    stage: u32,
    time_spent: u32,
    accuracy: f64,
    passed: bool,
    prior: BTreeMap<u32, StageRecord>,
}

impl ReplayPlan {
    pub fn new(event: &StageCompletionEvent, record: &ProgressRecord) -> Self {
        let learning_type = event.learning_type.as_str();
        let prior = record
            .completed_stages
            .iter()
            .filter_map(|(key, stage)| match parse_stage_key(key) {
                Some((n, lt)) if lt == learning_type && n < event.stage => Some((n, stage.clone())),
                _ => None,
            })
            .collect();

        Self {
            module_id: event.module_id.clone(),
            card_id: event.card_id.clone(),
            learning_type,
            stage: event.stage,
            time_spent: event.time_spent,
            accuracy: event.accuracy,
            passed: event.points_earned > 0,
            prior,
        }
    }

    /// Number of pushes the plan makes
    pub fn len(&self) -> usize {
        self.stage as usize
    }

    pub fn is_empty(&self) -> bool {
        self.stage == 0
    }

    /// Payloads in stage order, built on demand
    pub fn payloads(&self) -> impl Iterator<Item = SyncPayload> + '_ {
        (1..=self.stage).map(move |stage| self.payload(stage))
    }

    fn payload(&self, stage: u32) -> SyncPayload {
        let (card_id, time_spent, passed, accuracy) = if stage == self.stage {
            (&self.card_id, self.time_spent, self.passed, self.accuracy)
        } else {
            match self.prior.get(&stage) {
                Some(prior) => (&prior.card_id, prior.time_spent, true, prior.accuracy),
                None => (&self.card_id, SYNTHETIC_TIME_SPENT, true, SYNTHETIC_ACCURACY),
            }
        };

        SyncPayload {
            module_id: self.module_id.clone(),
            card_id: card_id.clone(),
            learning_type: self.learning_type.to_string(),
            stage,
            time_spent,
            passed,
            accuracy,
        }
    }
}

/// Push a plan's payloads one at a time, in order. Never fails.
pub async fn replay(
    remote: &dyn RemoteSync,
    plan: &ReplayPlan,
    auth: &str,
    user_id: &str,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for payload in plan.payloads() {
        match remote.push_stage_completion(&payload, auth).await {
            Ok(ack) => {
                summary.synced += 1;
                debug!(
                    user_id = %user_id,
                    module_id = %payload.module_id,
                    stage = payload.stage,
                    points_awarded = ?ack.points_awarded,
                    "Stage synced to remote"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(
                    user_id = %user_id,
                    module_id = %payload.module_id,
                    stage = payload.stage,
                    error = %e,
                    "Stage sync failed"
                );
            }
        }
    }

    info!(
        user_id = %user_id,
        synced = summary.synced,
        total = plan.len(),
        "Progressive sync complete: {}/{}",
        summary.synced,
        plan.len()
    );

    summary
}
