//! Progress data model
//!
//! Records are keyed by (user, module). Inside a record every completed
//! stage/learning-type pair lives under the composite key
//! `"{stage}-{learningType}"`, written at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{BridgeError, Result};

/// Highest stage number accepted by default
pub const DEFAULT_MAX_STAGE: u32 = 100;

/// Largest point value a single completion or a running total may hold.
///
/// Totals are persisted as BSON int64, so anything above `i64::MAX` is
/// refused instead of wrapping.
pub const MAX_POINTS: u64 = i64::MAX as u64;

/// Exercise mode applied at a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningType {
    FillBlank,
    WordCloud,
    Verbal,
}

impl LearningType {
    /// Token used in stage keys and stored documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FillBlank => "fill_blank",
            Self::WordCloud => "word_cloud",
            Self::Verbal => "verbal",
        }
    }
}

impl fmt::Display for LearningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key for a completed stage inside a record
pub fn stage_key(stage: u32, learning_type: &str) -> String {
    format!("{}-{}", stage, learning_type)
}

/// Split a stage key back into stage number and learning type token.
///
/// Splits at the first `-` only, so tokens containing dashes survive.
pub fn parse_stage_key(key: &str) -> Option<(u32, &str)> {
    let (stage, learning_type) = key.split_once('-')?;
    let stage = stage.parse::<u32>().ok()?;
    if learning_type.is_empty() {
        return None;
    }
    Some((stage, learning_type))
}

/// One completed (stage, learning type) pair within a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub card_id: String,
    pub points_earned: u64,
    pub completed_at: DateTime<Utc>,
    pub time_spent: u32,
    pub accuracy: f64,
}

/// Local progress for one (user, module) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: String,
    pub module_id: String,
    #[serde(default)]
    pub completed_stages: BTreeMap<String, StageRecord>,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default = "default_highest_stage")]
    pub highest_stage: u32,
    pub last_accessed: DateTime<Utc>,
}

fn default_highest_stage() -> u32 {
    1
}

impl ProgressRecord {
    /// Empty record for a pair that has never completed anything
    pub fn new(user_id: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            module_id: module_id.into(),
            completed_stages: BTreeMap::new(),
            total_points: 0,
            highest_stage: 1,
            last_accessed: Utc::now(),
        }
    }

    /// Apply a first-time completion.
    ///
    /// Returns `Ok(false)` and leaves the record untouched when the key is
    /// already present. A total that would exceed [`MAX_POINTS`] is a bad
    /// request and also leaves the record untouched.
    pub fn apply(
        &mut self,
        key: String,
        stage: u32,
        record: StageRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.completed_stages.contains_key(&key) {
            return Ok(false);
        }
        let total_points = self
            .total_points
            .checked_add(record.points_earned)
            .filter(|total| *total <= MAX_POINTS)
            .ok_or_else(|| {
                BridgeError::BadRequest(format!(
                    "total points for module {} would exceed {}",
                    self.module_id, MAX_POINTS
                ))
            })?;

        self.total_points = total_points;
        self.highest_stage = self.highest_stage.max(stage);
        self.completed_stages.insert(key, record);
        self.last_accessed = now;
        Ok(true)
    }
}

/// Inbound stage-completion event from the mobile client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCompletionEvent {
    pub user_id: String,
    pub module_id: String,
    pub card_id: String,
    pub stage: u32,
    pub learning_type: LearningType,
    pub points_earned: u64,
    pub time_spent: u32,
    pub accuracy: f64,
    /// Client-side completion time; the server clock is used when absent
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageCompletionEvent {
    /// Check input constraints before the store is touched
    pub fn validate(&self, max_stage: u32) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(BridgeError::BadRequest("userId must not be empty".into()));
        }
        if self.module_id.trim().is_empty() {
            return Err(BridgeError::BadRequest("moduleId must not be empty".into()));
        }
        if self.stage < 1 {
            return Err(BridgeError::BadRequest("stage must be >= 1".into()));
        }
        if self.stage > max_stage {
            return Err(BridgeError::BadRequest(format!(
                "stage must be <= {}, got {}",
                max_stage, self.stage
            )));
        }
        if self.points_earned > MAX_POINTS {
            return Err(BridgeError::BadRequest(format!(
                "pointsEarned must be <= {}",
                MAX_POINTS
            )));
        }
        if !(0.0..=100.0).contains(&self.accuracy) {
            return Err(BridgeError::BadRequest(format!(
                "accuracy must be within [0, 100], got {}",
                self.accuracy
            )));
        }
        Ok(())
    }

    pub fn stage_key(&self) -> String {
        stage_key(self.stage, self.learning_type.as_str())
    }

    /// Stage record written on first completion
    pub fn to_stage_record(&self, now: DateTime<Utc>) -> StageRecord {
        StageRecord {
            card_id: self.card_id.clone(),
            points_earned: self.points_earned,
            completed_at: self.completed_at.unwrap_or(now),
            time_spent: self.time_spent,
            accuracy: self.accuracy,
        }
    }
}

/// Outcome of recording a completion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub success: bool,
    pub points_awarded: u64,
    pub message: String,
    pub already_completed: bool,
}

impl CompletionResult {
    pub fn awarded(points: u64) -> Self {
        Self {
            success: true,
            points_awarded: points,
            message: "Progress saved successfully".to_string(),
            already_completed: false,
        }
    }

    pub fn already_completed() -> Self {
        Self {
            success: true,
            points_awarded: 0,
            message: "Stage already completed".to_string(),
            already_completed: true,
        }
    }
}

/// Read-time progress view returned to the client.
///
/// A plain JSON object: a remote copy is served exactly as the remote
/// authority sent it, apart from gap-filled `completedStages` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressView(pub serde_json::Map<String, serde_json::Value>);

impl ProgressView {
    /// Zero-valued view for a pair with no progress anywhere
    pub fn empty(user_id: &str, module_id: &str) -> Self {
        Self::from_value(serde_json::json!({
            "userId": user_id,
            "moduleId": module_id,
            "completedStages": {},
            "totalPoints": 0,
            "highestStage": 1,
            "lastAccessed": null,
        }))
    }

    /// Verbatim view of a local record
    pub fn from_local(record: &ProgressRecord) -> Self {
        let completed_stages: serde_json::Map<String, serde_json::Value> = record
            .completed_stages
            .iter()
            .map(|(key, stage)| (key.clone(), stage_to_json(stage)))
            .collect();

        Self::from_value(serde_json::json!({
            "userId": record.user_id,
            "moduleId": record.module_id,
            "completedStages": completed_stages,
            "totalPoints": record.total_points,
            "highestStage": record.highest_stage,
            "lastAccessed": record.last_accessed.to_rfc3339(),
        }))
    }

    fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            _ => Self(serde_json::Map::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Stage entries, when the view carries them as an object
    pub fn completed_stages(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.0.get("completedStages").and_then(|v| v.as_object())
    }
}

pub(crate) fn stage_to_json(stage: &StageRecord) -> serde_json::Value {
    serde_json::to_value(stage).unwrap_or(serde_json::Value::Null)
}

/// Aggregated user statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_points: i64,
    pub weekly_points: i64,
    pub rank: Option<i64>,
    pub user_id: String,
}

/// Locally computed leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub rank: u32,
    pub total_points: u64,
    pub name: Option<String>,
    pub email: Option<String>,
}
