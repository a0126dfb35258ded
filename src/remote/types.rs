//! Wire types exchanged with the remote learning platform

use serde::{Deserialize, Serialize};

/// Translate an internal learning-type token to the remote vocabulary.
///
/// Unknown tokens pass through unchanged.
pub fn remote_learning_type(token: &str) -> &str {
    match token {
        "fill_blank" => "fill-in-blank",
        "word_cloud" => "word-cloud",
        "verbal" => "verbal-speaking",
        other => other,
    }
}

/// One stage completion to push to the remote authority.
///
/// `learning_type` holds the internal token; the client translates it
/// when the request is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPayload {
    pub module_id: String,
    pub card_id: String,
    pub learning_type: String,
    pub stage: u32,
    pub time_spent: u32,
    pub passed: bool,
    pub accuracy: f64,
}

/// JSON body of `POST /mobile/sync/complete-stage`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteStageRequest<'a> {
    pub module_id: &'a str,
    pub card_id: &'a str,
    pub learning_type: &'a str,
    pub stage: u32,
    pub time_spent: u32,
    pub passed: bool,
    pub accuracy: f64,
}

impl<'a> From<&'a SyncPayload> for CompleteStageRequest<'a> {
    fn from(payload: &'a SyncPayload) -> Self {
        Self {
            module_id: &payload.module_id,
            card_id: &payload.card_id,
            learning_type: remote_learning_type(&payload.learning_type),
            stage: payload.stage,
            time_spent: payload.time_spent,
            passed: payload.passed,
            accuracy: payload.accuracy,
        }
    }
}

/// Acknowledgement of an accepted stage push
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAck {
    /// Points the remote authority reports awarding, when it says so
    pub points_awarded: Option<i64>,
}

/// Remote progress snapshot for one (user, module) pair.
///
/// Kept as the raw JSON object the remote sent; only `completedStages` is
/// ever touched by a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteProgress(pub serde_json::Map<String, serde_json::Value>);

/// Remote user statistics; zeroed when the remote is unavailable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStats {
    pub total_points: i64,
    pub weekly_points: i64,
    pub rank: Option<i64>,
}

/// Remote leaderboard body, returned to the client as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLeaderboard {
    #[serde(default)]
    pub leaderboard: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Errors from a single remote call
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}
