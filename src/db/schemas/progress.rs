//! User progress document schema
//!
//! One document per (userId, moduleId). Stage entries keep `completedAt`
//! as an RFC 3339 string; `lastAccessed` is a native BSON date.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::mongo::IntoIndexes;
use crate::progress::model::{ProgressRecord, StageRecord};

/// Collection name for user progress
pub const PROGRESS_COLLECTION: &str = "user_progress";

/// Progress document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub user_id: String,

    pub module_id: String,

    /// Completed stages keyed by `"{stage}-{learningType}"`
    #[serde(default)]
    pub completed_stages: BTreeMap<String, StageRecord>,

    #[serde(default)]
    pub total_points: u64,

    #[serde(default = "default_highest_stage")]
    pub highest_stage: u32,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_accessed: DateTime<Utc>,
}

fn default_highest_stage() -> u32 {
    1
}

impl ProgressDoc {
    /// Filter matching the document of one (user, module) pair
    pub fn pair_filter(user_id: &str, module_id: &str) -> Document {
        doc! { "userId": user_id, "moduleId": module_id }
    }
}

impl From<&ProgressRecord> for ProgressDoc {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            id: None,
            user_id: record.user_id.clone(),
            module_id: record.module_id.clone(),
            completed_stages: record.completed_stages.clone(),
            total_points: record.total_points,
            highest_stage: record.highest_stage,
            last_accessed: record.last_accessed,
        }
    }
}

impl From<ProgressDoc> for ProgressRecord {
    fn from(doc: ProgressDoc) -> Self {
        Self {
            user_id: doc.user_id,
            module_id: doc.module_id,
            completed_stages: doc.completed_stages,
            total_points: doc.total_points,
            highest_stage: doc.highest_stage,
            last_accessed: doc.last_accessed,
        }
    }
}

impl IntoIndexes for ProgressDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One document per (user, module)
            (
                doc! { "userId": 1, "moduleId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_module_unique".to_string())
                        .build(),
                ),
            ),
            // Stats and bulk sync read all of a user's documents
            (
                doc! { "userId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
