//! MongoDB-backed progress store

use bson::doc;
use tracing::debug;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{ProgressDoc, PROGRESS_COLLECTION};
use crate::progress::model::ProgressRecord;
use crate::progress::store::ProgressStore;
use crate::types::{BridgeError, Result};

/// Progress store persisting to the `user_progress` collection
pub struct MongoProgressStore {
    collection: MongoCollection<ProgressDoc>,
}

impl MongoProgressStore {
    /// Open the collection and ensure its indexes exist
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<ProgressDoc>(PROGRESS_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait::async_trait]
impl ProgressStore for MongoProgressStore {
    async fn find(&self, user_id: &str, module_id: &str) -> Result<Option<ProgressRecord>> {
        let doc = self
            .collection
            .find_one(ProgressDoc::pair_filter(user_id, module_id))
            .await?;
        Ok(doc.map(ProgressRecord::from))
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<()> {
        self.collection.insert_one(&ProgressDoc::from(record)).await?;
        debug!(user_id = %record.user_id, module_id = %record.module_id, "Inserted progress document");
        Ok(())
    }

    async fn update(&self, record: &ProgressRecord) -> Result<()> {
        let total_points = i64::try_from(record.total_points).map_err(|_| {
            BridgeError::Internal(format!("totalPoints out of range: {}", record.total_points))
        })?;
        let update = doc! {
            "$set": {
                "completedStages": bson::to_bson(&record.completed_stages)?,
                "totalPoints": total_points,
                "highestStage": i64::from(record.highest_stage),
                "lastAccessed": bson::DateTime::from_chrono(record.last_accessed),
            }
        };

        let result = self
            .collection
            .update_one(
                ProgressDoc::pair_filter(&record.user_id, &record.module_id),
                update,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(BridgeError::NotFound(format!(
                "progress record {}/{}",
                record.user_id, record.module_id
            )));
        }
        Ok(())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        let docs = self
            .collection
            .find_many(doc! { "userId": user_id }, None)
            .await?;
        Ok(docs.into_iter().map(ProgressRecord::from).collect())
    }

    async fn scan(&self, limit: usize) -> Result<Vec<ProgressRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let docs = self.collection.find_many(doc! {}, Some(limit)).await?;
        Ok(docs.into_iter().map(ProgressRecord::from).collect())
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
