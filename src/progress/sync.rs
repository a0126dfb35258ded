//! Bulk sync of a user's stored stages to the remote authority

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::progress::model::parse_stage_key;
use crate::progress::store::ProgressStore;
use crate::remote::{RemoteSync, SyncPayload};
use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncResult {
    pub success: bool,
    pub synced: usize,
    pub failed: usize,
    /// `"{moduleId}:{stageKey}"` for every accepted push
    pub synced_stages: Vec<String>,
    pub message: String,
}

pub struct BulkSync {
    store: Arc<dyn ProgressStore>,
    remote: Arc<dyn RemoteSync>,
}

impl BulkSync {
    pub fn new(store: Arc<dyn ProgressStore>, remote: Arc<dyn RemoteSync>) -> Self {
        Self { store, remote }
    }

    /// Push every stored stage of a user, one call per stage key
    pub async fn sync_all(&self, user_id: &str, auth: &str) -> Result<BulkSyncResult> {
        let records = self.store.find_by_user(user_id).await?;

        let mut synced_stages = Vec::new();
        let mut failed = 0;

        for record in &records {
            for (key, stage) in &record.completed_stages {
                let Some((stage_number, learning_type)) = parse_stage_key(key) else {
                    warn!(user_id = %user_id, module_id = %record.module_id, stage_key = %key, "Unparsable stage key, skipping");
                    failed += 1;
                    continue;
                };

                let card_id = if stage.card_id.is_empty() {
                    record.module_id.clone()
                } else {
                    stage.card_id.clone()
                };

                let payload = SyncPayload {
                    module_id: record.module_id.clone(),
                    card_id,
                    learning_type: learning_type.to_string(),
                    stage: stage_number,
                    time_spent: stage.time_spent,
                    passed: true,
                    accuracy: stage.accuracy,
                };

                match self.remote.push_stage_completion(&payload, auth).await {
                    Ok(_) => synced_stages.push(format!("{}:{}", record.module_id, key)),
                    Err(e) => {
                        warn!(
                            user_id = %user_id,
                            module_id = %record.module_id,
                            stage_key = %key,
                            error = %e,
                            "Bulk sync push failed"
                        );
                        failed += 1;
                    }
                }
            }
        }

        let synced = synced_stages.len();
        info!(user_id = %user_id, synced, failed, "Bulk sync complete");

        Ok(BulkSyncResult {
            success: true,
            synced,
            failed,
            synced_stages,
            message: format!("Synced {} stages to web API", synced),
        })
    }
}
