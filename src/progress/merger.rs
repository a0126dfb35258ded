//! Progress Merger
//!
//! Builds the read-time view of a (user, module) pair. The remote copy is
//! authoritative; the local record only fills stage keys the remote does
//! not know yet. Merges never write back.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::progress::model::{stage_to_json, ProgressRecord, ProgressView};
use crate::progress::store::ProgressStore;
use crate::remote::{RemoteProgress, RemoteSync};
use crate::types::Result;

pub struct ProgressMerger {
    store: Arc<dyn ProgressStore>,
    remote: Arc<dyn RemoteSync>,
}

impl ProgressMerger {
    pub fn new(store: Arc<dyn ProgressStore>, remote: Arc<dyn RemoteSync>) -> Self {
        Self { store, remote }
    }

    /// Merged progress for a pair; remote and local are fetched concurrently
    pub async fn get_merged_progress(
        &self,
        user_id: &str,
        module_id: &str,
        auth: Option<&str>,
    ) -> Result<ProgressView> {
        let (remote, local) = futures::join!(
            self.remote.fetch_progress(user_id, module_id, auth),
            self.store.find(user_id, module_id)
        );

        let local = match local {
            Ok(local) => local,
            // A remote copy is still a complete answer without local data
            Err(e) if remote.is_some() => {
                warn!(user_id = %user_id, module_id = %module_id, error = %e, "Local progress unavailable, serving remote only");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(merge(user_id, module_id, remote, local.as_ref()))
    }
}

/// Remote-wins merge of one pair.
///
/// A remote copy is returned field for field as sent. Local stage entries
/// are added to `completedStages` only for keys the remote lacks, and only
/// when that field is an object or missing.
pub fn merge(
    user_id: &str,
    module_id: &str,
    remote: Option<RemoteProgress>,
    local: Option<&ProgressRecord>,
) -> ProgressView {
    let Some(RemoteProgress(mut view)) = remote else {
        return match local {
            Some(record) => {
                debug!(user_id = %user_id, module_id = %module_id, "Serving local progress");
                ProgressView::from_local(record)
            }
            None => ProgressView::empty(user_id, module_id),
        };
    };

    let Some(record) = local else {
        return ProgressView(view);
    };

    match view
        .entry("completedStages")
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(stages) => {
            let filled = fill_gaps(stages, record);
            if filled > 0 {
                debug!(user_id = %user_id, module_id = %module_id, filled, "Filled remote gaps from local progress");
            }
        }
        _ => {
            debug!(user_id = %user_id, module_id = %module_id, "Remote completedStages is not an object, left as sent");
        }
    }

    ProgressView(view)
}

fn fill_gaps(stages: &mut Map<String, Value>, record: &ProgressRecord) -> usize {
    let mut filled = 0;
    for (key, stage) in &record.completed_stages {
        if !stages.contains_key(key) {
            stages.insert(key.clone(), stage_to_json(stage));
            filled += 1;
        }
    }
    filled
}
