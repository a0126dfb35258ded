//! Progress endpoints
//!
//! - `POST /api/progress/save` - record a stage completion
//! - `GET  /api/progress/{userId}/stats` - aggregated stats
//! - `GET  /api/progress/{userId}/all` - every local record of a user
//! - `POST /api/progress/{userId}/sync-all` - push all stored stages
//! - `GET  /api/progress/{userId}/{moduleId}` - merged module progress
//!
//! The fixed suffixes win over module ids, so a module literally named
//! `stats` or `all` cannot be read through the module route.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::progress::{ProgressView, StageCompletionEvent};
use crate::routes::{bridge_error_response, error_response, json_response};
use crate::server::AppState;

const PROGRESS_PREFIX: &str = "/api/progress/";

/// Parameterized progress routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressRoute {
    Stats { user_id: String },
    All { user_id: String },
    SyncAll { user_id: String },
    Module { user_id: String, module_id: String },
}

/// Match `/api/progress/{userId}/...` paths
pub fn match_progress_route(method: &Method, path: &str) -> Option<ProgressRoute> {
    let rest = path.strip_prefix(PROGRESS_PREFIX)?;
    let (user, tail) = rest.split_once('/')?;
    if user.is_empty() || tail.is_empty() || tail.contains('/') {
        return None;
    }

    let user_id = urlencoding::decode(user).ok()?.into_owned();

    match (method, tail) {
        (&Method::GET, "stats") => Some(ProgressRoute::Stats { user_id }),
        (&Method::GET, "all") => Some(ProgressRoute::All { user_id }),
        (&Method::POST, "sync-all") => Some(ProgressRoute::SyncAll { user_id }),
        (&Method::GET, module) => Some(ProgressRoute::Module {
            user_id,
            module_id: urlencoding::decode(module).ok()?.into_owned(),
        }),
        _ => None,
    }
}

#[derive(Serialize)]
struct AllProgressResponse {
    progress: Vec<ProgressView>,
}

#[derive(Serialize)]
struct SyncRejected {
    success: bool,
    message: &'static str,
}

/// `POST /api/progress/save`
pub async fn handle_save_progress(
    state: Arc<AppState>,
    auth: Option<&str>,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    let event: StageCompletionEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Rejected stage completion body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid request body: {}", e),
                Some("BAD_REQUEST"),
            );
        }
    };

    match state.recorder.record_completion(&event, auth).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => bridge_error_response(e),
    }
}

/// `GET /api/progress/{userId}/{moduleId}`
pub async fn handle_get_progress(
    state: Arc<AppState>,
    user_id: &str,
    module_id: &str,
    auth: Option<&str>,
) -> Response<Full<Bytes>> {
    match state
        .merger
        .get_merged_progress(user_id, module_id, auth)
        .await
    {
        Ok(view) => json_response(StatusCode::OK, &view),
        Err(e) => bridge_error_response(e),
    }
}

/// `GET /api/progress/{userId}/all`
pub async fn handle_get_all_progress(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    match state.store.find_by_user(user_id).await {
        Ok(records) => json_response(
            StatusCode::OK,
            &AllProgressResponse {
                progress: records.iter().map(ProgressView::from_local).collect(),
            },
        ),
        Err(e) => bridge_error_response(e),
    }
}

/// `GET /api/progress/{userId}/stats`
pub async fn handle_get_stats(
    state: Arc<AppState>,
    user_id: &str,
    auth: Option<&str>,
) -> Response<Full<Bytes>> {
    match state.stats.get_user_stats(user_id, auth).await {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => bridge_error_response(e),
    }
}

/// `POST /api/progress/{userId}/sync-all`
pub async fn handle_sync_all(
    state: Arc<AppState>,
    user_id: &str,
    auth: Option<&str>,
) -> Response<Full<Bytes>> {
    let Some(auth) = auth else {
        warn!(user_id = %user_id, "Bulk sync requested without authorization");
        return json_response(
            StatusCode::UNAUTHORIZED,
            &SyncRejected {
                success: false,
                message: "Authorization token required",
            },
        );
    };

    match state.bulk_sync.sync_all(user_id, auth).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => bridge_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::progress::test_support::{FailingStore, MockRemote};
    use crate::progress::{InMemoryProgressStore, ProgressStore};
    use clap::Parser;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    fn state_with(store: Arc<dyn ProgressStore>, remote: Arc<MockRemote>) -> Arc<AppState> {
        let args = Args::try_parse_from(["recall-bridge"]).unwrap();
        Arc::new(AppState::with_remote(args, store, remote))
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn save_body(stage: u32, points: u64) -> Bytes {
        Bytes::from(
            json!({
                "userId": "u1",
                "moduleId": "m1",
                "cardId": "c1",
                "stage": stage,
                "learningType": "fill_blank",
                "pointsEarned": points,
                "timeSpent": 30,
                "accuracy": 90.0
            })
            .to_string(),
        )
    }

    #[test]
    fn test_match_progress_routes() {
        assert_eq!(
            match_progress_route(&Method::GET, "/api/progress/u1/stats"),
            Some(ProgressRoute::Stats { user_id: "u1".into() })
        );
        assert_eq!(
            match_progress_route(&Method::GET, "/api/progress/u1/all"),
            Some(ProgressRoute::All { user_id: "u1".into() })
        );
        assert_eq!(
            match_progress_route(&Method::POST, "/api/progress/u1/sync-all"),
            Some(ProgressRoute::SyncAll { user_id: "u1".into() })
        );
        assert_eq!(
            match_progress_route(&Method::GET, "/api/progress/u%201/mod-7"),
            Some(ProgressRoute::Module {
                user_id: "u 1".into(),
                module_id: "mod-7".into()
            })
        );
    }

    #[test]
    fn test_match_progress_rejects_other_shapes() {
        assert_eq!(match_progress_route(&Method::GET, "/api/progress/u1"), None);
        assert_eq!(match_progress_route(&Method::GET, "/api/progress/u1/m1/x"), None);
        assert_eq!(match_progress_route(&Method::POST, "/api/progress/u1/m1"), None);
        assert_eq!(match_progress_route(&Method::GET, "/api/other/u1/m1"), None);
    }

    #[tokio::test]
    async fn test_save_then_resave() {
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(MockRemote::new()));

        let first = handle_save_progress(state.clone(), None, &save_body(1, 100)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["pointsAwarded"], 100);
        assert_eq!(first["alreadyCompleted"], false);

        let second = body_json(handle_save_progress(state, None, &save_body(1, 100)).await).await;
        assert_eq!(second["pointsAwarded"], 0);
        assert_eq!(second["alreadyCompleted"], true);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_input() {
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(MockRemote::new()));

        let zero_stage = handle_save_progress(state.clone(), None, &save_body(0, 10)).await;
        assert_eq!(zero_stage.status(), StatusCode::BAD_REQUEST);

        let mut bad_type = serde_json::from_slice::<Value>(&save_body(1, 10)).unwrap();
        bad_type["learningType"] = json!("essay");
        let response =
            handle_save_progress(state.clone(), None, &Bytes::from(bad_type.to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let garbage = handle_save_progress(state, None, &Bytes::from_static(b"not json")).await;
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_rejects_stage_above_max() {
        let remote = Arc::new(MockRemote::new());
        let state = state_with(Arc::new(InMemoryProgressStore::new()), remote.clone());

        let response =
            handle_save_progress(state.clone(), Some("Bearer t"), &save_body(u32::MAX, 10)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
        assert!(remote.pushes().is_empty());
        assert!(state.store.find("u1", "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_progress_serves_remote_as_sent() {
        let sent = json!({"userId": 7, "totalPoints": 12.5, "completedStages": {}});
        let remote = MockRemote {
            progress: Some(serde_json::from_value(sent.clone()).unwrap()),
            ..MockRemote::new()
        };
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(remote));

        let json = body_json(handle_get_progress(state, "u1", "m1", None).await).await;
        assert_eq!(json, sent);
    }

    #[tokio::test]
    async fn test_save_store_failure_is_500() {
        let state = state_with(Arc::new(FailingStore), Arc::new(MockRemote::new()));
        let response = handle_save_progress(state, None, &save_body(1, 10)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_save_with_auth_replays() {
        let remote = Arc::new(MockRemote::new());
        let state = state_with(Arc::new(InMemoryProgressStore::new()), remote.clone());

        handle_save_progress(state, Some("Bearer t"), &save_body(2, 10)).await;
        assert_eq!(remote.pushed_stages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_get_progress_empty_default() {
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(MockRemote::new()));
        let json = body_json(handle_get_progress(state, "u1", "m1", None).await).await;

        assert_eq!(
            json,
            json!({
                "userId": "u1",
                "moduleId": "m1",
                "completedStages": {},
                "totalPoints": 0,
                "highestStage": 1,
                "lastAccessed": null
            })
        );
    }

    #[tokio::test]
    async fn test_get_all_progress() {
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(MockRemote::new()));
        handle_save_progress(state.clone(), None, &save_body(1, 10)).await;

        let json = body_json(handle_get_all_progress(state, "u1").await).await;
        let progress = json["progress"].as_array().unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0]["totalPoints"], 10);
    }

    #[tokio::test]
    async fn test_stats_fall_back_to_local() {
        let state = state_with(Arc::new(InMemoryProgressStore::new()), Arc::new(MockRemote::new()));
        handle_save_progress(state.clone(), None, &save_body(1, 45)).await;

        let json = body_json(handle_get_stats(state, "u1", None).await).await;
        assert_eq!(
            json,
            json!({"totalPoints": 45, "weeklyPoints": 45, "rank": null, "userId": "u1"})
        );
    }

    #[tokio::test]
    async fn test_sync_all_requires_auth() {
        let remote = Arc::new(MockRemote::new());
        let state = state_with(Arc::new(InMemoryProgressStore::new()), remote.clone());
        handle_save_progress(state.clone(), None, &save_body(1, 10)).await;

        let response = handle_sync_all(state, "u1", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Authorization token required"})
        );
        assert!(remote.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_sync_all_pushes_stored_stages() {
        let remote = Arc::new(MockRemote::new());
        let state = state_with(Arc::new(InMemoryProgressStore::new()), remote.clone());
        handle_save_progress(state.clone(), None, &save_body(1, 10)).await;

        let json = body_json(handle_sync_all(state, "u1", Some("Bearer t")).await).await;
        assert_eq!(json["synced"], 1);
        assert_eq!(json["syncedStages"], json!(["m1:1-fill_blank"]));
        assert_eq!(json["message"], "Synced 1 stages to web API");
    }
}
