//! Remote Sync Client
//!
//! HTTP client for the remote learning platform. Every call is a single
//! attempt with a fixed timeout: reads use the read timeout, stage pushes
//! the write timeout. Read failures never surface as errors; callers get
//! `None` or zeroed defaults instead.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::remote::types::{
    CompleteStageRequest, RemoteAck, RemoteError, RemoteLeaderboard, RemoteProgress, RemoteStats,
    SyncPayload,
};

/// Default base URL of the remote platform API
pub const DEFAULT_REMOTE_API_URL: &str = "https://irememberit.replit.app/api";

/// Configuration for the remote sync client
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    /// Base URL, e.g. `https://host/api`
    pub base_url: String,
    /// Timeout for progress/stats/leaderboard reads (default: 10 seconds)
    pub read_timeout: Duration,
    /// Timeout for stage pushes (default: 30 seconds)
    pub write_timeout: Duration,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REMOTE_API_URL.to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Trait for the remote authority (allows mocking in tests)
#[async_trait::async_trait]
pub trait RemoteSync: Send + Sync {
    /// Push one stage completion
    async fn push_stage_completion(
        &self,
        payload: &SyncPayload,
        auth: &str,
    ) -> Result<RemoteAck, RemoteError>;

    /// Remote progress for a pair, `None` on any failure
    async fn fetch_progress(
        &self,
        user_id: &str,
        module_id: &str,
        auth: Option<&str>,
    ) -> Option<RemoteProgress>;

    /// Remote stats for a user, zeroed on failure
    async fn fetch_stats(&self, user_id: &str, auth: Option<&str>) -> RemoteStats;

    /// Remote leaderboard, `None` on failure or when empty
    async fn fetch_leaderboard(
        &self,
        timeframe: &str,
        auth: Option<&str>,
    ) -> Option<RemoteLeaderboard>;
}

/// reqwest-backed remote client
pub struct RemoteSyncClient {
    config: RemoteClientConfig,
    http_client: reqwest::Client,
}

impl RemoteSyncClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(RemoteClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: RemoteClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("recall-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET a JSON document; any failure is reported as an error for the
    /// caller to log and absorb.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        auth: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let mut builder = self
            .http_client
            .get(url)
            .query(query)
            .timeout(self.config.read_timeout);
        if let Some(auth) = auth {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate(&text, 200),
            });
        }

        parse_body(&text)?.ok_or_else(|| RemoteError::Decode("empty body".to_string()))
    }

    /// Look up a user's rank by scanning the all-time leaderboard
    async fn lookup_rank(&self, user_id: &str, auth: Option<&str>) -> Option<i64> {
        let body = match self
            .get_json(
                &self.url("/mobile/leaderboard"),
                &[("timeframe", "alltime")],
                auth,
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not fetch rank from leaderboard");
                return None;
            }
        };

        let rank = body
            .get("leaderboard")
            .and_then(Value::as_array)?
            .iter()
            .find(|entry| entry.get("userId").map(id_to_string).as_deref() == Some(user_id))
            .and_then(|entry| entry.get("rank"))
            .and_then(as_integer);

        if let Some(rank) = rank {
            debug!(user_id = %user_id, rank, "Resolved rank from remote leaderboard");
        }
        rank
    }

    /// Check whether an email has been verified.
    ///
    /// A 200 with an empty or non-JSON body means "not verified yet".
    pub async fn check_verification(&self, body: &Value) -> Result<Value, RemoteError> {
        let response = self
            .http_client
            .post(self.url("/auth/check-verification"))
            .json(body)
            .timeout(self.config.read_timeout)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        match parse_body(&text) {
            Ok(Some(value)) => Ok(value),
            Ok(None) | Err(_) => {
                debug!(status = status.as_u16(), "Verification check returned no JSON, treating as unverified");
                Ok(not_verified())
            }
        }
    }
}

impl Default for RemoteSyncClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RemoteSync for RemoteSyncClient {
    async fn push_stage_completion(
        &self,
        payload: &SyncPayload,
        auth: &str,
    ) -> Result<RemoteAck, RemoteError> {
        let response = self
            .http_client
            .post(self.url("/mobile/sync/complete-stage"))
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&CompleteStageRequest::from(payload))
            .timeout(self.config.write_timeout)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status != reqwest::StatusCode::OK {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate(&text, 200),
            });
        }

        let points_awarded = parse_body(&text)
            .ok()
            .flatten()
            .and_then(|body| body.get("pointsAwarded").and_then(as_integer));

        Ok(RemoteAck { points_awarded })
    }

    async fn fetch_progress(
        &self,
        user_id: &str,
        module_id: &str,
        auth: Option<&str>,
    ) -> Option<RemoteProgress> {
        let url = self.url(&format!(
            "/mobile/progress/{}/{}",
            urlencoding::encode(user_id),
            urlencoding::encode(module_id)
        ));

        let body = match self.get_json(&url, &[], auth).await {
            Ok(body) => body,
            Err(e) => {
                warn!(user_id = %user_id, module_id = %module_id, error = %e, "Remote progress unavailable");
                return None;
            }
        };

        match serde_json::from_value::<RemoteProgress>(body) {
            Ok(progress) => {
                info!(user_id = %user_id, module_id = %module_id, "Fetched progress from remote API");
                Some(progress)
            }
            Err(e) => {
                warn!(user_id = %user_id, module_id = %module_id, error = %e, "Remote progress has unexpected shape");
                None
            }
        }
    }

    async fn fetch_stats(&self, user_id: &str, auth: Option<&str>) -> RemoteStats {
        let url = self.url(&format!("/mobile/stats/{}", urlencoding::encode(user_id)));

        let mut stats = match self.get_json(&url, &[], auth).await {
            Ok(body) => {
                let points = body.get("points");
                let field = |name: &str| points.and_then(|p| p.get(name));
                RemoteStats {
                    total_points: field("total").and_then(as_integer).unwrap_or(0),
                    weekly_points: field("weekly").and_then(as_integer).unwrap_or(0),
                    rank: field("rank").and_then(as_integer),
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Remote stats unavailable, using local fallback");
                RemoteStats::default()
            }
        };

        if let Some(rank) = self.lookup_rank(user_id, auth).await {
            stats.rank = Some(rank);
        }

        stats
    }

    async fn fetch_leaderboard(
        &self,
        timeframe: &str,
        auth: Option<&str>,
    ) -> Option<RemoteLeaderboard> {
        let body = match self
            .get_json(
                &self.url("/mobile/leaderboard"),
                &[("timeframe", timeframe)],
                auth,
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(timeframe = %timeframe, error = %e, "Remote leaderboard unavailable");
                return None;
            }
        };

        let leaderboard: RemoteLeaderboard = match serde_json::from_value(body) {
            Ok(lb) => lb,
            Err(e) => {
                warn!(timeframe = %timeframe, error = %e, "Remote leaderboard has unexpected shape");
                return None;
            }
        };

        if leaderboard.leaderboard.is_empty() {
            debug!(timeframe = %timeframe, "Remote leaderboard is empty");
            return None;
        }

        info!(
            timeframe = %timeframe,
            entries = leaderboard.leaderboard.len(),
            "Using remote leaderboard"
        );
        Some(leaderboard)
    }
}

/// Parse a response body; blank bodies are `Ok(None)`
fn parse_body(text: &str) -> Result<Option<Value>, RemoteError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

fn not_verified() -> Value {
    serde_json::json!({
        "verified": false,
        "message": "Email not verified yet"
    })
}

/// Remote ids may be numbers or strings
fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RemoteSyncClient {
        RemoteSyncClient::with_config(RemoteClientConfig {
            base_url: server.uri(),
            read_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_millis(500),
        })
    }

    fn payload() -> SyncPayload {
        SyncPayload {
            module_id: "m1".into(),
            card_id: "c1".into(),
            learning_type: "verbal".into(),
            stage: 1,
            time_spent: 20,
            passed: true,
            accuracy: 80.0,
        }
    }

    #[tokio::test]
    async fn test_push_translates_learning_type_and_forwards_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mobile/sync/complete-stage"))
            .and(header("Authorization", "Bearer abc"))
            .and(body_json(json!({
                "moduleId": "m1",
                "cardId": "c1",
                "learningType": "verbal-speaking",
                "stage": 1,
                "timeSpent": 20,
                "passed": true,
                "accuracy": 80.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pointsAwarded": 15})))
            .expect(1)
            .mount(&server)
            .await;

        let ack = client_for(&server)
            .push_stage_completion(&payload(), "Bearer abc")
            .await
            .unwrap();
        assert_eq!(ack.points_awarded, Some(15));
    }

    #[tokio::test]
    async fn test_push_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mobile/sync/complete-stage"))
            .respond_with(ResponseTemplate::new(403).set_body_string("stage locked"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .push_stage_completion(&payload(), "Bearer abc")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_fetch_progress_returns_none_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/progress/u1/m1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_progress("u1", "m1", None).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_progress_returns_none_on_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/progress/u1/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_progress("u1", "m1", None).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_progress_returns_none_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/progress/u1/m1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"completedStages": {}}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_progress("u1", "m1", None).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_progress_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/progress/u1/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userId": "u1",
                "moduleId": "m1",
                "completedStages": {"1-fill_blank": {"pointsEarned": 10}},
                "totalPoints": 10,
                "highestStage": 1
            })))
            .mount(&server)
            .await;

        let progress = client_for(&server)
            .fetch_progress("u1", "m1", None)
            .await
            .unwrap();
        assert_eq!(progress.0["totalPoints"], 10);
        assert!(progress.0["completedStages"]
            .as_object()
            .unwrap()
            .contains_key("1-fill_blank"));
    }

    #[tokio::test]
    async fn test_fetch_progress_keeps_unusual_field_types() {
        let server = MockServer::start().await;
        let body = json!({
            "userId": 7,
            "completedStages": {},
            "totalPoints": 12.5,
            "lastAccessed": 1700000000
        });
        Mock::given(method("GET"))
            .and(path("/mobile/progress/u1/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let progress = client_for(&server)
            .fetch_progress("u1", "m1", None)
            .await
            .unwrap();
        assert_eq!(serde_json::to_value(&progress).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_stats_reads_points_and_resolves_rank() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/stats/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "points": {"total": 120, "weekly": 30, "rank": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mobile/leaderboard"))
            .and(query_param("timeframe", "alltime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "leaderboard": [
                    {"userId": 3, "rank": 1},
                    {"userId": 7, "rank": 2}
                ]
            })))
            .mount(&server)
            .await;

        let stats = client_for(&server).fetch_stats("7", None).await;
        assert_eq!(
            stats,
            RemoteStats {
                total_points: 120,
                weekly_points: 30,
                rank: Some(2)
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_stats_defaults_when_remote_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let stats = client_for(&server).fetch_stats("u1", None).await;
        assert_eq!(stats, RemoteStats::default());
    }

    #[tokio::test]
    async fn test_fetch_leaderboard_empty_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/leaderboard"))
            .and(query_param("timeframe", "weekly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"leaderboard": []})))
            .mount(&server)
            .await;

        assert!(client_for(&server)
            .fetch_leaderboard("weekly", None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_fetch_leaderboard_blank_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/leaderboard"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        assert!(client_for(&server)
            .fetch_leaderboard("alltime", None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_fetch_leaderboard_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mobile/leaderboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "leaderboard": [{"userId": "a", "rank": 1, "totalPoints": 50}],
                "timeframe": "alltime"
            })))
            .mount(&server)
            .await;

        let lb = client_for(&server)
            .fetch_leaderboard("alltime", None)
            .await
            .unwrap();
        assert_eq!(lb.leaderboard.len(), 1);
        assert_eq!(lb.extra.get("timeframe").unwrap(), "alltime");
    }

    #[tokio::test]
    async fn test_check_verification_empty_body_is_not_verified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/check-verification"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .check_verification(&json!({"email": "a@b.c"}))
            .await
            .unwrap();
        assert_eq!(result["verified"], false);
    }

    #[tokio::test]
    async fn test_check_verification_propagates_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/check-verification"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .check_verification(&json!({"email": "a@b.c"}))
            .await
            .unwrap_err();
        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such user");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncate_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
