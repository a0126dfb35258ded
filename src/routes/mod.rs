//! HTTP routes for recall-bridge

pub mod health;
pub mod leaderboard;
pub mod progress;
pub mod verification;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::BridgeError;

pub use health::{health_check, readiness_check, version_info};
pub use leaderboard::handle_leaderboard;
pub use progress::{
    handle_get_all_progress, handle_get_progress, handle_get_stats, handle_save_progress,
    handle_sync_all, match_progress_route, ProgressRoute,
};
pub use verification::handle_check_verification;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    code: Option<&str>,
) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(String::from),
        },
    )
}

/// Map a local failure to its HTTP response
pub(crate) fn bridge_error_response(err: BridgeError) -> Response<Full<Bytes>> {
    let code = err.code();
    let (status, body) = err.into_status_code_and_body();
    error_response(status, &body, Some(code))
}

pub(crate) fn not_found(path: &str) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        Some("NOT_FOUND"),
    )
}

/// Authorization header value, passed through verbatim
pub fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Decoded value of one query string parameter
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}
