//! Leaderboard proxy endpoint
//!
//! `GET /api/proxy/mobile/leaderboard?timeframe=...` serves the remote
//! leaderboard when it has entries and a locally computed one otherwise.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::progress::leaderboard::DEFAULT_TIMEFRAME;
use crate::routes::{bridge_error_response, json_response, query_param};
use crate::server::AppState;

pub async fn handle_leaderboard(
    state: Arc<AppState>,
    query: Option<&str>,
    auth: Option<&str>,
) -> Response<Full<Bytes>> {
    let timeframe = query_param(query, "timeframe")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string());

    match state.leaderboard.get_leaderboard(&timeframe, auth).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => bridge_error_response(e),
    }
}
