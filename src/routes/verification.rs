//! Email verification passthrough
//!
//! `POST /api/proxy/auth/check-verification` forwards the JSON body to the
//! remote platform. A successful call without a JSON body reads as "not
//! verified yet".

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::{error, warn};

use crate::remote::RemoteError;
use crate::routes::{error_response, json_response};
use crate::server::AppState;

pub async fn handle_check_verification(state: Arc<AppState>, body: &Bytes) -> Response<Full<Bytes>> {
    let payload: serde_json::Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid request body: {}", e),
                Some("BAD_REQUEST"),
            );
        }
    };

    match state.verifier.check_verification(&payload).await {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(RemoteError::Status { status, body }) => {
            warn!(status, "Verification check rejected by remote API");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            error_response(status, &body, Some("REMOTE_ERROR"))
        }
        Err(e) => {
            error!(error = %e, "Verification check failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
                Some("REMOTE_ERROR"),
            )
        }
    }
}
