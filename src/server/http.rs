//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::progress::{
    BulkSync, CompletionRecorder, LeaderboardService, ProgressMerger, ProgressStore,
    StatsAggregator,
};
use crate::remote::{RemoteClientConfig, RemoteSync, RemoteSyncClient};
use crate::routes::{self, ProgressRoute};
use crate::types::BridgeError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Local progress cache (MongoDB, or in-memory in dev mode)
    pub store: Arc<dyn ProgressStore>,
    /// Client used for the verification passthrough
    pub verifier: Arc<RemoteSyncClient>,
    pub recorder: CompletionRecorder,
    pub merger: ProgressMerger,
    pub stats: StatsAggregator,
    pub leaderboard: LeaderboardService,
    pub bulk_sync: BulkSync,
}

impl AppState {
    /// Create AppState talking to the configured remote API
    pub fn new(args: Args, store: Arc<dyn ProgressStore>) -> Self {
        let client = Arc::new(RemoteSyncClient::with_config(remote_config(&args)));
        let remote: Arc<dyn RemoteSync> = client.clone();
        Self::build(args, store, remote, client)
    }

    /// Create AppState with an injected remote (tests, alternative transports)
    pub fn with_remote(
        args: Args,
        store: Arc<dyn ProgressStore>,
        remote: Arc<dyn RemoteSync>,
    ) -> Self {
        let verifier = Arc::new(RemoteSyncClient::with_config(remote_config(&args)));
        Self::build(args, store, remote, verifier)
    }

    fn build(
        args: Args,
        store: Arc<dyn ProgressStore>,
        remote: Arc<dyn RemoteSync>,
        verifier: Arc<RemoteSyncClient>,
    ) -> Self {
        let recorder = CompletionRecorder::new(store.clone(), remote.clone())
            .with_detached_replay(args.detach_replay)
            .with_max_stage(args.max_stage);
        let merger = ProgressMerger::new(store.clone(), remote.clone());
        let stats = StatsAggregator::new(store.clone(), remote.clone());
        let leaderboard = LeaderboardService::new(store.clone(), remote.clone())
            .with_scan_limit(args.leaderboard_scan_limit);
        let bulk_sync = BulkSync::new(store.clone(), remote);

        Self {
            args,
            store,
            verifier,
            recorder,
            merger,
            stats,
            leaderboard,
            bulk_sync,
        }
    }
}

fn remote_config(args: &Args) -> RemoteClientConfig {
    RemoteClientConfig {
        base_url: args.remote_base_url().to_string(),
        read_timeout: args.read_timeout(),
        write_timeout: args.write_timeout(),
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), BridgeError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "recall-bridge listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    info!(
        "Progress store: {}, remote API: {}",
        state.store.backend(),
        state.args.remote_base_url()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }
    if state.args.detach_replay {
        info!("Progressive replay runs detached from the request");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let auth = routes::authorization(req.headers());

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method.clone(), path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - 200 once the durable store is connected
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, "/api/progress/save") => {
            let body = req.into_body().collect().await?.to_bytes();
            routes::handle_save_progress(Arc::clone(&state), auth.as_deref(), &body).await
        }

        (Method::GET, "/api/proxy/mobile/leaderboard") => {
            routes::handle_leaderboard(Arc::clone(&state), query.as_deref(), auth.as_deref())
                .await
        }

        (Method::POST, "/api/proxy/auth/check-verification") => {
            let body = req.into_body().collect().await?.to_bytes();
            routes::handle_check_verification(Arc::clone(&state), &body).await
        }

        (m, p) => match routes::match_progress_route(&m, p) {
            Some(ProgressRoute::Stats { user_id }) => {
                routes::handle_get_stats(Arc::clone(&state), &user_id, auth.as_deref()).await
            }
            Some(ProgressRoute::All { user_id }) => {
                routes::handle_get_all_progress(Arc::clone(&state), &user_id).await
            }
            Some(ProgressRoute::SyncAll { user_id }) => {
                routes::handle_sync_all(Arc::clone(&state), &user_id, auth.as_deref()).await
            }
            Some(ProgressRoute::Module { user_id, module_id }) => {
                routes::handle_get_progress(
                    Arc::clone(&state),
                    &user_id,
                    &module_id,
                    auth.as_deref(),
                )
                .await
            }
            None => routes::not_found(p),
        },
    };

    info!(
        "[{}] {} {} -> {}",
        addr,
        method,
        path,
        response.status().as_u16()
    );

    Ok(to_boxed(response))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
