//! HTTP request dispatch
//!
//! Three routers share one set of handlers:
//! - `reverse_router` serves the dialed-out channel to the driver; requests
//!   marked with `X-TTA-GoKrazy: 1` go to the gokrazy endpoint, the rest to
//!   the agent router
//! - `agent_router` is the agent's own surface, including the local API proxy
//! - `diagnostics_router` is the loopback surface, without the proxy

mod cmd;
mod firewall;
mod proxy;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;

use crate::state::AgentState;

pub use cmd::{serve_cmd, EXEC_ERR_HEADER};
pub use firewall::{Firewall, FirewallBackend, Nftables};
pub use proxy::{ProxyError, UnixProxy};

/// Header that routes a request to the gokrazy endpoint
pub const GOKRAZY_HEADER: &str = "x-tta-gokrazy";

/// Router for the reverse-dial channel
pub fn reverse_router(state: Arc<AgentState>) -> Router {
    let agent = agent_router(Arc::clone(&state));
    Router::new().fallback(move |req: Request| dispatch(Arc::clone(&state), agent.clone(), req))
}

/// The agent's request surface
pub fn agent_router(state: Arc<AgentState>) -> Router {
    base_routes()
        .route("/localapi/", any(localapi))
        .route("/localapi/*rest", any(localapi))
        .with_state(state)
}

/// Loopback diagnostics surface: the agent router minus the proxy
pub fn diagnostics_router(state: Arc<AgentState>) -> Router {
    base_routes().with_state(state)
}

fn base_routes() -> Router<Arc<AgentState>> {
    Router::new()
        .route("/up", get(up))
        .route("/fw", get(add_firewall).post(add_firewall))
        .route("/logs", get(logs))
        .fallback(banner)
}

async fn dispatch(state: Arc<AgentState>, agent: Router, req: Request) -> Response {
    if wants_gokrazy(req.headers()) {
        return state.gokrazy.forward(req).await;
    }
    match agent.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

fn wants_gokrazy(headers: &HeaderMap) -> bool {
    headers.get(GOKRAZY_HEADER).is_some_and(|v| v == "1")
}

/// Plain-text error response with a trailing newline
fn text_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{}\n", message),
    )
        .into_response()
}

async fn banner() -> &'static str {
    "TTA\n"
}

async fn up(State(state): State<Arc<AgentState>>) -> Response {
    match state.config.up_program() {
        Some((program, args)) => serve_cmd(program, args).await,
        None => text_error(StatusCode::INTERNAL_SERVER_ERROR, "no up command configured"),
    }
}

async fn add_firewall(State(state): State<Arc<AgentState>>) -> Response {
    match &state.firewall {
        Firewall::Unsupported => {
            text_error(StatusCode::INTERNAL_SERVER_ERROR, "firewall not supported")
        }
        Firewall::Supported(backend) => match backend.apply().await {
            Ok(()) => "OK\n".into_response(),
            Err(e) => {
                tracing::warn!("Firewall setup failed: {:#}", e);
                text_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{:#}", e))
            }
        },
    }
}

async fn logs(State(state): State<Arc<AgentState>>) -> Response {
    (
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Bytes::from(state.log_buffer.contents()),
    )
        .into_response()
}

async fn localapi(State(state): State<Arc<AgentState>>, req: Request) -> Response {
    let uri = req.uri().clone();
    tracing::info!("Got localapi request: {}", uri);
    let start = Instant::now();
    let response = state.localapi.forward(req).await;
    tracing::info!("Did localapi request in {:?}: {}", start.elapsed(), uri);
    response
}
