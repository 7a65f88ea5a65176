//! HTTP serving over any `Listener`
//!
//! The same accept loop serves the reverse-dial channel and the loopback
//! diagnostics socket. Each connection is served as HTTP/1.1 by hyper with an
//! axum router as the service, and every lifecycle transition is reported to
//! an optional `ConnStateHook`.

mod listener;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tower::ServiceExt;

use tta_core::error::ListenerError;
use tta_core::traits::{ConnStateHook, Listener};
use tta_core::{ConnId, ConnState};

pub use listener::{ChanListener, SENTINEL_ADDR};

/// Pause after a non-fatal accept error before accepting again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// HTTP/1.1 server generic over its connection source
pub struct HttpServer {
    name: &'static str,
    router: Router,
    hook: Option<Arc<dyn ConnStateHook>>,
}

impl HttpServer {
    /// Create a server; `name` only appears in logs
    pub fn new(name: &'static str, router: Router) -> Self {
        Self {
            name,
            router,
            hook: None,
        }
    }

    /// Report connection state transitions to `hook`
    pub fn with_conn_state(mut self, hook: Arc<dyn ConnStateHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Accept and serve connections until the listener closes.
    ///
    /// Always ends with the fatal accept error; transient accept errors are
    /// logged and retried.
    pub async fn serve<L: Listener>(self, mut listener: L) -> Result<(), ListenerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!("{} server listening on {}", self.name, local_addr);

        let mut next_id = 0u64;
        loop {
            let (io, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if e.is_fatal() => {
                    tracing::info!("{} server stopped: {}", self.name, e);
                    if let Err(close_err) = listener.close() {
                        tracing::debug!("{} listener close failed: {}", self.name, close_err);
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("{} server: {}", self.name, e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };

            let conn = ConnId(next_id);
            next_id += 1;
            report(&self.hook, conn, ConnState::New);

            tokio::spawn(serve_conn(
                self.name,
                io,
                peer,
                conn,
                self.router.clone(),
                self.hook.clone(),
            ));
        }
    }
}

fn report(hook: &Option<Arc<dyn ConnStateHook>>, conn: ConnId, state: ConnState) {
    tracing::trace!(%conn, %state, "connection state");
    if let Some(hook) = hook {
        hook.on_state(conn, state);
    }
}

async fn serve_conn<I>(
    name: &'static str,
    io: I,
    peer: SocketAddr,
    conn: ConnId,
    router: Router,
    hook: Option<Arc<dyn ConnStateHook>>,
) where
    I: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    tracing::debug!(%conn, "{} connection from {}", name, peer);

    let service_hook = hook.clone();
    let service = service_fn(move |req: Request<Incoming>| {
        let router = router.clone();
        let hook = service_hook.clone();
        async move {
            report(&hook, conn, ConnState::Active);
            let response: Result<Response, Infallible> = router.oneshot(req).await;
            report(&hook, conn, ConnState::Idle);
            response
        }
    });

    let result = http1::Builder::new()
        .serve_connection(TokioIo::new(io), service)
        .await;
    match result {
        Ok(()) => tracing::debug!(%conn, "{} connection from {} closed", name, peer),
        Err(e) => tracing::debug!(%conn, "{} connection from {} closed: {}", name, peer, e),
    }

    report(&hook, conn, ConnState::Closed);
}
