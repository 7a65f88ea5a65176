//! Reverse proxy to local HTTP endpoints on Unix sockets

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper_util::rt::TokioIo;
use thiserror::Error;

/// Headers that describe a single hop and must not be forwarded
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Errors while forwarding a request
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Could not connect to the upstream socket
    #[error("dial {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP exchange with the upstream failed
    #[error("{0}")]
    Http(#[from] hyper::Error),

    /// The request target could not be rewritten
    #[error("invalid request target: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    /// Unix sockets are unavailable on this platform
    #[error("unix sockets not supported on this platform")]
    Unsupported,
}

/// Forwards requests to an HTTP server listening on a Unix socket
#[derive(Debug, Clone)]
pub struct UnixProxy {
    name: &'static str,
    socket: PathBuf,
    host: HeaderValue,
    extra_headers: HeaderMap,
}

impl UnixProxy {
    /// Create a proxy that sends requests to `socket` with `Host: host`
    pub fn new(name: &'static str, socket: PathBuf, host: &'static str) -> Self {
        Self {
            name,
            socket,
            host: HeaderValue::from_static(host),
            extra_headers: HeaderMap::new(),
        }
    }

    /// Add a header set on every forwarded request
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.extra_headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }

    /// Forward `req` and return the upstream response, or 502 on failure
    pub async fn forward(&self, req: Request) -> Response {
        match self.round_trip(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} proxy error: {}", self.name, e);
                (StatusCode::BAD_GATEWAY, format!("{}\n", e)).into_response()
            }
        }
    }

    async fn round_trip(&self, req: Request) -> Result<Response, ProxyError> {
        let req = self.prepare(req)?;
        let io = self.open().await?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        let name = self.name;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("{} upstream connection ended: {}", name, e);
            }
        });

        let mut response = sender.send_request(req).await?;
        strip_hop_by_hop(response.headers_mut());
        Ok(response.map(Body::new))
    }

    /// Rewrite an inbound request into one for the upstream.
    ///
    /// The target is reduced to origin form and the Host replaced, so the
    /// upstream sees a plain local request whatever the driver sent.
    fn prepare(&self, req: Request) -> Result<Request, ProxyError> {
        let (mut parts, body) = req.into_parts();

        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());
        parts.uri = target.parse::<Uri>()?;
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(header::HOST, self.host.clone());
        for (name, value) in &self.extra_headers {
            parts.headers.insert(name.clone(), value.clone());
        }

        Ok(Request::from_parts(parts, body))
    }

    #[cfg(unix)]
    async fn open(&self) -> Result<TokioIo<tokio::net::UnixStream>, ProxyError> {
        let stream = tokio::net::UnixStream::connect(&self.socket)
            .await
            .map_err(|source| ProxyError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        Ok(TokioIo::new(stream))
    }

    #[cfg(not(unix))]
    async fn open(&self) -> Result<TokioIo<tokio::io::DuplexStream>, ProxyError> {
        Err(ProxyError::Unsupported)
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use std::convert::Infallible;
    use tokio::net::UnixListener;

    /// Serve one connection on `path`, echoing the request line and headers
    async fn spawn_echo(path: PathBuf) {
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let service = service_fn(|req: hyper::Request<Incoming>| async move {
                let headers = req.headers();
                let text = format!(
                    "{} {}\nhost={}\nsec={}\nconn={}\nx-custom={}\n",
                    req.method(),
                    req.uri(),
                    headers.get("host").map(|v| v.to_str().unwrap()).unwrap_or("-"),
                    headers.get("sec-tailscale").map(|v| v.to_str().unwrap()).unwrap_or("-"),
                    headers.get("x-drop-me").map(|v| v.to_str().unwrap()).unwrap_or("-"),
                    headers.get("x-custom").map(|v| v.to_str().unwrap()).unwrap_or("-"),
                );
                Ok::<_, Infallible>(
                    hyper::Response::builder()
                        .header("keep-alive", "timeout=5")
                        .body(Full::new(bytes::Bytes::from(text)))
                        .unwrap(),
                )
            });
            let _ = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await;
        });
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_forward_rewrites_target_and_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.sock");
        spawn_echo(path.clone()).await;

        let proxy = UnixProxy::new("localapi", path, "local-tailscaled.sock")
            .with_header("sec-tailscale", "localclient");

        let req = axum::http::Request::builder()
            .method("POST")
            .uri("http://driver.example/localapi/v0/status?peers=false")
            .header("host", "driver.example")
            .header("connection", "x-drop-me")
            .header("x-drop-me", "1")
            .header("x-custom", "kept")
            .body(Body::from("{}"))
            .unwrap();

        let response = proxy.forward(req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("keep-alive").is_none());
        assert_eq!(
            body_string(response).await,
            "POST /localapi/v0/status?peers=false\n\
             host=local-tailscaled.sock\n\
             sec=localclient\n\
             conn=-\n\
             x-custom=kept\n"
        );
    }

    #[tokio::test]
    async fn test_missing_socket_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let proxy = UnixProxy::new("gokrazy", dir.path().join("absent.sock"), "gokrazy");

        let req = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = proxy.forward(req).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_string(response).await.contains("absent.sock"));
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-secret"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ACCEPT));
    }
}
