//! HTTP server: scrape endpoint, landing page and access logging.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, Registry, TextEncoder};
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

const WEBROOT: &str = r#"<html>
<head><title>Airbyte Exporter</title></head>
<body>
  <h1>Airbyte Exporter</h1>
  <p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

/// Error type for scrape endpoint failures.
#[derive(Debug)]
pub(crate) enum MetricsError {
    /// The blocking gather task failed to complete.
    Gather(tokio::task::JoinError),
    /// Text exposition encoding failed.
    Encode(prometheus::Error),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Gather(err) => write!(f, "metrics gather task: {err}"),
            MetricsError::Encode(err) => write!(f, "metrics encoding: {err}"),
        }
    }
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        error!(err = %self, "failed to render metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
    }
}

pub(crate) async fn handle_root() -> Html<&'static str> {
    Html(WEBROOT)
}

/// Serves the current metric samples in the text exposition format.
///
/// Gathering runs the collector's database queries, so it is moved off the
/// async workers onto the blocking pool.
pub(crate) async fn handle_metrics(
    State(registry): State<Arc<Registry>>,
) -> Result<Response, MetricsError> {
    let families = tokio::task::spawn_blocking(move || registry.gather())
        .await
        .map_err(MetricsError::Gather)?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(MetricsError::Encode)?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type())], buffer).into_response())
}

pub(crate) fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/metrics", get(handle_metrics))
        .with_state(registry)
        .layer(AccessLogLayer)
        .layer(CompressionLayer::new())
}

/// Error type for HTTP server failures. All variants are fatal.
#[derive(Debug)]
pub(crate) enum ServeError {
    /// The listen address could not be parsed.
    Addr(std::net::AddrParseError),
    /// Binding the listener failed.
    Bind(std::io::Error),
    /// The server terminated with an error.
    Serve(std::io::Error),
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeError::Addr(err) => write!(f, "server: invalid listen address: {err}"),
            ServeError::Bind(err) => write!(f, "server: bind: {err}"),
            ServeError::Serve(err) => write!(f, "server: {err}"),
        }
    }
}

impl std::error::Error for ServeError {}

/// Binds the listener and serves until externally terminated.
pub(crate) async fn serve(registry: Arc<Registry>, listen_addr: &str) -> Result<(), ServeError> {
    let addr: SocketAddr = listen_addr.parse().map_err(ServeError::Addr)?;

    let app = router(registry).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ServeError::Bind)?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.map_err(ServeError::Serve)
}

// ============================================================
// Access logging
// ============================================================

#[derive(Clone, Copy)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogService<S> {
    inner: S,
}

impl<S> tower::Service<Request> for AccessLogService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let client = req
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "-".to_owned());
        let t0 = Instant::now();

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            let latency_ms = t0.elapsed().as_millis() as u64;
            let status = response.status().as_u16();
            info!(client, status, latency_ms, "{method} {path}");
            Ok(response)
        })
    }
}
