//! Single forward attempt against one upstream.
//!
//! # Responsibilities
//! - Build the outbound request (`upstream address + path + ?query`)
//! - Enforce the connect budget (connector) and the read budget (per read)
//! - Classify failures as timeout or connection error
//!
//! # Design Decisions
//! - No retries here; policy lives in retries.rs
//! - The full response body is buffered; the attempt is whole or failed
//! - The read timeout bounds each wait for data, not the whole response, so a
//!   slow but steady upstream is not cut off
//! - One process-wide client (pool) shared with the health prober

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::{PoolConfig, TimeoutConfig};
use crate::load_balancer::Upstream;

/// Outbound pooled HTTP client.
pub type HttpClient = Client<HttpConnector, Body>;

/// A request as received from the client, ready to be replayed on any upstream.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path including the leading `/`.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Bodyless GET, as used for health probes.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// A complete upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Why a single attempt produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed reading response body: {0}")]
    Body(String),
}

impl ForwardError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Connection(_) => "connection",
            ForwardError::InvalidRequest(_) => "invalid_request",
            ForwardError::Body(_) => "body",
        }
    }
}

/// One attempt against one upstream.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn send(
        &self,
        upstream: &Upstream,
        request: &ProxyRequest,
    ) -> Result<UpstreamResponse, ForwardError>;
}

/// Build the shared client. The connector enforces the connect budget.
pub fn build_client(timeouts: &TimeoutConfig, pool: &PoolConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(timeouts.connect()));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(Duration::from_millis(pool.idle_timeout_ms))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(connector)
}

/// Forwarder backed by the pooled hyper client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: HttpClient,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(timeouts: &TimeoutConfig, pool: &PoolConfig) -> Self {
        Self {
            client: build_client(timeouts, pool),
            connect_timeout: timeouts.connect(),
            read_timeout: timeouts.read(),
        }
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn send(
        &self,
        upstream: &Upstream,
        request: &ProxyRequest,
    ) -> Result<UpstreamResponse, ForwardError> {
        let url = upstream.url_for(&request.path, request.query.as_deref());
        let mut outbound = Request::builder()
            .method(request.method.clone())
            .uri(url.as_str())
            .body(Body::from(request.body.clone()))
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;
        *outbound.headers_mut() = request.headers.clone();

        // The header wait includes connection setup when no pooled connection is idle;
        // the connector caps that part at `connect_timeout`.
        let read = self.read_timeout;
        let response = match timeout(read, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify(&e, self.connect_timeout)),
            Err(_) => return Err(ForwardError::Timeout(read)),
        };

        let (parts, mut body) = response.into_parts();
        let mut buf = Vec::new();
        loop {
            match timeout(read, body.frame()).await {
                Ok(Some(Ok(frame))) => {
                    if let Ok(data) = frame.into_data() {
                        buf.extend_from_slice(&data);
                    }
                }
                Ok(Some(Err(e))) => return Err(ForwardError::Body(e.to_string())),
                Ok(None) => break,
                Err(_) => return Err(ForwardError::Timeout(read)),
            }
        }
        let body = Bytes::from(buf);

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Map a client error, surfacing connect timeouts as timeouts.
fn classify(error: &hyper_util::client::legacy::Error, connect_timeout: Duration) -> ForwardError {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    let mut chain = error.to_string();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return ForwardError::Timeout(connect_timeout);
            }
        }
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    ForwardError::Connection(chain)
}
