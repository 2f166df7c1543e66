//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router accepting any path for the proxied methods
//! - Wire up middleware (tracing, request ID)
//! - Own the process-wide outbound pool and the health prober task
//! - Hand each request to the retry coordinator and return its result

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::BalancerConfig;
use crate::error::ProxyError;
use crate::health::HealthProber;
use crate::load_balancer::UpstreamRegistry;
use crate::observability::metrics;
use crate::resilience::{Forward, HttpForwarder, ProxyRequest, RetryCoordinator};

/// How long shutdown waits for the prober to finish its current cycle.
const PROBER_STOP_GRACE: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RetryCoordinator,
    pub max_body_bytes: usize,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    registry: Arc<UpstreamRegistry>,
    forwarder: Arc<dyn Forward>,
}

impl HttpServer {
    /// Create the registry and the shared outbound pool from configuration.
    pub fn new(config: BalancerConfig) -> Self {
        let forwarder: Arc<dyn Forward> =
            Arc::new(HttpForwarder::new(&config.timeouts, &config.pool));
        Self::with_forwarder(config, forwarder)
    }

    /// Like [`HttpServer::new`] with a caller-supplied forwarder.
    pub fn with_forwarder(config: BalancerConfig, forwarder: Arc<dyn Forward>) -> Self {
        let registry = Arc::new(UpstreamRegistry::new(config.upstreams.iter(), &config.breaker));
        let coordinator =
            RetryCoordinator::new(registry.clone(), forwarder.clone(), config.retries.max_attempts);

        let state = AppState {
            coordinator,
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            registry,
            forwarder,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", on(proxied_methods(), proxy_handler))
            .route("/{*path}", on(proxied_methods(), proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run until `shutdown` fires, then drain, stop the prober and release the pool.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let HttpServer {
            router,
            config,
            registry,
            forwarder,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstreams = registry.len(),
            "HTTP server starting"
        );

        // Dropping the guard on any early return aborts the prober.
        let prober = if config.health_check.enabled {
            Some(ProberTask::spawn(HealthProber::new(
                registry.clone(),
                forwarder.clone(),
                config.health_check.clone(),
            )))
        } else {
            tracing::info!("Health prober disabled");
            None
        };

        let admin = if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let app = setup_admin_router(AdminState {
                registry: registry.clone(),
                api_key: Arc::from(config.admin.api_key.as_str()),
            });
            let mut admin_shutdown = shutdown.resubscribe();
            Some(AdminTask::new(tokio::spawn(async move {
                axum::serve(admin_listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await
            })))
        } else {
            None
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(prober) = prober {
            prober.stop().await;
        }
        if let Some(admin) = admin {
            admin.join().await;
        }

        drop(forwarder);
        tracing::info!("HTTP server stopped, outbound pool released");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<UpstreamRegistry> {
        &self.registry
    }
}

/// Methods accepted on any path; everything else gets 405.
fn proxied_methods() -> MethodFilter {
    MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::PATCH)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::OPTIONS)
        .or(MethodFilter::HEAD)
}

/// Background prober owned by the server. Aborted on drop.
struct ProberTask {
    stop: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProberTask {
    fn spawn(prober: HealthProber) -> Self {
        let (stop, stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(prober.run(stop_rx));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    async fn stop(mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.as_mut() {
            match tokio::time::timeout(PROBER_STOP_GRACE, handle).await {
                Ok(_) => {
                    self.handle = None;
                }
                Err(_) => tracing::warn!("Health prober did not stop in time, aborting"),
            }
        }
    }
}

impl Drop for ProberTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Admin listener task owned by the server. Aborted on drop.
struct AdminTask {
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl AdminTask {
    fn new(handle: JoinHandle<std::io::Result<()>>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
                Err(e) => tracing::error!(error = %e, "Admin server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }
}

impl Drop for AdminTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Main proxy handler.
/// Buffers the body, runs the retry coordinator and returns its result verbatim.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let body = match Limited::new(body, state.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let error = if e.is::<LengthLimitError>() {
                ProxyError::PayloadTooLarge
            } else {
                ProxyError::InvalidRequestBody
            };
            tracing::warn!(method = %method, path = %parts.uri.path(), error = %e, "Failed to read request body");
            metrics::record_request(&method, error.status().as_u16(), "none", start_time);
            return error.into_response();
        }
    };

    let request = ProxyRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };

    tracing::debug!(method = %method, path = %request.path, "Proxying request");

    match state.coordinator.forward(request).await {
        Ok(proxied) => {
            let status = proxied.response.status;
            metrics::record_request(&method, status.as_u16(), proxied.upstream.address(), start_time);
            tracing::debug!(
                upstream = %proxied.upstream,
                status = %status,
                attempts = proxied.attempts,
                "Request proxied"
            );

            let mut response = Response::new(Body::from(proxied.response.body));
            *response.status_mut() = status;
            *response.headers_mut() = proxied.response.headers;
            response
        }
        Err(e) => {
            tracing::warn!(method = %method, path = %parts.uri.path(), error = %e, "Request failed");
            metrics::record_request(&method, e.status().as_u16(), "none", start_time);
            e.into_response()
        }
    }
}
