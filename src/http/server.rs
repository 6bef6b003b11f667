//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all edge handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Forward every request to the documentation origin
//! - Hand origin responses to the transform pipeline
//! - Swap in reloaded configuration without dropping connections
//!
//! # Design Decisions
//! - Each request loads the current config once and uses it throughout
//! - Origin failures become 502; transform failures never reach the client
//! - Connect and request timeouts are fixed at startup

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::http::request::{build_origin_request, MakeRequestUuidV4, RequestIdExt};
use crate::http::response::from_origin;
use crate::observability::metrics;
use crate::transform::ResponseAssembler;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<EdgeConfig>>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the edge transformer.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EdgeConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let router_config = config.clone();
        let state = AppState {
            config: Arc::new(ArcSwap::from_pointee(config)),
            client,
        };

        let router = Self::build_router(&router_config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let live = self.state.config.clone();
        tokio::spawn(async move {
            while let Some(next) = config_updates.recv().await {
                let current = live.load();
                if current.listener != next.listener || current.timeouts != next.timeouts {
                    tracing::warn!("Listener and timeout changes take effect after restart");
                }
                live.store(Arc::new(next));
                tracing::info!("Configuration applied");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward the request to the origin and transform the response.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let config = state.config.load_full();

    let request_id = request.request_id().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Forwarding request to origin"
    );

    let upstream = match build_origin_request(&config.origin, request) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Invalid origin URI");
            metrics::record_request(method.as_str(), 502, start_time);
            return (StatusCode::BAD_GATEWAY, "Invalid origin URI").into_response();
        }
    };

    let response = match state.client.request(upstream).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                origin = %config.origin.url,
                error = %e,
                "Origin request failed"
            );
            metrics::record_request(method.as_str(), 502, start_time);
            return (StatusCode::BAD_GATEWAY, "Origin request failed").into_response();
        }
    };

    let response = ResponseAssembler::new(config.transform.clone())
        .assemble(&path, from_origin(response))
        .await;

    let status = response.status().as_u16();
    tracing::debug!(
        request_id = %request_id,
        status,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status, start_time);
    response
}
