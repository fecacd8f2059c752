//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap a service's routes with the shared middleware stack
//! - Add `/health` and, when a recorder is installed, `/metrics`
//! - Bind to a listener and serve until shutdown is signalled
//!
//! # Design Decisions
//! - Every service (store, engine, gateway) is served the same way
//! - Layer order: request id → trace span → id echo → timeout
//! - Shutdown arrives on a broadcast channel so several servers can share it

use std::io;
use std::time::Duration;

use axum::{middleware, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer, track_metrics};

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}

/// One pipeline service bound to one listener.
pub struct HttpServer {
    service: &'static str,
    routes: Router,
    metrics_handle: Option<PrometheusHandle>,
    request_timeout: Duration,
}

impl HttpServer {
    /// Serve `routes` (state already applied) under the name `service`.
    pub fn new(service: &'static str, routes: Router, request_timeout: Duration) -> Self {
        Self {
            service,
            routes,
            metrics_handle: None,
            request_timeout,
        }
    }

    /// Expose `GET /metrics` from this recorder handle.
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics_handle = handle;
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let Self {
            service,
            routes,
            metrics_handle,
            request_timeout,
        } = self;

        let mut router = routes.route(
            "/health",
            get(move || async move {
                Json(HealthStatus {
                    status: "ok".to_string(),
                    service: service.to_string(),
                })
            }),
        );
        if let Some(handle) = metrics_handle {
            router = router.route("/metrics", get(move || std::future::ready(handle.render())));
        }

        router.route_layer(middleware::from_fn(track_metrics)).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(propagate_request_id_layer())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        let service = self.service;
        tracing::info!(service = service, address = %addr, "HTTP server starting");

        let app = self.into_router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(service = service, "Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!(service = service, "HTTP server stopped");
        Ok(())
    }
}
