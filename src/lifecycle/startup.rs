//! Startup orchestration.
//!
//! # Responsibilities
//! - Build each service's state from its config section
//! - Start background tasks (spec file watcher, die list prefetch)
//! - Bind listeners and begin accepting traffic
//! - Bound the shutdown drain by the configured grace period
//!
//! # Design Decisions
//! - Fail fast on bad URLs and bind errors
//! - A missing or invalid specifications file is not fatal (empty store)
//! - Listeners start last (traffic only when ready)

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use url::Url;

use crate::config::{EngineConfig, GatewayConfig, PipelineConfig, SpecStoreConfig};
use crate::dice::RollEngine;
use crate::gateway::{spawn_prefetch, Gateway, KnownDice};
use crate::http::gateway_api::{self, GatewayState};
use crate::http::{roll_api, spec_api, HttpServer, UpstreamClient};
use crate::lifecycle::Shutdown;
use crate::specs::{SpecificationClient, SpecificationStore, SpecificationWatcher};

/// The three pipeline services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    SpecStore,
    Engine,
    Gateway,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::SpecStore => "spec-store",
            ServiceKind::Engine => "engine",
            ServiceKind::Gateway => "gateway",
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid URL in {field}: {source}")]
    Url {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("server error: {0}")]
    Server(#[from] io::Error),
}

/// Specification store routes plus the watcher that must outlive them.
pub struct SpecStoreApp {
    pub routes: Router,
    pub store: Arc<SpecificationStore>,
    pub watcher: Option<RecommendedWatcher>,
}

pub fn spec_store_app(config: &SpecStoreConfig) -> SpecStoreApp {
    let store = match &config.specifications_path {
        None => {
            tracing::info!("No specifications file configured, serving built-in dice");
            SpecificationStore::builtin()
        }
        Some(path) => match SpecificationStore::load_from_file(Path::new(path)) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to load specifications, starting with an empty store");
                SpecificationStore::empty()
            }
        },
    };
    let store = Arc::new(store);

    let watcher = match &config.specifications_path {
        Some(path) if config.watch => {
            match SpecificationWatcher::new(Path::new(path), store.clone()).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to watch specifications file, hot reload disabled");
                    None
                }
            }
        }
        _ => None,
    };

    SpecStoreApp {
        routes: spec_api::routes(store.clone()),
        store,
        watcher,
    }
}

pub fn engine_app(config: &EngineConfig) -> Result<Router, StartupError> {
    let store_url = parse_url("engine.spec_store_url", &config.spec_store_url)?;
    let source = SpecificationClient::new(
        UpstreamClient::new(),
        store_url,
        Duration::from_millis(config.lookup_timeout_ms),
    );
    let engine = RollEngine::new(source, Duration::from_millis(config.max_trial_delay_ms));

    tracing::info!(
        spec_store_url = %config.spec_store_url,
        lookup_timeout_ms = config.lookup_timeout_ms,
        max_trial_delay_ms = config.max_trial_delay_ms,
        "Roll engine configured"
    );
    Ok(roll_api::routes(Arc::new(engine)))
}

/// Gateway routes. Spawns the die list prefetch, so call inside a runtime.
pub fn gateway_app(config: &GatewayConfig) -> Result<Router, StartupError> {
    let engine_url = parse_url("gateway.engine_url", &config.engine_url)?;
    let catalog_url = parse_url("gateway.catalog_url", &config.catalog_url)?;

    let client = UpstreamClient::new();
    let known_dice = Arc::new(KnownDice::new(config.fallback_identifiers.clone()));
    let gateway = Gateway::new(
        client.clone(),
        engine_url,
        known_dice.clone(),
        Duration::from_millis(config.roll_timeout_ms),
        Duration::from_millis(config.batch_timeout_ms),
    );

    let catalog = SpecificationClient::new(client, catalog_url, Duration::from_millis(config.catalog_timeout_ms));
    spawn_prefetch(known_dice.clone(), catalog);

    Ok(gateway_api::routes(GatewayState {
        gateway: Arc::new(gateway),
        known_dice,
    }))
}

/// Build, bind and serve one service until `shutdown` fires.
pub async fn run_service(
    kind: ServiceKind,
    config: &PipelineConfig,
    metrics_handle: Option<PrometheusHandle>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let mut _watcher = None;
    let (address, routes) = match kind {
        ServiceKind::SpecStore => {
            let app = spec_store_app(&config.spec_store);
            _watcher = app.watcher;
            (&config.spec_store.bind_address, app.routes)
        }
        ServiceKind::Engine => (&config.engine.bind_address, engine_app(&config.engine)?),
        ServiceKind::Gateway => (&config.gateway.bind_address, gateway_app(&config.gateway)?),
    };

    let listener = TcpListener::bind(address.as_str())
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let server = HttpServer::new(kind.name(), routes, Duration::from_secs(config.timeouts.request_secs))
        .with_metrics(metrics_handle);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));
    let mut stop = shutdown.subscribe();

    tokio::select! {
        joined = &mut server_task => return server_result(joined),
        _ = stop.recv() => {}
    }

    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            tracing::warn!(
                service = kind.name(),
                grace_secs = grace.as_secs(),
                "Shutdown grace period elapsed, dropping remaining connections"
            );
            server_task.abort();
            Ok(())
        }
    }
}

fn server_result(joined: Result<io::Result<()>, JoinError>) -> Result<(), StartupError> {
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(StartupError::Server(io::Error::other(e.to_string()))),
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, StartupError> {
    Url::parse(value).map_err(|source| StartupError::Url { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_store_without_file() {
        let app = spec_store_app(&SpecStoreConfig::default());
        assert_eq!(app.store.list_identifiers(), vec!["extreme", "fair", "risky"]);
        assert!(app.watcher.is_none());
    }

    #[test]
    fn test_invalid_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dice.json");
        std::fs::write(&path, r#"{"bad": {"faces": [], "fault_probability": 0.0}}"#).unwrap();

        let app = spec_store_app(&SpecStoreConfig {
            specifications_path: Some(path.to_string_lossy().into_owned()),
            watch: false,
            ..SpecStoreConfig::default()
        });
        assert!(app.store.is_empty());
    }

    #[test]
    fn test_bad_engine_url_is_fatal() {
        let config = EngineConfig {
            spec_store_url: "not a url".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            engine_app(&config),
            Err(StartupError::Url { field: "engine.spec_store_url", .. })
        ));
    }

    #[tokio::test]
    async fn test_run_service_stops_on_shutdown() {
        let mut config = PipelineConfig::default();
        config.spec_store.bind_address = "127.0.0.1:0".into();
        let shutdown = Shutdown::new();

        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { run_service(ServiceKind::SpecStore, &config, None, shutdown).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
