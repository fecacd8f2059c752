//! Dice pipeline services.
//!
//! Runs one of the three services from a single binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   traffic-gen / browser
//!         │  GET /roll, /roll-batch   (traceparent)
//!         ▼
//!   ┌───────────┐  GET /roll, /roll-batch  ┌────────────┐  GET /specification  ┌────────────┐
//!   │  gateway  │ ───────────────────────▶ │   engine   │ ───────────────────▶ │ spec-store │
//!   │   :8108   │ ◀─────────────────────── │   :8101    │ ◀─────────────────── │   :8100    │
//!   └───────────┘   reply | error body     └────────────┘   spec | 404         └────────────┘
//!         │                                      │
//!         └── die list prefetch ────────────────────────────────────────────────────┘
//!
//!   every service: /health, /metrics, x-request-id, JSON logs with trace ids
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dice_pipeline::config::{load_or_default, validate_config, ConfigError, PipelineConfig};
use dice_pipeline::lifecycle::signals::spawn_signal_handler;
use dice_pipeline::lifecycle::{run_service, ServiceKind, Shutdown};
use dice_pipeline::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dice-pipeline", version)]
#[command(about = "Dice roll pipeline: specification store, roll engine and gateway", long_about = None)]
struct Cli {
    /// TOML config file. Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand)]
enum Service {
    /// Serve die specifications
    SpecStore {
        #[arg(long)]
        bind: Option<String>,
        /// JSON specifications file
        #[arg(long)]
        specifications: Option<String>,
    },
    /// Resolve specifications and execute rolls
    Engine {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        spec_store_url: Option<String>,
    },
    /// User-facing frontend forwarding to the engine
    Gateway {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        engine_url: Option<String>,
        #[arg(long)]
        catalog_url: Option<String>,
    },
}

impl Service {
    /// Fold command-line overrides into `config`.
    fn apply(self, config: &mut PipelineConfig) -> ServiceKind {
        match self {
            Service::SpecStore { bind, specifications } => {
                if let Some(bind) = bind {
                    config.spec_store.bind_address = bind;
                }
                if specifications.is_some() {
                    config.spec_store.specifications_path = specifications;
                }
                ServiceKind::SpecStore
            }
            Service::Engine { bind, spec_store_url } => {
                if let Some(bind) = bind {
                    config.engine.bind_address = bind;
                }
                if let Some(url) = spec_store_url {
                    config.engine.spec_store_url = url;
                }
                ServiceKind::Engine
            }
            Service::Gateway {
                bind,
                engine_url,
                catalog_url,
            } => {
                if let Some(bind) = bind {
                    config.gateway.bind_address = bind;
                }
                if let Some(url) = engine_url {
                    config.gateway.engine_url = url;
                }
                if let Some(url) = catalog_url {
                    config.gateway.catalog_url = url;
                }
                ServiceKind::Gateway
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    let kind = cli.service.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(
        service = kind.name(),
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "dice-pipeline starting"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder, /metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    run_service(kind, &config, metrics_handle, shutdown).await?;

    tracing::info!(service = kind.name(), "Shutdown complete");
    Ok(())
}
