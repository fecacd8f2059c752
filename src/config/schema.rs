//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration shared by every service in the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Specification store service.
    pub spec_store: SpecStoreConfig,

    /// Roll engine service.
    pub engine: EngineConfig,

    /// Gateway/frontend service.
    pub gateway: GatewayConfig,

    /// Traffic simulator defaults.
    pub simulator: SimulatorConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Specification store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecStoreConfig {
    /// Bind address (e.g., "0.0.0.0:8100").
    pub bind_address: String,

    /// JSON file holding die specifications. Built-in dice when unset.
    pub specifications_path: Option<String>,

    /// Reload the specifications file when it changes on disk.
    pub watch: bool,
}

impl Default for SpecStoreConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8100".to_string(),
            specifications_path: None,
            watch: true,
        }
    }
}

/// Roll engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bind address.
    pub bind_address: String,

    /// Base URL of the specification store.
    pub spec_store_url: String,

    /// Bound on one specification lookup, in milliseconds.
    pub lookup_timeout_ms: u64,

    /// Upper bound of the simulated per-trial processing delay, in milliseconds.
    pub max_trial_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8101".to_string(),
            spec_store_url: "http://127.0.0.1:8100".to_string(),
            lookup_timeout_ms: 2_000,
            max_trial_delay_ms: 1_000,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address.
    pub bind_address: String,

    /// Base URL of the roll engine.
    pub engine_url: String,

    /// Base URL used to pre-fetch the list of known dice.
    pub catalog_url: String,

    /// Timeout for a single roll forwarded to the engine, in milliseconds.
    pub roll_timeout_ms: u64,

    /// Timeout for a batch roll forwarded to the engine, in milliseconds.
    pub batch_timeout_ms: u64,

    /// Timeout for the startup catalog fetch, in milliseconds.
    pub catalog_timeout_ms: u64,

    /// Identifiers offered when the catalog cannot be fetched.
    pub fallback_identifiers: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8108".to_string(),
            engine_url: "http://127.0.0.1:8101".to_string(),
            catalog_url: "http://127.0.0.1:8100".to_string(),
            roll_timeout_ms: 5_000,
            batch_timeout_ms: 10_000,
            catalog_timeout_ms: 3_000,
            fallback_identifiers: vec!["fair".to_string(), "risky".to_string()],
        }
    }
}

/// Traffic simulator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Base URL of the gateway.
    pub gateway_url: String,

    /// Number of concurrent simulated users.
    pub users: usize,

    /// Each user makes between 1 and this many requests.
    pub max_requests_per_user: usize,

    /// Probability that a request is a batch roll.
    pub batch_probability: f64,

    /// Largest batch a simulated user asks for.
    pub max_batch_size: usize,

    /// Dice picked uniformly per request (may include unknown ones).
    pub dice: Vec<String>,

    /// Minimum think time between requests, in milliseconds.
    pub min_think_ms: u64,

    /// Maximum think time between requests, in milliseconds.
    pub max_think_ms: u64,

    /// Client-side timeout per request, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8108".to_string(),
            users: 10,
            max_requests_per_user: 20,
            batch_probability: 0.3,
            max_batch_size: 10,
            dice: ["fair", "risky", "extreme", "unknown"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            min_think_ms: 500,
            max_think_ms: 2_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line, with trace fields.
    #[default]
    Json,
    /// Human-readable output for development.
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Serve Prometheus metrics at `GET /metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}
