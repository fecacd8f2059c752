//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or built-in defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → each service takes the section it needs
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - One file describes the whole pipeline; each binary picks its section

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use schema::{
    EngineConfig, GatewayConfig, LogFormat, ObservabilityConfig, PipelineConfig, SimulatorConfig,
    SpecStoreConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
