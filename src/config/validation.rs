//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, probabilities in [0,1])
//! - Check addresses and upstream URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::PipelineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "spec_store.bind_address", &config.spec_store.bind_address);
    check_addr(&mut errors, "engine.bind_address", &config.engine.bind_address);
    check_addr(&mut errors, "gateway.bind_address", &config.gateway.bind_address);

    check_url(&mut errors, "engine.spec_store_url", &config.engine.spec_store_url);
    check_url(&mut errors, "gateway.engine_url", &config.gateway.engine_url);
    check_url(&mut errors, "gateway.catalog_url", &config.gateway.catalog_url);
    check_url(&mut errors, "simulator.gateway_url", &config.simulator.gateway_url);

    check_positive(&mut errors, "engine.lookup_timeout_ms", config.engine.lookup_timeout_ms);
    check_positive(&mut errors, "gateway.roll_timeout_ms", config.gateway.roll_timeout_ms);
    check_positive(&mut errors, "gateway.batch_timeout_ms", config.gateway.batch_timeout_ms);
    check_positive(&mut errors, "gateway.catalog_timeout_ms", config.gateway.catalog_timeout_ms);
    check_positive(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    if config.gateway.fallback_identifiers.is_empty() {
        errors.push(ValidationError::new(
            "gateway.fallback_identifiers",
            "at least one fallback identifier is required",
        ));
    }
    for id in &config.gateway.fallback_identifiers {
        if let Err(e) = crate::dice::validate_identifier(id) {
            errors.push(ValidationError::new("gateway.fallback_identifiers", e.to_string()));
        }
    }

    let sim = &config.simulator;
    if sim.users == 0 {
        errors.push(ValidationError::new("simulator.users", "must be > 0"));
    }
    if sim.max_requests_per_user == 0 {
        errors.push(ValidationError::new("simulator.max_requests_per_user", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&sim.batch_probability) {
        errors.push(ValidationError::new(
            "simulator.batch_probability",
            format!("{} is outside [0, 1]", sim.batch_probability),
        ));
    }
    if sim.max_batch_size == 0 || sim.max_batch_size > crate::dice::MAX_BATCH_SIZE {
        errors.push(ValidationError::new(
            "simulator.max_batch_size",
            format!("must be within [1, {}]", crate::dice::MAX_BATCH_SIZE),
        ));
    }
    if sim.dice.is_empty() {
        errors.push(ValidationError::new("simulator.dice", "at least one die is required"));
    }
    if sim.min_think_ms > sim.max_think_ms {
        errors.push(ValidationError::new(
            "simulator.min_think_ms",
            "must not exceed simulator.max_think_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}'", value)));
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be > 0"));
    }
}
