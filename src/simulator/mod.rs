//! Synthetic traffic against the gateway.
//!
//! # Data Flow
//! ```text
//! preflight: GET /roll?die=fair (connection failure aborts)
//!     → N users, joined once
//!         each: k ∈ [1, max_requests] requests
//!             pick die, single or batch, root traceparent
//!             → gateway
//!             → Outcome
//!             think time
//!     → SimulationReport
//! ```

pub mod report;

use std::time::{Duration, Instant};

use dice_sdk::{GatewayClient, SdkError};
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::SimulatorConfig;
use crate::observability::TraceContext;

pub use report::{Outcome, SimulationReport};

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] SdkError),

    #[error("cannot connect to gateway at {url}: {reason}")]
    GatewayUnreachable { url: String, reason: String },
}

/// What one simulated request will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedRequest {
    Single { die: String },
    Batch { die: String, count: usize },
}

impl PlannedRequest {
    /// Draw a request from the configured mix.
    pub fn draw<R: Rng>(rng: &mut R, config: &SimulatorConfig) -> Self {
        let die = config
            .dice
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "fair".to_string());

        if rng.gen::<f64>() < config.batch_probability {
            let count = rng.gen_range(1..=config.max_batch_size.max(1));
            PlannedRequest::Batch { die, count }
        } else {
            PlannedRequest::Single { die }
        }
    }
}

/// Drives simulated users through the gateway.
pub struct TrafficSimulator {
    client: GatewayClient,
    config: SimulatorConfig,
}

impl TrafficSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        let client = GatewayClient::with_timeout(
            &config.gateway_url,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Ok(Self { client, config })
    }

    /// One fair roll. Only a connection failure is fatal.
    pub async fn preflight(&self) -> Result<(), SimulatorError> {
        tracing::info!(url = %self.config.gateway_url, "Connecting to frontend");
        match self.client.roll("fair", None).await {
            Ok(_) => {
                tracing::info!("Frontend available and responding to requests");
                Ok(())
            }
            Err(e) if e.is_connect() => Err(SimulatorError::GatewayUnreachable {
                url: self.config.gateway_url.clone(),
                reason: e.to_string(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Preflight roll failed, continuing anyway");
                Ok(())
            }
        }
    }

    /// Preflight, then run every user to completion.
    pub async fn run(&self) -> Result<SimulationReport, SimulatorError> {
        let start = Instant::now();
        tracing::info!(
            users = self.config.users,
            max_requests_per_user = self.config.max_requests_per_user,
            batch_probability = self.config.batch_probability,
            max_batch_size = self.config.max_batch_size,
            "Starting traffic generation"
        );

        self.preflight().await?;

        let mut seeds = StdRng::from_entropy();
        let users = (1..=self.config.users).map(|user_id| {
            let mut rng = StdRng::from_rng(&mut seeds).unwrap_or_else(|_| StdRng::from_entropy());
            let requests = rng.gen_range(1..=self.config.max_requests_per_user.max(1));
            self.simulate_user(user_id, requests, rng)
        });
        let per_user = join_all(users).await;

        let mut report = SimulationReport::default();
        for user in &per_user {
            report.merge(user);
        }
        report.duration = start.elapsed();

        tracing::info!(
            total = report.total(),
            success = report.success,
            die_failure = report.die_failure,
            unavailable = report.unavailable,
            timeout = report.timeout,
            client_error = report.client_error,
            transport_error = report.transport_error,
            duration_secs = report.duration.as_secs_f64(),
            "Traffic generation complete"
        );
        Ok(report)
    }

    async fn simulate_user(&self, user_id: usize, requests: usize, mut rng: StdRng) -> SimulationReport {
        let mut report = SimulationReport::default();

        for n in 1..=requests {
            let planned = PlannedRequest::draw(&mut rng, &self.config);
            let ctx = TraceContext::new_root();
            let traceparent = ctx.to_traceparent();

            let outcome = match &planned {
                PlannedRequest::Single { die } => {
                    report.single_rolls += 1;
                    let result = self.client.roll(die, Some(&traceparent)).await;
                    match &result {
                        Ok(reply) => tracing::info!(user_id, request = n, die_type = %die, roll_value = reply.roll, trace_id = %reply.trace_id, "Single roll"),
                        Err(e) => tracing::warn!(user_id, request = n, die_type = %die, error = %e, "Single roll failed"),
                    }
                    Outcome::of(&result)
                }
                PlannedRequest::Batch { die, count } => {
                    report.batch_rolls += 1;
                    let result = self.client.roll_batch(die, *count, Some(&traceparent)).await;
                    match &result {
                        Ok(reply) => tracing::info!(user_id, request = n, die_type = %die, times = count, total = reply.total, rolls = ?reply.rolls, trace_id = %reply.trace_id, "Batch roll"),
                        Err(e) => tracing::warn!(user_id, request = n, die_type = %die, times = count, error = %e, "Batch roll failed"),
                    }
                    Outcome::of(&result)
                }
            };
            report.record(outcome);

            let think = self.think_time(&mut rng);
            tokio::time::sleep(think).await;
        }

        tracing::info!(user_id, requests, "User finished all requests");
        report
    }

    fn think_time(&self, rng: &mut StdRng) -> Duration {
        let (min, max) = (self.config.min_think_ms, self.config.max_think_ms);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }
}
