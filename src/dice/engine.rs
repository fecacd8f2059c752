//! Roll orchestration: specification resolution, fault injection, batches.
//!
//! # Trial lifecycle
//! ```text
//! Scheduled → Delaying → Succeeded(face)
//!                      → Failed
//! ```
//! The delay is drawn and awaited before the fault draw, so a trial's span
//! always covers a variable processing time. Terminal states are final; a
//! trial is never retried.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::Instrument;

use crate::dice::batch::fan_out;
use crate::dice::error::{RollError, RollResult};
use crate::dice::types::{
    is_valid_batch_size, validate_identifier, BatchRoll, DieSpecification, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
use crate::observability::metrics::{self, TrialInProgress};
use crate::observability::TraceContext;
use crate::specs::SpecificationSource;

/// Terminal state of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Succeeded(u32),
    Failed,
}

impl TrialOutcome {
    pub fn value(self) -> Option<u32> {
        match self {
            TrialOutcome::Succeeded(v) => Some(v),
            TrialOutcome::Failed => None,
        }
    }
}

/// Resolves die specifications and executes single and batch rolls.
pub struct RollEngine<S> {
    source: S,
    max_delay: Duration,
}

impl<S: SpecificationSource> RollEngine<S> {
    /// `max_delay` bounds the simulated processing delay of every trial.
    pub fn new(source: S, max_delay: Duration) -> Self {
        Self { source, max_delay }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up a specification. Every lookup failure is reported as
    /// `SpecificationUnavailable`; the cause is logged by the source.
    pub async fn resolve_specification(
        &self,
        identifier: &str,
        ctx: &TraceContext,
    ) -> RollResult<DieSpecification> {
        self.source
            .fetch(identifier, ctx)
            .await
            .map_err(|cause| {
                tracing::error!(identifier = %identifier, cause = %cause, "Failed to get die specification");
                RollError::SpecificationUnavailable {
                    identifier: identifier.to_string(),
                    cause,
                }
            })
    }

    /// One trial: delay, then fault draw, then face selection.
    pub async fn roll_once(&self, spec: &DieSpecification) -> RollResult<u32> {
        match self.trial(spec).await {
            TrialOutcome::Succeeded(value) => Ok(value),
            TrialOutcome::Failed => {
                tracing::error!(
                    die_type = %spec.identifier(),
                    fault_probability = spec.fault_probability(),
                    "Die triggered error condition"
                );
                Err(RollError::DieFailure {
                    identifier: spec.identifier().to_string(),
                })
            }
        }
    }

    /// `count` concurrent trials, each in its own child span of `ctx`.
    ///
    /// All trials run to completion. Any failure fails the whole batch.
    pub async fn roll_batch(
        &self,
        spec: &DieSpecification,
        count: usize,
        ctx: &TraceContext,
    ) -> RollResult<BatchRoll> {
        check_batch_size(count)?;

        let outcomes = fan_out(count, |index| {
            let trial_ctx = ctx.child();
            let span = trial_ctx.span("roll_trial");
            span.record("trial", index);

            async move {
                let _in_progress = TrialInProgress::enter();
                let outcome = self.trial(spec).await;
                match outcome {
                    TrialOutcome::Succeeded(value) => {
                        tracing::info!(die_type = %spec.identifier(), roll_index = index, roll_value = value, "Batch trial completed");
                    }
                    TrialOutcome::Failed => {
                        tracing::error!(die_type = %spec.identifier(), roll_index = index, "Batch trial triggered error condition");
                    }
                }
                outcome
            }
            .instrument(span)
        })
        .await;

        let failed: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| **outcome == TrialOutcome::Failed)
            .map(|(index, _)| index)
            .collect();

        if !failed.is_empty() {
            return Err(RollError::BatchFailure {
                identifier: spec.identifier().to_string(),
                count,
                failed,
            });
        }

        Ok(BatchRoll::new(
            outcomes.into_iter().filter_map(TrialOutcome::value).collect(),
        ))
    }

    /// Resolve `identifier` and roll it once, recording outcome metrics.
    pub async fn roll(&self, identifier: &str, ctx: &TraceContext) -> RollResult<u32> {
        check_identifier(identifier)?;
        tracing::info!(die_type = %identifier, "Roll request received");

        let result = async {
            let spec = self.resolve_specification(identifier, ctx).await?;
            self.roll_once(&spec).await
        }
        .await;

        match &result {
            Ok(value) => {
                metrics::record_roll(identifier, Some(*value));
                tracing::info!(die_type = %identifier, roll_value = value, "Roll completed");
            }
            Err(_) => metrics::record_roll(die_label(identifier, &result), None),
        }
        result
    }

    /// Resolve `identifier` and roll it `count` times concurrently.
    ///
    /// Input is validated before the lookup, so a bad request never reaches
    /// the store.
    pub async fn roll_many(&self, identifier: &str, count: usize, ctx: &TraceContext) -> RollResult<BatchRoll> {
        check_identifier(identifier)?;
        check_batch_size(count)?;
        tracing::info!(die_type = %identifier, times = count, "Batch roll started");

        let start = Instant::now();
        let result = async {
            let spec = self.resolve_specification(identifier, ctx).await?;
            self.roll_batch(&spec, count, ctx).await
        }
        .await;
        let duration = start.elapsed();

        metrics::record_batch(die_label(identifier, &result), result.is_ok(), count, duration);
        match &result {
            Ok(batch) => tracing::info!(
                die_type = %identifier,
                times = count,
                total = batch.total,
                rolls = ?batch.rolls,
                duration_ms = duration.as_millis() as u64,
                "Batch roll completed"
            ),
            Err(e) => tracing::error!(die_type = %identifier, times = count, error = %e, "Batch roll failed"),
        }
        result
    }

    async fn trial(&self, spec: &DieSpecification) -> TrialOutcome {
        let delay = self.sample_delay();
        tokio::time::sleep(delay).await;

        // Keep the thread-local rng out of any await point.
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < spec.fault_probability() {
            return TrialOutcome::Failed;
        }
        match spec.faces().choose(&mut rng) {
            Some(&face) => TrialOutcome::Succeeded(face),
            None => TrialOutcome::Failed,
        }
    }

    fn sample_delay(&self) -> Duration {
        if self.max_delay.is_zero() {
            return Duration::ZERO;
        }
        let secs = rand::thread_rng().gen_range(0.0..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Unresolved dice share one metric series.
fn die_label<'a, T>(identifier: &'a str, result: &RollResult<T>) -> &'a str {
    match result {
        Err(RollError::SpecificationUnavailable { .. }) => metrics::UNRESOLVED_DIE,
        _ => identifier,
    }
}

pub fn check_identifier(identifier: &str) -> RollResult<()> {
    validate_identifier(identifier).map_err(|e| RollError::InvalidInput(e.to_string()))
}

pub fn check_batch_size(count: usize) -> RollResult<()> {
    if is_valid_batch_size(count) {
        Ok(())
    } else {
        Err(RollError::InvalidInput(format!(
            "count must be between {} and {}, got {}",
            MIN_BATCH_SIZE, MAX_BATCH_SIZE, count
        )))
    }
}
