//! User-facing gateway.
//!
//! # Data Flow
//! ```text
//! GET /roll, /roll-batch (caller's traceparent, if any)
//!     → http::gateway_api (parse query, continue trace)
//!     → Gateway::forward_* (inject traceparent, bounded timeout)
//!     → roll engine
//!     → reply + trace_id | forwarded engine error | 503 | 504
//! ```
//!
//! # Design Decisions
//! - Engine errors are relayed with their status and detail untouched
//! - No retries; one attempt per request
//! - The die list is advisory and never blocks a roll

pub mod catalog;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::http::client::{build_url, UpstreamClient, UpstreamError};
use crate::http::response::{ApiError, ErrorBody, ErrorKind};
use crate::http::roll_api::{BatchReply, RollReply, ROLL_BATCH_PATH, ROLL_PATH};
use crate::observability::{metrics, TraceContext};

pub use catalog::{spawn_prefetch, KnownDice};

/// Why a forwarded roll did not produce a reply.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Roll engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Roll engine unreachable: {0}")]
    Unreachable(String),

    /// The engine answered with a non-2xx status.
    #[error("Roll engine answered {status}: {}", body.detail)]
    Rejected { status: StatusCode, body: ErrorBody },

    #[error("Roll engine sent an unreadable response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout(_) => ApiError::new(ErrorKind::DownstreamTimeout, err.to_string()),
            GatewayError::Unreachable(_) | GatewayError::InvalidResponse(_) => {
                ApiError::new(ErrorKind::DownstreamUnreachable, err.to_string())
            }
            GatewayError::Rejected { status, body } => ApiError::forwarded(status, body),
        }
    }
}

/// An engine reply with the gateway's trace id attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traced<T> {
    #[serde(flatten)]
    pub reply: T,
    pub trace_id: String,
}

impl<T> Traced<T> {
    pub fn new(reply: T, ctx: &TraceContext) -> Self {
        Self {
            reply,
            trace_id: ctx.trace_id_hex(),
        }
    }
}

/// Forwards roll requests to the engine.
///
/// Callers validate `die` and `count` first; only dice in `known_dice` get
/// their own metric labels.
pub struct Gateway {
    client: UpstreamClient,
    engine_url: Url,
    known_dice: Arc<KnownDice>,
    roll_timeout: Duration,
    batch_timeout: Duration,
}

impl Gateway {
    pub fn new(
        client: UpstreamClient,
        engine_url: Url,
        known_dice: Arc<KnownDice>,
        roll_timeout: Duration,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            client,
            engine_url,
            known_dice,
            roll_timeout,
            batch_timeout,
        }
    }

    pub async fn forward_roll(&self, die: &str, ctx: &TraceContext) -> Result<Traced<RollReply>, GatewayError> {
        tracing::info!(die_type = %die, "Forwarding roll request to dice roller");
        let reply: RollReply = self
            .call(ROLL_PATH, &[("die", die)], die, self.roll_timeout, ctx)
            .await?;
        tracing::info!(die_type = %die, roll_value = reply.roll, "Roll successful");
        Ok(Traced::new(reply, ctx))
    }

    pub async fn forward_batch(
        &self,
        die: &str,
        count: usize,
        ctx: &TraceContext,
    ) -> Result<Traced<BatchReply>, GatewayError> {
        metrics::record_batch_request(count);
        tracing::info!(die_type = %die, times = count, "Forwarding batch roll request to dice roller");

        let count_param = count.to_string();
        let reply: BatchReply = self
            .call(
                ROLL_BATCH_PATH,
                &[("die", die), ("count", &count_param)],
                die,
                self.batch_timeout,
                ctx,
            )
            .await?;
        tracing::info!(die_type = %die, times = count, total = reply.total, "Batch roll successful");
        Ok(Traced::new(reply, ctx))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        die: &str,
        timeout: Duration,
        ctx: &TraceContext,
    ) -> Result<T, GatewayError> {
        let url = build_url(&self.engine_url, path, query);
        let label = self.known_dice.metric_label(die);
        let start = Instant::now();
        let result = self.client.get(&url, ctx, timeout).await;
        let duration = start.elapsed();

        let response = match result {
            Ok(response) => {
                metrics::record_backend(&label, response.status.as_u16().to_string(), duration);
                response
            }
            Err(UpstreamError::Timeout(limit)) => {
                metrics::record_backend(&label, "timeout".to_string(), duration);
                tracing::error!(die_type = %die, timeout_ms = limit.as_millis() as u64, "Timeout calling dice roller");
                return Err(GatewayError::Timeout(limit));
            }
            Err(e) => {
                metrics::record_backend(&label, "connection_error".to_string(), duration);
                tracing::error!(die_type = %die, error = %e, "Error calling dice roller");
                return Err(GatewayError::Unreachable(e.to_string()));
            }
        };

        if !response.status.is_success() {
            let body = response.json::<ErrorBody>().unwrap_or_else(|_| ErrorBody {
                error: "downstream_error".to_string(),
                detail: response.text(),
            });
            tracing::warn!(
                die_type = %die,
                status_code = response.status.as_u16(),
                detail = %body.detail,
                "Dice roller returned error"
            );
            return Err(GatewayError::Rejected {
                status: response.status,
                body,
            });
        }

        response
            .json::<T>()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}
