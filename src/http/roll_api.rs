//! Roll engine HTTP surface: `GET /roll` and `GET /roll-batch`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::dice::RollEngine;
use crate::http::response::ApiError;
use crate::observability::InboundTrace;
use crate::specs::SpecificationSource;

pub const ROLL_PATH: &str = "/roll";
pub const ROLL_BATCH_PATH: &str = "/roll-batch";

/// Query of both roll endpoints. `count` is only read by `/roll-batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct RollQuery {
    pub die: String,
    #[serde(default, alias = "times")]
    pub count: Option<usize>,
}

/// `GET /roll` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollReply {
    pub roll: u32,
}

/// `GET /roll-batch` body. `rolls` is in request index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReply {
    pub total: u64,
    pub rolls: Vec<u32>,
    pub count: usize,
}

pub fn routes<S>(engine: Arc<RollEngine<S>>) -> Router
where
    S: SpecificationSource + 'static,
{
    Router::new()
        .route(ROLL_PATH, get(roll::<S>))
        .route(ROLL_BATCH_PATH, get(roll_batch::<S>))
        .with_state(engine)
}

async fn roll<S: SpecificationSource + 'static>(
    State(engine): State<Arc<RollEngine<S>>>,
    InboundTrace(ctx): InboundTrace,
    query: Result<Query<RollQuery>, QueryRejection>,
) -> Result<Json<RollReply>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::client_input(e.body_text()))?;

    let value = engine
        .roll(&query.die, &ctx)
        .instrument(ctx.span("roll"))
        .await?;
    Ok(Json(RollReply { roll: value }))
}

async fn roll_batch<S: SpecificationSource + 'static>(
    State(engine): State<Arc<RollEngine<S>>>,
    InboundTrace(ctx): InboundTrace,
    query: Result<Query<RollQuery>, QueryRejection>,
) -> Result<Json<BatchReply>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::client_input(e.body_text()))?;
    let count = query
        .count
        .ok_or_else(|| ApiError::client_input("missing query parameter 'count'"))?;

    let batch = engine
        .roll_many(&query.die, count, &ctx)
        .instrument(ctx.span("roll_batch"))
        .await?;
    Ok(Json(BatchReply {
        count: batch.count(),
        total: batch.total,
        rolls: batch.rolls,
    }))
}
