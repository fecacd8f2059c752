//! Specification store HTTP surface: `GET /specification`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::http::response::ApiError;
use crate::observability::{metrics, InboundTrace};
use crate::specs::client::{IdentifierList, SpecificationEnvelope, SPECIFICATION_PATH};
use crate::specs::SpecificationStore;

#[derive(Debug, Deserialize)]
pub struct SpecificationQuery {
    pub identifier: Option<String>,
}

pub fn routes(store: Arc<SpecificationStore>) -> Router {
    Router::new()
        .route(SPECIFICATION_PATH, get(get_specification))
        .with_state(store)
}

/// Without `identifier`: the identifier list. With it: one specification or 404.
async fn get_specification(
    State(store): State<Arc<SpecificationStore>>,
    InboundTrace(ctx): InboundTrace,
    query: Result<Query<SpecificationQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::client_input(e.body_text()))?;

    let Some(identifier) = query.identifier else {
        metrics::record_spec_list();
        let identifiers = store.list_identifiers();
        tracing::info!(trace_id = %ctx.trace_id_hex(), count = identifiers.len(), "Listed die identifiers");
        return Ok(Json(IdentifierList { identifiers }).into_response());
    };

    match store.get(&identifier) {
        Some(spec) => {
            metrics::record_spec_requested(&identifier);
            tracing::info!(
                trace_id = %ctx.trace_id_hex(),
                identifier = %identifier,
                "Die specification served"
            );
            Ok(Json(SpecificationEnvelope {
                identifier,
                specification: spec.to_document(),
            })
            .into_response())
        }
        None => {
            metrics::record_spec_requested(metrics::UNRESOLVED_DIE);
            tracing::warn!(trace_id = %ctx.trace_id_hex(), identifier = %identifier, "Die specification not found");
            Err(ApiError::not_found(format!("Die '{}' not found", identifier)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::ErrorBody;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = routes(Arc::new(SpecificationStore::builtin()))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let (status, body) = get("/specification").await;
        assert_eq!(status, StatusCode::OK);
        let list: IdentifierList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.identifiers, vec!["extreme", "fair", "risky"]);
    }

    #[tokio::test]
    async fn test_get_known_die() {
        let (status, body) = get("/specification?identifier=risky").await;
        assert_eq!(status, StatusCode::OK);
        let envelope: SpecificationEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope.identifier, "risky");
        assert_eq!(envelope.specification.faces, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(envelope.specification.fault_probability, 0.1);
    }

    #[tokio::test]
    async fn test_unknown_die_is_404() {
        let (status, body) = get("/specification?identifier=missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "not_found");
    }

    #[tokio::test]
    async fn test_unknown_identifiers_do_not_become_labels() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        get("/specification?identifier=fair").await;
        for i in 0..5 {
            get(&format!("/specification?identifier=nobody-{}", i)).await;
        }

        let exposition = handle.render();
        assert!(!exposition.contains("nobody-"), "{}", exposition);
        assert!(exposition.contains(r#"identifier="fair""#), "{}", exposition);
        assert!(exposition.contains(r#"identifier="unresolved""#), "{}", exposition);
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let response = routes(Arc::new(SpecificationStore::empty()))
            .oneshot(Request::get("/specification").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let list: IdentifierList = serde_json::from_slice(&bytes).unwrap();
        assert!(list.identifiers.is_empty());
    }
}
