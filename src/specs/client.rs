//! Network client for the specification store.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dice::{DieSpecification, SpecificationDocument};
use crate::http::client::{build_url, UpstreamClient, UpstreamError};
use crate::observability::{metrics, TraceContext};
use crate::specs::{LookupError, SpecificationSource};

/// Path of the store's lookup endpoint.
pub const SPECIFICATION_PATH: &str = "/specification";

/// `GET /specification` without an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierList {
    pub identifiers: Vec<String>,
}

/// `GET /specification?identifier=<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationEnvelope {
    pub identifier: String,
    pub specification: SpecificationDocument,
}

/// Resolves specifications from a remote store with a bounded timeout.
#[derive(Clone)]
pub struct SpecificationClient {
    client: UpstreamClient,
    base_url: Url,
    timeout: Duration,
}

impl SpecificationClient {
    pub fn new(client: UpstreamClient, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// Fetch the store's identifier list.
    pub async fn list(&self, ctx: &TraceContext) -> Result<Vec<String>, LookupError> {
        let url = build_url(&self.base_url, SPECIFICATION_PATH, &[]);
        let response = self.client.get(&url, ctx, self.timeout).await.map_err(lookup_error)?;
        if response.status != StatusCode::OK {
            return Err(LookupError::UnexpectedStatus(response.status.as_u16()));
        }
        let list: IdentifierList = response
            .json()
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        Ok(list.identifiers)
    }

    async fn lookup(&self, identifier: &str, ctx: &TraceContext) -> Result<DieSpecification, LookupError> {
        let url = build_url(&self.base_url, SPECIFICATION_PATH, &[("identifier", identifier)]);
        let response = self.client.get(&url, ctx, self.timeout).await.map_err(lookup_error)?;

        match response.status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(LookupError::NotFound),
            other => return Err(LookupError::UnexpectedStatus(other.as_u16())),
        }

        let envelope: SpecificationEnvelope = response
            .json()
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        if envelope.identifier != identifier {
            return Err(LookupError::Malformed(format!(
                "asked for '{}', store answered '{}'",
                identifier, envelope.identifier
            )));
        }

        DieSpecification::from_document(envelope.identifier, envelope.specification)
            .map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

impl SpecificationSource for SpecificationClient {
    async fn fetch(&self, identifier: &str, ctx: &TraceContext) -> Result<DieSpecification, LookupError> {
        tracing::info!(identifier = %identifier, "Querying die service for specification");
        let start = Instant::now();

        let result = self.lookup(identifier, ctx).await;
        let duration = start.elapsed();

        match &result {
            Ok(spec) => {
                metrics::record_lookup(identifier, "success", duration);
                tracing::info!(
                    identifier = %identifier,
                    faces = ?spec.faces(),
                    fault_probability = spec.fault_probability(),
                    duration_ms = duration.as_millis() as u64,
                    "Die specification retrieved from service"
                );
            }
            Err(e) => {
                metrics::record_lookup(metrics::UNRESOLVED_DIE, e.label(), duration);
                match e {
                    LookupError::NotFound => {
                        tracing::warn!(identifier = %identifier, "Die service does not know this die")
                    }
                    _ => tracing::error!(identifier = %identifier, error = %e, "Die service lookup failed"),
                }
            }
        }

        result
    }
}

fn lookup_error(e: UpstreamError) -> LookupError {
    match e {
        UpstreamError::Timeout(d) => LookupError::TimedOut(d),
        UpstreamError::Connect(msg) | UpstreamError::InvalidRequest(msg) => LookupError::Connection(msg),
        UpstreamError::Body(msg) => LookupError::Malformed(msg),
    }
}
