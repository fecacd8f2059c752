//! Outbound HTTP calls to upstream services.
//!
//! # Responsibilities
//! - Issue GET requests with a hard deadline covering headers and body
//! - Inject the caller's trace context as `traceparent`
//! - Tell timeouts apart from connection failures
//!
//! # Design Decisions
//! - One pooled hyper client per service, shared via Clone
//! - No retries: every call is attempted exactly once
//! - Bodies are buffered (upstream payloads are small JSON documents)

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time;
use url::Url;

use crate::observability::TraceContext;

const MAX_UPSTREAM_BODY: usize = 1024 * 1024;
const USER_AGENT: &str = concat!("dice-pipeline/", env!("CARGO_PKG_VERSION"));

/// Why an upstream call produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("failed to read upstream body: {0}")]
    Body(String),
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client used for every service-to-service hop.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// GET `url`, carrying `ctx` as `traceparent`, bounded by `timeout`.
    pub async fn get(
        &self,
        url: &Url,
        ctx: &TraceContext,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;
        ctx.inject(request.headers_mut());

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| UpstreamError::Connect(e.to_string()))?;

            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), MAX_UPSTREAM_BODY)
                .await
                .map_err(|e| UpstreamError::Body(e.to_string()))?;

            Ok(UpstreamResponse {
                status: parts.status,
                body,
            })
        };

        match time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(timeout)),
        }
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join `path` onto `base` and set query pairs.
pub fn build_url(base: &Url, path: &str, query: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_build_url() {
        let base = Url::parse("http://store:8000/ignored?x=1").unwrap();
        let url = build_url(&base, "/specification", &[("identifier", "fair die")]);
        assert_eq!(url.as_str(), "http://store:8000/specification?identifier=fair+die");

        let list = build_url(&base, "/specification", &[]);
        assert_eq!(list.as_str(), "http://store:8000/specification");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::new();
        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let err = client
            .get(&url, &TraceContext::new_root(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Connect(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_timeout_and_traceparent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (head_tx, head_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = head_tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            // Never answer.
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = socket.shutdown().await;
        });

        let ctx = TraceContext::new_root();
        let client = UpstreamClient::new();
        let url = Url::parse(&format!("http://{}/slow", addr)).unwrap();
        let err = client
            .get(&url, &ctx, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::Timeout(Duration::from_millis(200)));

        let head = head_rx.await.unwrap().to_lowercase();
        assert!(head.contains(&format!("traceparent: {}", ctx.to_traceparent())), "{}", head);
    }
}
