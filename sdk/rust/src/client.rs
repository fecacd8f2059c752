use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TRACEPARENT: &str = "traceparent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResponse {
    pub roll: u32,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub total: u64,
    pub rolls: Vec<u32>,
    pub count: usize,
    pub trace_id: String,
}

/// Error body returned by every pipeline service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum SdkError {
    /// No HTTP response: connect failure, timeout, broken connection.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status} ({}): {}", body.error, body.detail)]
    Api { status: u16, body: ErrorResponse },

    /// A 2xx response whose body did not decode.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl SdkError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::Transport(e) if e.is_timeout())
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, SdkError::Transport(e) if e.is_connect())
    }
}

pub struct GatewayClient {
    client: Client,
    gateway_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self::with_client(Client::new(), gateway_url)
    }

    /// Client whose every request is bounded by `timeout`.
    pub fn with_timeout(gateway_url: &str, timeout: Duration) -> Result<Self, SdkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, gateway_url))
    }

    pub fn with_client(client: Client, gateway_url: &str) -> Self {
        Self {
            client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    /// Roll `die` once. `traceparent` continues the caller's trace when given.
    pub async fn roll(&self, die: &str, traceparent: Option<&str>) -> Result<RollResponse, SdkError> {
        let req = self
            .client
            .get(format!("{}/roll", self.gateway_url))
            .query(&[("die", die)]);
        send(with_trace(req, traceparent)).await
    }

    /// Roll `die` `count` times concurrently on the engine.
    pub async fn roll_batch(
        &self,
        die: &str,
        count: usize,
        traceparent: Option<&str>,
    ) -> Result<BatchResponse, SdkError> {
        let count = count.to_string();
        let req = self
            .client
            .get(format!("{}/roll-batch", self.gateway_url))
            .query(&[("die", die), ("count", count.as_str())]);
        send(with_trace(req, traceparent)).await
    }

    /// Identifiers the gateway currently offers.
    pub async fn dice(&self) -> Result<Vec<String>, SdkError> {
        #[derive(Deserialize)]
        struct Identifiers {
            identifiers: Vec<String>,
        }

        let list: Identifiers = send(self.client.get(format!("{}/dice", self.gateway_url))).await?;
        Ok(list.identifiers)
    }
}

fn with_trace(req: RequestBuilder, traceparent: Option<&str>) -> RequestBuilder {
    match traceparent {
        Some(value) => req.header(TRACEPARENT, value),
        None => req,
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, SdkError> {
    let resp: Response = req.send().await?;
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let body = serde_json::from_str::<ErrorResponse>(&text).unwrap_or(ErrorResponse {
            error: "unknown".to_string(),
            detail: text,
        });
        return Err(SdkError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&text).map_err(|e| SdkError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = GatewayClient::new("http://localhost:8108/");
        assert_eq!(client.gateway_url, "http://localhost:8108");
    }

    #[test]
    fn test_batch_response_decodes() {
        let resp: BatchResponse = serde_json::from_str(
            r#"{"total": 9, "rolls": [4, 5], "count": 2, "trace_id": "0af7651916cd43dd8448eb211c80319c"}"#,
        )
        .unwrap();
        assert_eq!(resp.rolls, vec![4, 5]);
        assert_eq!(resp.total, 9);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GatewayClient::new(&format!("http://{}", addr));
        let err = client.roll("fair", None).await.unwrap_err();
        assert!(err.is_connect(), "{:?}", err);
        assert_eq!(err.status(), None);
    }
}
