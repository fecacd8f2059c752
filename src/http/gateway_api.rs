//! Gateway HTTP surface: `/roll`, `/roll-batch`, `/dice` and the HTML page.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use tracing::Instrument;

use crate::dice::{check_batch_size, check_identifier};
use crate::gateway::{Gateway, KnownDice, Traced};
use crate::http::response::ApiError;
use crate::http::roll_api::{BatchReply, RollQuery, RollReply, ROLL_BATCH_PATH, ROLL_PATH};
use crate::observability::{metrics, InboundTrace};
use crate::specs::client::IdentifierList;

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
    pub known_dice: Arc<KnownDice>,
}

pub fn routes(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/dice", get(list_dice))
        .route(ROLL_PATH, get(roll))
        .route(ROLL_BATCH_PATH, get(roll_batch))
        .with_state(state)
}

async fn roll(
    State(state): State<GatewayState>,
    InboundTrace(ctx): InboundTrace,
    query: Result<Query<RollQuery>, QueryRejection>,
) -> Result<Json<Traced<RollReply>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::client_input(e.body_text()))?;
    check_identifier(&query.die)?;

    let result = state
        .gateway
        .forward_roll(&query.die, &ctx)
        .instrument(ctx.span("frontend_roll"))
        .await;
    record_frontend(&state, &query.die, result.is_ok());
    Ok(Json(result?))
}

async fn roll_batch(
    State(state): State<GatewayState>,
    InboundTrace(ctx): InboundTrace,
    query: Result<Query<RollQuery>, QueryRejection>,
) -> Result<Json<Traced<BatchReply>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::client_input(e.body_text()))?;
    let count = query
        .count
        .ok_or_else(|| ApiError::client_input("missing query parameter 'count'"))?;
    check_identifier(&query.die)?;
    check_batch_size(count)?;

    let result = state
        .gateway
        .forward_batch(&query.die, count, &ctx)
        .instrument(ctx.span("frontend_roll_batch"))
        .await;
    record_frontend(&state, &query.die, result.is_ok());
    Ok(Json(result?))
}

fn record_frontend(state: &GatewayState, die: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    metrics::record_frontend(&state.known_dice.metric_label(die), status);
}

async fn list_dice(State(state): State<GatewayState>) -> Json<IdentifierList> {
    Json(IdentifierList {
        identifiers: state.known_dice.get().to_vec(),
    })
}

async fn index(State(state): State<GatewayState>) -> Html<String> {
    Html(render_index(&state.known_dice.get()))
}

fn render_index(identifiers: &[String]) -> String {
    let options: String = identifiers
        .iter()
        .map(|id| format!(r#"<option value="{id}">{} Die</option>"#, display_name(id)))
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Dice Roller</title>
  <style>
    body {{ font-family: Arial, sans-serif; max-width: 600px; margin: 50px auto; }}
    select, button, input {{ padding: 8px; font-size: 16px; margin: 6px 4px; }}
    #result {{ margin-top: 16px; font-size: 20px; }}
    .error {{ color: #b00020; }}
  </style>
</head>
<body>
  <h1>Dice Roller</h1>
  <select id="die">
        {options}
  </select>
  <input id="count" type="number" min="1" max="20" value="5">
  <button onclick="rollOnce()">Roll</button>
  <button onclick="rollBatch()">Roll batch</button>
  <div id="result"></div>
  <script>
    async function show(url) {{
      const out = document.getElementById('result');
      const res = await fetch(url);
      const data = await res.json();
      if (res.ok) {{
        out.className = '';
        out.textContent = data.rolls
          ? `Rolls: ${{data.rolls.join(', ')}} (total ${{data.total}})`
          : `You rolled: ${{data.roll}}`;
      }} else {{
        out.className = 'error';
        out.textContent = `Error ${{res.status}}: ${{data.detail}}`;
      }}
    }}
    function die() {{ return encodeURIComponent(document.getElementById('die').value); }}
    function rollOnce() {{ show(`/roll?die=${{die()}}`); }}
    function rollBatch() {{
      const n = document.getElementById('count').value;
      show(`/roll-batch?die=${{die()}}&count=${{encodeURIComponent(n)}}`);
    }}
  </script>
</body>
</html>
"#
    )
}

/// `"fair"` → `"Fair"`.
fn display_name(identifier: &str) -> String {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::UpstreamClient;
    use crate::http::response::ErrorBody;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    /// Gateway whose engine address has nothing listening on it.
    async fn gateway_without_engine() -> Router {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let engine_url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let known_dice = Arc::new(KnownDice::new(vec!["fair".into(), "risky".into()]));
        let gateway = Gateway::new(
            UpstreamClient::new(),
            engine_url,
            known_dice.clone(),
            Duration::from_secs(2),
            Duration::from_secs(2),
        );
        routes(GatewayState {
            gateway: Arc::new(gateway),
            known_dice,
        })
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, ErrorBody) {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_input_rejected_before_forwarding() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let app = gateway_without_engine().await;

        for uri in [
            "/roll?die=bogus%20die%21",
            "/roll?die=",
            "/roll-batch?die=%3Cb%3E&count=3",
            "/roll-batch?die=fair&count=0",
            "/roll-batch?die=fair&count=21",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body.error, "client_input", "{}", uri);
        }

        let exposition = handle.render();
        assert!(!exposition.contains("frontend_requests_total"), "{}", exposition);
        assert!(!exposition.contains("backend_requests_total"), "{}", exposition);
        assert!(!exposition.contains("batch_roll_requests_total"), "{}", exposition);
    }

    #[tokio::test]
    async fn test_unknown_dice_share_one_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let app = gateway_without_engine().await;

        for i in 0..20 {
            let (status, body) = get(&app, &format!("/roll?die=ghost-{}", i)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body.error, "downstream_unreachable");
        }
        get(&app, "/roll?die=fair").await;

        let exposition = handle.render();
        assert!(!exposition.contains("ghost-"), "{}", exposition);
        let series = |die: &str| -> Vec<String> {
            exposition
                .lines()
                .filter(|line| line.starts_with("frontend_requests_total{"))
                .filter(|line| line.contains(&format!(r#"die_type="{}""#, die)))
                .map(str::to_string)
                .collect()
        };
        let unresolved = series("unresolved");
        assert_eq!(unresolved.len(), 1, "{}", exposition);
        assert!(unresolved[0].ends_with(" 20"), "{}", exposition);
        assert_eq!(series("fair").len(), 1, "{}", exposition);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("fair"), "Fair");
        assert_eq!(display_name("x"), "X");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_index_lists_every_die() {
        let html = render_index(&["fair".to_string(), "risky".to_string()]);
        assert!(html.contains(r#"<option value="fair">Fair Die</option>"#));
        assert!(html.contains(r#"<option value="risky">Risky Die</option>"#));
        assert!(html.contains("/roll-batch?die="));
    }
}
