//! End-to-end tests through gateway, engine and specification store.

use std::time::{Duration, Instant};

use dice_pipeline::http::{ErrorBody, HealthStatus, X_REQUEST_ID};
use dice_pipeline::observability::{TraceContext, TRACEPARENT};
use dice_pipeline::specs::client::{IdentifierList, SpecificationEnvelope};
use reqwest::StatusCode;
use serde_json::Value;

mod common;
use common::Pipeline;

#[tokio::test]
async fn test_single_roll_through_gateway() {
    let pipeline = Pipeline::start(5).await;
    let client = common::client();

    let res = client.get(pipeline.gateway_url("/roll?die=fair")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    let roll = body["roll"].as_u64().unwrap();
    assert!((1..=6).contains(&roll), "roll = {}", roll);

    let trace_id = body["trace_id"].as_str().unwrap();
    assert_eq!(trace_id.len(), 32);
    assert!(trace_id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_batch_roll_through_gateway() {
    let pipeline = Pipeline::start(5).await;
    let client = common::client();

    for count in [1usize, 5, 20] {
        let res = client
            .get(pipeline.gateway_url(&format!("/roll-batch?die=fair&count={}", count)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        let rolls: Vec<u64> = body["rolls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_u64().unwrap())
            .collect();
        assert_eq!(rolls.len(), count);
        assert_eq!(body["count"].as_u64().unwrap() as usize, count);
        assert_eq!(body["total"].as_u64().unwrap(), rolls.iter().sum::<u64>());
        assert!(rolls.iter().all(|v| (1..=6).contains(v)));
        assert!(body["trace_id"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_die_is_unavailable_not_client_error() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();

    let res = client.get(pipeline.gateway_url("/roll?die=missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error, "specification_unavailable");
    assert!(body.detail.contains("missing"));
}

#[tokio::test]
async fn test_batch_size_out_of_range() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();

    for count in [0, 21] {
        let res = client
            .get(pipeline.gateway_url(&format!("/roll-batch?die=fair&count={}", count)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "count = {}", count);
        let body: ErrorBody = res.json().await.unwrap();
        assert_eq!(body.error, "client_input");
    }
}

#[tokio::test]
async fn test_die_failure_forwarded() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();

    let res = client.get(pipeline.gateway_url("/roll?die=cursed")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error, "die_failure");
    assert_eq!(body.detail, "Die 'cursed' failed!");

    let res = client
        .get(pipeline.gateway_url("/roll-batch?die=cursed&times=3"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = res.json().await.unwrap();
    assert_eq!(body.error, "batch_failure");
}

#[tokio::test]
async fn test_caller_trace_is_continued() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();
    let caller = TraceContext::new_root();

    let res = client
        .get(pipeline.gateway_url("/roll?die=fair"))
        .header(TRACEPARENT, caller.to_traceparent())
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["trace_id"], caller.trace_id_hex());
}

#[tokio::test]
async fn test_batch_is_concurrent_end_to_end() {
    let pipeline = Pipeline::start(200).await;
    let client = common::client();

    let start = Instant::now();
    let res = client
        .get(pipeline.gateway_url("/roll-batch?die=fair&count=20"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(start.elapsed() < Duration::from_millis(3_200), "took {:?}", start.elapsed());
}

#[tokio::test]
async fn test_dice_list_comes_from_store() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut identifiers = Vec::new();
    while Instant::now() < deadline {
        let list: IdentifierList = client
            .get(pipeline.gateway_url("/dice"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        identifiers = list.identifiers;
        if identifiers.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(identifiers, vec!["cursed", "fair", "risky"]);

    let page = client.get(pipeline.gateway_url("/")).send().await.unwrap().text().await.unwrap();
    assert!(page.contains(r#"<option value="cursed">Cursed Die</option>"#));
}

#[tokio::test]
async fn test_store_endpoints() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();
    let base = format!("http://{}", pipeline.store);

    let list: IdentifierList = client
        .get(format!("{}/specification", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.identifiers, vec!["cursed", "fair", "risky"]);

    let envelope: SpecificationEnvelope = client
        .get(format!("{}/specification?identifier=fair", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope.specification.faces, vec![1, 2, 3, 4, 5, 6]);

    let res = client
        .get(format!("{}/specification?identifier=nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_every_service_has_health_and_request_id() {
    let pipeline = Pipeline::start(0).await;
    let client = common::client();

    for (addr, name) in [
        (pipeline.store, "spec-store"),
        (pipeline.engine, "engine"),
        (pipeline.gateway, "gateway"),
    ] {
        let res = client.get(format!("http://{}/health", addr)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(X_REQUEST_ID));
        let health: HealthStatus = res.json().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.service, name);
    }
}
