//! Full path: controller -> HTTP relay -> stub backend, on real sockets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_backend_client::BackendClient;
use arc_common::{SessionKey, Stage};
use arc_relay::{router, Relay};
use arc_scout::scorer::enrich;
use arc_scout::{
    Controller, HttpRelayChannel, MemoryStore, Observation, PageSignal, PipelineConfig,
    RelayChannel, RelayScorer, ScoutDeps,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
struct Backend {
    /// Endpoint hits in arrival order.
    calls: Mutex<Vec<&'static str>>,
    records: Mutex<Vec<Value>>,
}

async fn ingest(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    b.calls.lock().unwrap().push("ingest");
    let records = body["records"].as_array().cloned().unwrap_or_default();
    let inserted = records.len();
    b.records.lock().unwrap().extend(records);
    Json(json!({ "inserted": inserted }))
}

async fn score(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    b.calls.lock().unwrap().push("score");
    let scores: Vec<u8> = body["reviews"]
        .as_array()
        .map(|reviews| {
            reviews
                .iter()
                .map(|r| if r["verified_purchase"] == true { 90 } else { 30 })
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "scores": scores }))
}

async fn reset(State(b): State<Arc<Backend>>) -> StatusCode {
    b.calls.lock().unwrap().push("reset");
    StatusCode::OK
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn stack() -> (Arc<Backend>, Arc<dyn RelayChannel>) {
    let backend = Arc::new(Backend::default());
    let backend_url = serve(
        Router::new()
            .route("/ingest", post(ingest))
            .route("/score", post(score))
            .route("/reset", post(reset))
            .with_state(backend.clone()),
    )
    .await;

    let client = BackendClient::new(&backend_url, Duration::from_secs(5)).unwrap();
    let relay_url = serve(router(Arc::new(Relay::new(client)))).await;
    let channel = HttpRelayChannel::new(&relay_url, Duration::from_secs(5)).unwrap();
    (backend, Arc::new(channel))
}

fn reviews() -> Vec<arc_common::Review> {
    (0..7)
        .map(|i| {
            serde_json::from_value(json!({
                "product_id": "B0E2ETEST1",
                "author": format!("reviewer-{i}"),
                "review_title": format!("Review {i}"),
                "review_body": "Does what it says.",
                "verified_purchase": i % 2 == 0,
            }))
            .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn reviews_flow_through_relay_to_backend() {
    let (backend, channel) = stack().await;
    let config = PipelineConfig {
        batch_size: 3,
        debounce: Duration::from_millis(200),
        ..PipelineConfig::default()
    };
    let deps = ScoutDeps::over_relay(
        channel.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );
    let mut controller = Controller::new(SessionKey::new("B0E2ETEST1"), deps, &config);
    controller.enable().await;

    let mut reviews = reviews();
    for review in &reviews {
        let outcome = controller.observe(review.to_record().unwrap(), Stage::base());
        assert_eq!(outcome, Observation::Queued);
    }
    // Same scrape seen again on re-render.
    assert_eq!(
        controller.observe(reviews[0].to_record().unwrap(), Stage::base()),
        Observation::Duplicate
    );

    enrich(&RelayScorer::new(channel), &mut reviews).await.unwrap();
    assert_eq!(reviews[0].score, Some(90));
    assert_eq!(reviews[1].score, Some(30));
    for review in &reviews {
        let outcome = controller.observe(review.to_record().unwrap(), Stage::enriched());
        assert_eq!(outcome, Observation::Queued);
    }

    controller.on_page_signal(PageSignal::Teardown).await;

    let calls = backend.calls.lock().unwrap().clone();
    assert_eq!(calls.first(), Some(&"reset"));
    assert_eq!(calls.iter().filter(|c| **c == "reset").count(), 1);
    assert!(calls.contains(&"score"));

    let records = backend.records.lock().unwrap().clone();
    assert_eq!(records.len(), 14);
    let enriched: Vec<&Value> = records
        .iter()
        .filter(|r| r["stage"] == "enriched")
        .collect();
    assert_eq!(enriched.len(), 7);
    assert!(enriched.iter().all(|r| r["score"].is_u64()));
    assert!(records.iter().all(|r| r["record_key"].is_string()));
}

#[tokio::test]
async fn unreachable_relay_does_not_block_the_pipeline() {
    let channel: Arc<dyn RelayChannel> =
        Arc::new(HttpRelayChannel::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap());
    let deps = ScoutDeps::over_relay(
        channel,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );
    let config = PipelineConfig {
        batch_size: 2,
        ..PipelineConfig::default()
    };
    let mut controller = Controller::new(SessionKey::new("B0E2ETEST1"), deps, &config);

    controller.enable().await;
    assert!(controller.is_enabled());

    for review in reviews() {
        controller.observe(review.to_record().unwrap(), Stage::base());
    }
    controller.on_page_signal(PageSignal::Teardown).await;
    assert_eq!(controller.pending(), 0);
}
