//! Relay dispatch and HTTP surface against a stub backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_backend_client::BackendClient;
use arc_common::{
    Record, RecordKey, RelayRequest, RelayResponse, ResponseBody, ScoreInput, Stage, StagedRecord,
    UNKNOWN_MESSAGE,
};
use arc_relay::{router, Relay};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Default)]
struct Backend {
    batches: Mutex<Vec<Value>>,
    resets: Mutex<u32>,
}

async fn ingest(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    b.batches.lock().unwrap().push(body);
    Json(json!({ "ok": true }))
}

async fn score(Json(body): Json<Value>) -> Json<Value> {
    let n = body["reviews"].as_array().map(|r| r.len()).unwrap_or(0);
    Json(json!({ "scores": vec![42u8; n] }))
}

async fn reset(State(b): State<Arc<Backend>>) -> StatusCode {
    *b.resets.lock().unwrap() += 1;
    StatusCode::NO_CONTENT
}

async fn backend() -> (Arc<Backend>, String) {
    let state = Arc::new(Backend::default());
    let app = Router::new()
        .route("/ingest", post(ingest))
        .route("/score", post(score))
        .route("/reset", post(reset))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("http://{addr}"))
}

fn relay(base: &str) -> Relay {
    Relay::new(BackendClient::new(base, Duration::from_secs(5)).unwrap())
}

async fn post_message(app: Router, body: &str) -> Value {
    let response = app
        .oneshot(
            Request::post("/message")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_batch_forwards_records() {
    let (state, base) = backend().await;
    let staged = StagedRecord::new(
        RecordKey::new("k1"),
        Stage::base(),
        Record::new().with("review_title", "Nice"),
    );

    let response = relay(&base)
        .handle(RelayRequest::UploadBatch {
            payload: vec![staged],
        })
        .await;

    assert_eq!(
        response,
        RelayResponse::Uploaded {
            ok: true,
            status: 200,
            body: ResponseBody::Parsed(json!({ "ok": true })),
        }
    );
    let batches = state.batches.lock().unwrap();
    assert_eq!(batches[0]["records"][0]["record_key"], json!("k1"));
}

#[tokio::test]
async fn get_scores_returns_parallel_list() {
    let (_state, base) = backend().await;
    let inputs = vec![
        ScoreInput {
            review_title: "a".into(),
            review_body: "b".into(),
            verified_purchase: false,
        };
        3
    ];

    let response = relay(&base)
        .handle(RelayRequest::GetScores { payload: inputs })
        .await;
    assert_eq!(
        response,
        RelayResponse::Scores {
            ok: true,
            scores: vec![42, 42, 42],
        }
    );
}

#[tokio::test]
async fn reset_reaches_backend() {
    let (state, base) = backend().await;
    let response = relay(&base).handle(RelayRequest::Reset).await;
    assert_eq!(response, RelayResponse::Reset { ok: true });
    assert_eq!(*state.resets.lock().unwrap(), 1);
}

#[tokio::test]
async fn unreachable_backend_answers_failed() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = relay(&format!("http://{addr}"))
        .handle(RelayRequest::Reset)
        .await;
    assert!(matches!(response, RelayResponse::Failed { .. }));
}

#[tokio::test]
async fn http_ping_answers_pong() {
    let (_state, base) = backend().await;
    let app = router(Arc::new(relay(&base)));

    let reply = post_message(app, r#"{"type":"ping"}"#).await;
    assert_eq!(reply["type"], json!("pong"));
    assert!(reply["time"].is_string());
}

#[tokio::test]
async fn http_unknown_type_is_answered_not_thrown() {
    let (_state, base) = backend().await;
    let app = router(Arc::new(relay(&base)));

    let reply = post_message(app, r#"{"type":"force_inject"}"#).await;
    assert_eq!(reply, json!({ "type": "failed", "error": UNKNOWN_MESSAGE }));
}

#[tokio::test]
async fn http_non_json_body_is_answered_not_thrown() {
    let (_state, base) = backend().await;
    let app = router(Arc::new(relay(&base)));

    let reply = post_message(app, "definitely not json").await;
    assert_eq!(reply["type"], json!("failed"));
}

#[tokio::test]
async fn health_check() {
    let (_state, base) = backend().await;
    let app = router(Arc::new(relay(&base)));
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
