use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use proofsync::http::{build_router, AppState, MineResponse, SubmitResponse, ValidateResponse};
use proofsync::{Block, Ledger, LedgerOptions, MemoryStore, Submission};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tower::ServiceExt; // for oneshot

fn state(difficulty: usize, max_pending: Option<usize>) -> AppState {
    let options = LedgerOptions {
        difficulty,
        max_pending,
        ..LedgerOptions::default()
    };
    AppState::new(Ledger::open(MemoryStore::new(), options).unwrap())
}

fn app(difficulty: usize, max_pending: Option<usize>) -> Router {
    build_router(state(difficulty, max_pending))
}

fn claim_body(user: &str, score: Value) -> Value {
    json!({
        "user_id": user,
        "task_type": "bugfix",
        "description": "Fixed the flaky test",
        "evidence_link": "https://example.org/commit/abc",
        "validator_note": "verified in CI",
        "score": score,
    })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, body.to_vec())
}

async fn get<T: DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn submit_mine_and_read_chain() {
    let app = app(3, None);

    let (status, body) = post_json(&app, "/submit", &claim_body("alice", json!(5))).await;
    assert_eq!(status, StatusCode::OK);
    let submitted: SubmitResponse = serde_json::from_value(body).unwrap();
    assert_eq!(submitted.message, "Proof submitted");

    let (_, pending): (_, Vec<Submission>) = get(&app, "/pending").await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].proof_id, submitted.proof_id);

    let (status, mined): (_, MineResponse) = get(&app, "/mine").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mined.index, Some(1));
    assert_eq!(mined.message, "Block #1 mined");

    let (_, chain): (_, Vec<Block>) = get(&app, "/chain").await;
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].previous_hash, "0");
    assert_eq!(chain[1].previous_hash, chain[0].hash);
    assert_eq!(chain[1].proof_id, submitted.proof_id);
    assert!(chain[1].hash.starts_with("000"));
    assert_eq!(Some(chain[1].hash.clone()), mined.hash);

    let (status, block): (_, Block) = get(&app, "/chain/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(block, chain[1]);

    let (_, report): (_, ValidateResponse) = get(&app, "/validate").await;
    assert!(report.ok);
    assert_eq!(report.length, 2);
}

#[tokio::test]
async fn mine_with_nothing_pending() {
    let app = app(2, None);
    let req = Request::builder()
        .method("POST")
        .uri("/mine")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let mined: MineResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(mined.message, "No proofs to mine");
    assert_eq!(mined.index, None);

    let (_, health): (_, Value) = get(&app, "/health").await;
    assert_eq!(health["length"], 1);
    assert_eq!(health["pending"], 0);
    assert_eq!(health["difficulty"], 2);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = app(1, None);
    let mut body = claim_body("bob", json!(3));
    body.as_object_mut().unwrap().remove("evidence_link");
    body.as_object_mut().unwrap().remove("score");

    let (status, err) = post_json(&app, "/submit", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "Missing fields: evidence_link, score");

    let (_, health): (_, Value) = get(&app, "/health").await;
    assert_eq!(health["pending"], 0);
}

#[tokio::test]
async fn non_numeric_score_is_a_client_error() {
    let app = app(1, None);
    let (status, err) = post_json(&app, "/submit", &claim_body("carol", json!("lots"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].is_string());
}

#[tokio::test]
async fn full_queue_is_unavailable() {
    let app = app(1, Some(1));
    let (status, _) = post_json(&app, "/submit", &claim_body("dan", json!(1))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, err) = post_json(&app, "/submit", &claim_body("eve", json!(1))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(err["error"].as_str().unwrap().contains("full"));
}

#[tokio::test]
async fn unknown_block_is_not_found() {
    let app = app(1, None);
    let (status, err): (_, Value) = get(&app, "/chain/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "no block at index 7");
}

#[tokio::test]
async fn explorer_renders_html() {
    let app = app(1, None);
    post_json(&app, "/submit", &claim_body("<b>frank</b>", json!(2))).await;
    get::<MineResponse>(&app, "/mine").await;

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("ProofSync Blockchain"));
    assert!(html.contains("Block #1 - bugfix"));
    assert!(html.contains("&lt;b&gt;frank&lt;/b&gt;"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_and_submits_proceed_during_a_mining_cycle() {
    let state = state(1, None);
    let app = build_router(state.clone());
    let (_, first) = post_json(&app, "/submit", &claim_body("gwen", json!(1))).await;

    // Stand in for a search in progress: the cycle lock is taken.
    let cycle = state.mining.lock().await;
    let miner = tokio::spawn({
        let app = app.clone();
        async move { get::<MineResponse>(&app, "/mine").await }
    });

    let within = Duration::from_secs(5);
    let (status, health): (_, Value) = timeout(within, get(&app, "/health"))
        .await
        .expect("health answered while mining");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["length"], 1);

    let (status, _) = timeout(within, post_json(&app, "/submit", &claim_body("hugo", json!(2))))
        .await
        .expect("submit answered while mining");
    assert_eq!(status, StatusCode::OK);
    assert!(!miner.is_finished());

    drop(cycle);
    let (status, mined) = timeout(within, miner).await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mined.index, Some(1));

    let (_, chain): (_, Vec<Block>) = get(&app, "/chain").await;
    assert_eq!(chain[1].proof_id, first["proof_id"].as_str().unwrap());
    let (_, pending): (_, Vec<Submission>) = get(&app, "/pending").await;
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn concurrent_mines_extend_the_chain_in_order() {
    let app = app(2, None);
    for user in ["ivy", "jon", "kim"] {
        post_json(&app, "/submit", &claim_body(user, json!(1))).await;
    }
    let mines = (0..3).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { get::<MineResponse>(&app, "/mine").await })
    });
    let mut indices = Vec::new();
    for handle in mines.collect::<Vec<_>>() {
        let (status, mined) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        indices.push(mined.index.unwrap());
    }
    indices.sort();
    assert_eq!(indices, vec![1, 2, 3]);

    let (_, report): (_, ValidateResponse) = get(&app, "/validate").await;
    assert!(report.ok, "{:?}", report.faults);
    assert_eq!(report.length, 4);
}
