//! HTTP surface: JSON endpoints for submitting, mining and reading the
//! chain, plus the HTML explorer.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::block::Block;
use crate::error::LedgerError;
use crate::explorer;
use crate::ledger::{ChainFault, Ledger};
use crate::submission::{Claim, Submission};

/// Shared state handed to every handler.
///
/// `ledger` guards chain and queue together and is only held for short,
/// non-blocking steps. `mining` is held for a whole mining cycle so that
/// exactly one nonce search is in flight; the search itself runs without
/// the ledger lock.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
    pub mining: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            mining: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Ledger(LedgerError),
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Ledger(err) => {
                let status = match err {
                    LedgerError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    LedgerError::Rejected(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!("request failed: {}", err);
                }
                (status, err.to_string())
            }
            ApiError::Internal(msg) => {
                error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(explorer_page))
        .route("/submit", axum::routing::post(submit))
        .route("/mine", get(mine).post(mine))
        .route("/chain", get(chain))
        .route("/chain/:index", get(block_at))
        .route("/pending", get(pending))
        .route("/validate", get(validate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every field is optional here so that absent ones can be reported
/// together instead of failing on the first. A JSON `null` counts as absent:
/// a claim cannot carry a null score or text field.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Option<String>,
    pub task_type: Option<String>,
    pub description: Option<String>,
    pub evidence_link: Option<String>,
    pub validator_note: Option<String>,
    pub score: Option<Number>,
}

impl SubmitRequest {
    pub fn into_claim(self) -> Result<Claim, ApiError> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: Option<String>| {
            value.unwrap_or_else(|| {
                missing.push(name);
                String::new()
            })
        };
        let user_id = take("user_id", self.user_id);
        let task_type = take("task_type", self.task_type);
        let description = take("description", self.description);
        let evidence_link = take("evidence_link", self.evidence_link);
        let validator_note = take("validator_note", self.validator_note);

        match self.score {
            Some(score) if missing.is_empty() => Ok(Claim {
                user_id,
                task_type,
                description,
                evidence_link,
                validator_note,
                score,
            }),
            score => {
                if score.is_none() {
                    missing.push("score");
                }
                Err(ApiError::Validation(format!("Missing fields: {}", missing.join(", "))))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub proof_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: Option<u64>,
    pub hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub ok: bool,
    pub length: usize,
    pub faults: Vec<String>,
}

async fn explorer_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let ledger = state.ledger.lock().await;
    Ok(Html(explorer::render_chain(ledger.chain())))
}

async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload?;
    let claim = request.into_claim()?;
    let proof_id = state.ledger.lock().await.submit(claim)?;
    Ok(Json(SubmitResponse {
        message: "Proof submitted".to_string(),
        proof_id,
    }))
}

async fn mine(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    // Detached so a dropped request cannot lose a dequeued claim mid-search.
    let mined = tokio::spawn(mine_cycle(state))
        .await
        .map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;

    Ok(Json(match mined {
        Some(block) => MineResponse {
            message: format!("Block #{} mined", block.index),
            index: Some(block.index),
            hash: Some(block.hash),
        },
        None => MineResponse {
            message: "No proofs to mine".to_string(),
            index: None,
            hash: None,
        },
    }))
}

/// One mining cycle: take a job under the ledger lock, search on a
/// blocking worker with the lock released, then commit under the lock.
async fn mine_cycle(state: AppState) -> Result<Option<Block>, ApiError> {
    let _cycle = state.mining.lock().await;

    let (job, difficulty) = {
        let mut ledger = state.ledger.lock().await;
        (ledger.next_job(), ledger.difficulty())
    };
    let Some(mut job) = job else {
        return Ok(None);
    };

    debug!(proof_id = job.proof_id(), "sealing on blocking worker");
    let sealed = tokio::task::spawn_blocking(move || {
        job.seal(difficulty);
        job
    })
    .await;
    // A panicked search drops the job with its claim.
    let job = sealed.map_err(|e| ApiError::Internal(format!("nonce search failed: {e}")))?;

    let mut ledger = state.ledger.lock().await;
    let index = ledger.commit(job)?;
    Ok(ledger.block(index).cloned())
}

async fn chain(State(state): State<AppState>) -> Result<Json<Vec<Block>>, ApiError> {
    let ledger = state.ledger.lock().await;
    Ok(Json(ledger.chain().to_vec()))
}

async fn block_at(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    let ledger = state.ledger.lock().await;
    ledger
        .block(index)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no block at index {index}")))
}

async fn pending(State(state): State<AppState>) -> Result<Json<Vec<Submission>>, ApiError> {
    let ledger = state.ledger.lock().await;
    Ok(Json(ledger.pending().cloned().collect()))
}

async fn validate(State(state): State<AppState>) -> Result<Json<ValidateResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    let faults: Vec<ChainFault> = ledger.audit();
    Ok(Json(ValidateResponse {
        ok: faults.is_empty(),
        length: ledger.chain().len(),
        faults: faults.iter().map(ToString::to_string).collect(),
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let ledger = state.ledger.lock().await;
    Ok(Json(json!({
        "status": "ok",
        "length": ledger.chain().len(),
        "pending": ledger.pending_len(),
        "difficulty": ledger.difficulty(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_listed() {
        let request = SubmitRequest {
            user_id: Some("alice".into()),
            description: Some("wrote docs".into()),
            ..SubmitRequest::default()
        };
        match request.into_claim() {
            Err(ApiError::Validation(msg)) => {
                assert_eq!(msg, "Missing fields: task_type, evidence_link, validator_note, score")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn complete_request_becomes_claim() {
        let request = SubmitRequest {
            user_id: Some("alice".into()),
            task_type: Some("docs".into()),
            description: Some("wrote docs".into()),
            evidence_link: Some("https://example.org".into()),
            validator_note: Some("ok".into()),
            score: Some(Number::from(5)),
        };
        let claim = request.into_claim().unwrap();
        assert_eq!(claim.user_id, "alice");
        assert_eq!(claim.score, Number::from(5));
    }

    #[test]
    fn null_fields_count_as_missing() {
        let request: SubmitRequest = serde_json::from_value(json!({
            "user_id": "alice",
            "task_type": "docs",
            "description": null,
            "evidence_link": "https://example.org",
            "validator_note": "ok",
            "score": null,
        }))
        .unwrap();
        match request.into_claim() {
            Err(ApiError::Validation(msg)) => assert_eq!(msg, "Missing fields: description, score"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
