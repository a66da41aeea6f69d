//! HTTP front for a single in-memory proof-of-work ledger.
pub mod constants;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use constants::DEFAULT_MAX_PENDING;
use powledger_core::{CancelToken, LedgerError, SealedBlock, SharedLedger, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedLedger,
    /// Time budget for one mining run; `None` searches until a proof is found.
    pub mine_timeout: Option<Duration>,
    pub max_pending: usize,
}

impl AppState {
    pub fn new(ledger: SharedLedger) -> Self {
        Self {
            ledger,
            mine_timeout: None,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    pub fn with_mine_timeout(mut self, mine_timeout: Option<Duration>) -> Self {
        self.mine_timeout = mine_timeout;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    fn cancel_token(&self) -> CancelToken {
        match self.mine_timeout {
            Some(budget) => CancelToken::with_deadline(budget),
            None => CancelToken::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transaction pool is full ({0} pending)")]
    PoolFull(usize),
    #[error("mining exceeded its time budget; transactions stay pending")]
    MiningTimedOut,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::PoolFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MiningTimedOut => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Ledger(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%status, error = %self, "request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: usize,
    pub chain: Vec<SealedBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub count: usize,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub mined: Option<u64>,
    pub length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub transaction: Transaction,
    pub mined: Option<u64>,
}

/// Form body of `POST /new_block`. Missing fields are recorded as `null`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NewBlockForm {
    pub transaction: Option<String>,
    pub amount: Option<String>,
    #[serde(rename = "customerID")]
    pub customer_id: Option<String>,
}

impl NewBlockForm {
    pub fn into_transaction(self) -> Transaction {
        Transaction::new(json!({
            "transaction": self.transaction,
            "amount": self.amount,
            "customerID": self.customer_id,
        }))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chain", get(chain))
        .route("/pending", get(pending))
        .route("/tx", post(submit_tx))
        .route("/mine", post(mine))
        .route("/new_block", post(new_block))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every ledger call may wait on a running proof search, so none of them
/// run on the async workers.
async fn on_ledger<R, F>(state: &AppState, f: F) -> Result<R, ApiError>
where
    R: Send + 'static,
    F: FnOnce(&SharedLedger) -> R + Send + 'static,
{
    let ledger = state.ledger.clone();
    Ok(tokio::task::spawn_blocking(move || f(&ledger)).await?)
}

async fn buffer(state: &AppState, tx: Transaction) -> Result<usize, ApiError> {
    let max_pending = state.max_pending;
    on_ledger(state, move |ledger| ledger.try_add_transaction(tx, max_pending))
        .await?
        .map_err(ApiError::PoolFull)
}

async fn run_mining(state: &AppState) -> Result<(Option<u64>, usize), ApiError> {
    let cancel = state.cancel_token();
    let mined = on_ledger(state, move |ledger| ledger.mine_with_len(&cancel)).await?;
    match mined {
        Ok((Some(index), length)) => {
            info!(index, length, "block mined");
            Ok((Some(index), length))
        }
        Ok(nothing) => Ok(nothing),
        Err(LedgerError::Cancelled) => Err(ApiError::MiningTimedOut),
        Err(err) => Err(err.into()),
    }
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn chain(State(state): State<AppState>) -> Result<Json<ChainResponse>, ApiError> {
    let chain = on_ledger(&state, |ledger| ledger.chain()).await?;
    Ok(Json(ChainResponse {
        length: chain.len(),
        chain,
    }))
}

async fn pending(State(state): State<AppState>) -> Result<Json<PendingResponse>, ApiError> {
    let transactions = on_ledger(&state, |ledger| ledger.pending()).await?;
    Ok(Json(PendingResponse {
        count: transactions.len(),
        transactions,
    }))
}

async fn submit_tx(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let pending = buffer(&state, Transaction::new(payload)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "pending": pending })),
    ))
}

async fn mine(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    let (mined, length) = run_mining(&state).await?;
    Ok(Json(MineResponse { mined, length }))
}

/// Buffer the submitted transaction and mine it straight away.
async fn new_block(
    State(state): State<AppState>,
    Form(form): Form<NewBlockForm>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let transaction = form.into_transaction();
    buffer(&state, transaction.clone()).await?;
    let (mined, _) = run_mining(&state).await?;
    Ok(Json(SubmitResponse {
        accepted: true,
        transaction,
        mined,
    }))
}
