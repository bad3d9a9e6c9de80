//! HTTP 路由
//!
//! Every handler returns its envelope with status 200, failures included.
//! Bodies that parse as JSON but do not fit the request shape get an
//! `INVALID_REQUEST` envelope; only unparsable bodies are rejected by axum.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::models::request::{
    ConnectRequest, DisconnectRequest, SessionExecuteRequest, SessionRequest, SqlRequest,
    StartTransactionRequest, StaticTransactionRequest,
};
use crate::models::response::{
    AffectedData, CommitData, ConnectData, HealthData, InfoData, QueryData, Response, SessionData,
    StaticTransactionData, WriteData,
};
use crate::response_builder::{self, operator};

use super::AppState;

type Reply<T> = Result<Json<Response<T>>, JsonRejection>;

fn rejected<T>(op: &'static str, rejection: JsonRejection) -> Reply<T> {
    match rejection {
        JsonRejection::JsonDataError(e) => Ok(Json(response_builder::invalid_request(
            op,
            "body",
            e.body_text(),
        ))),
        other => Err(other),
    }
}

macro_rules! body {
    ($op:expr, $payload:expr) => {
        match $payload {
            Ok(Json(req)) => req,
            Err(e) => return rejected($op, e),
        }
    };
}

async fn connect(
    State(state): State<AppState>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Reply<ConnectData> {
    let req = body!(operator::CONNECT, payload);
    Ok(Json(state.connect(req).await))
}

async fn disconnect(
    State(state): State<AppState>,
    payload: Result<Json<DisconnectRequest>, JsonRejection>,
) -> Reply<ConnectData> {
    let req = body!(operator::DISCONNECT, payload);
    Ok(Json(state.disconnect(req).await))
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<SqlRequest>, JsonRejection>,
) -> Reply<QueryData> {
    let req = body!(operator::QUERY, payload);
    Ok(Json(state.query(req).await))
}

async fn insert(
    State(state): State<AppState>,
    payload: Result<Json<SqlRequest>, JsonRejection>,
) -> Reply<WriteData> {
    let req = body!(operator::INSERT, payload);
    Ok(Json(state.insert(req).await))
}

async fn update(
    State(state): State<AppState>,
    payload: Result<Json<SqlRequest>, JsonRejection>,
) -> Reply<AffectedData> {
    let req = body!(operator::UPDATE, payload);
    Ok(Json(state.update(req).await))
}

async fn delete(
    State(state): State<AppState>,
    payload: Result<Json<SqlRequest>, JsonRejection>,
) -> Reply<AffectedData> {
    let req = body!(operator::DELETE, payload);
    Ok(Json(state.delete(req).await))
}

async fn static_transaction(
    State(state): State<AppState>,
    payload: Result<Json<StaticTransactionRequest>, JsonRejection>,
) -> Reply<StaticTransactionData> {
    let req = body!(operator::STATIC_TRANSACTION, payload);
    Ok(Json(state.static_transaction(req).await))
}

async fn start_transaction(
    State(state): State<AppState>,
    payload: Result<Json<StartTransactionRequest>, JsonRejection>,
) -> Reply<SessionData> {
    let req = body!(operator::TRANSACTION_START, payload);
    Ok(Json(state.start_transaction(req).await))
}

async fn execute_in_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SessionExecuteRequest>, JsonRejection>,
) -> Reply<WriteData> {
    let req = body!(operator::TRANSACTION_EXECUTE, payload);
    Ok(Json(state.execute_in_transaction(req).await))
}

async fn commit_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Reply<CommitData> {
    let req = body!(operator::TRANSACTION_COMMIT, payload);
    Ok(Json(state.commit_transaction(req).await))
}

async fn rollback_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Reply<SessionData> {
    let req = body!(operator::TRANSACTION_ROLLBACK, payload);
    Ok(Json(state.rollback_transaction(req).await))
}

async fn health(State(state): State<AppState>) -> Json<Response<HealthData>> {
    Json(state.health())
}

async fn info(State(state): State<AppState>) -> Json<Response<InfoData>> {
    Json(state.info())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .nest(
            "/database/mysql",
            Router::new()
                .route("/connect", post(connect))
                .route("/disconnect", post(disconnect))
                .route("/query", post(query))
                .route("/insert", post(insert))
                .route("/update", post(update))
                .route("/delete", post(delete))
                .route("/static_transaction", post(static_transaction))
                .route("/dynamic_transaction/start", post(start_transaction))
                .route("/dynamic_transaction/execute", post(execute_in_transaction))
                .route("/dynamic_transaction/commit", post(commit_transaction))
                .route("/dynamic_transaction/rollback", post(rollback_transaction)),
        )
}
