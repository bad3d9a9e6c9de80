//! 响应构建器
//!
//! One function per operation and outcome. Every envelope the service hands
//! out is built here, so labels, codes and hints stay identical across code
//! paths.

use chrono::Utc;

use crate::error::DbError;
use crate::models::response::{
    AffectedData, CommitData, ConnectData, ErrorCode, ErrorDetail, HealthData, InfoData, Level,
    QueryData, Response, SessionData, StatementResult, StaticTransactionData, WriteData,
};
use crate::udbc::connection::{ExecOutcome, QueryOutput};

pub mod operator {
    pub const CONNECT: &str = "Connect Database";
    pub const DISCONNECT: &str = "Disconnect Database";
    pub const QUERY: &str = "Query";
    pub const INSERT: &str = "Insert";
    pub const UPDATE: &str = "Update";
    pub const DELETE: &str = "Delete";
    pub const STATIC_TRANSACTION: &str = "Transaction";
    pub const TRANSACTION_START: &str = "Transaction Start";
    pub const TRANSACTION_EXECUTE: &str = "Transaction Execute SQL";
    pub const TRANSACTION_COMMIT: &str = "Transaction Commit";
    pub const TRANSACTION_ROLLBACK: &str = "Transaction Rollback";
    pub const HEALTH: &str = "Health Check";
    pub const INFO: &str = "Service Info";
}

const SQL_HINT: &str = "Please check the SQL syntax and parameters or try again later.";

pub fn connection_not_found<T>(operator: &'static str, connection_id: u64) -> Response<T> {
    Response::failure(
        operator,
        format!("{} failed", operator),
        ErrorDetail::new(
            ErrorCode::ConnectionIdNotExists,
            format!("Connection ID '{}' does not exist.", connection_id),
        )
        .field("connectionId")
        .hint("Please check if the connection ID is correct."),
    )
}

pub fn session_not_found<T>(operator: &'static str, session_id: &str) -> Response<T> {
    Response::failure(
        operator,
        format!("{} failed", operator),
        ErrorDetail::new(
            ErrorCode::TransactionFailed,
            format!("Session ID '{}' does not exist.", session_id),
        )
        .field("sessionId")
        .hint("Please check if the session ID is correct, or start a new transaction."),
    )
}

pub fn invalid_request<T>(
    operator: &'static str,
    field: &'static str,
    message: impl Into<String>,
) -> Response<T> {
    Response::failure(
        operator,
        format!("{} rejected: invalid request", operator),
        ErrorDetail::new(ErrorCode::InvalidRequest, message)
            .field(field)
            .hint("Please fix the request and send it again."),
    )
}

// ---------- connection ----------

pub fn connect_success(connection_id: u64, database: &str) -> Response<ConnectData> {
    Response::success(
        operator::CONNECT,
        format!("Successfully connected to database '{}'", database),
        ConnectData { connection_id },
    )
}

pub fn connect_failure(database: &str, error: &DbError) -> Response<ConnectData> {
    Response::failure(
        operator::CONNECT,
        format!("Failed to connect to database '{}'.", database),
        ErrorDetail::new(ErrorCode::ConnectDatabaseFailed, error.to_string())
            .field("database")
            .hint("Please check the database parameters or try again later."),
    )
}

pub fn disconnect_success(connection_id: u64) -> Response<ConnectData> {
    Response::success(
        operator::DISCONNECT,
        format!("Connection {} closed.", connection_id),
        ConnectData { connection_id },
    )
}

/// The entry is gone either way; the driver error is only a warning.
pub fn disconnect_with_warning(connection_id: u64, error: &DbError) -> Response<ConnectData> {
    Response::success(
        operator::DISCONNECT,
        format!("Connection {} removed, driver reported: {}", connection_id, error),
        ConnectData { connection_id },
    )
    .with_level(Level::Warning)
}

pub fn disconnect_busy(connection_id: u64) -> Response<ConnectData> {
    Response::failure(
        operator::DISCONNECT,
        format!("{} failed", operator::DISCONNECT),
        ErrorDetail::new(
            ErrorCode::TransactionFailed,
            format!(
                "Connection {} is owned by an open dynamic transaction.",
                connection_id
            ),
        )
        .field("connectionId")
        .hint("Commit or roll back the transaction before closing the connection."),
    )
}

// ---------- CRUD ----------

pub fn query_success(output: QueryOutput) -> Response<QueryData> {
    let row_count = output.rows.len();
    Response::success(
        operator::QUERY,
        "Query success.",
        QueryData {
            columns: output.columns,
            rows: output.rows,
            row_count,
        },
    )
}

pub fn query_failure(error: &DbError) -> Response<QueryData> {
    let message = format!("Query failed! Error: {}", error);
    Response::failure(
        operator::QUERY,
        message.clone(),
        ErrorDetail::new(ErrorCode::QueryDatabaseFailed, message)
            .field("statement")
            .hint(SQL_HINT),
    )
}

pub fn insert_success(outcome: ExecOutcome) -> Response<WriteData> {
    Response::success(
        operator::INSERT,
        "Insert success.",
        WriteData {
            affected_rows: outcome.affected_rows,
            last_insert_id: outcome.last_insert_id,
        },
    )
}

pub fn insert_failure(error: &DbError) -> Response<WriteData> {
    let message = format!("Insert failed! Error: {}", error);
    Response::failure(
        operator::INSERT,
        message.clone(),
        ErrorDetail::new(ErrorCode::InsertDatabaseFailed, message)
            .field("database")
            .hint("Unknown error in database, please check the parameters or try again later."),
    )
}

fn affected(operator: &'static str, verb: &str, affected_rows: u64) -> Response<AffectedData> {
    if affected_rows == 0 {
        Response::success(
            operator,
            format!("{} success, but no rows were affected.", verb),
            AffectedData { affected_rows },
        )
        .with_level(Level::Warning)
    } else {
        Response::success(
            operator,
            format!("{} success.", verb),
            AffectedData { affected_rows },
        )
    }
}

pub fn update_success(affected_rows: u64) -> Response<AffectedData> {
    affected(operator::UPDATE, "Update", affected_rows)
}

pub fn update_failure(error: &DbError) -> Response<AffectedData> {
    let message = format!("Update failed! Error: {}", error);
    Response::failure(
        operator::UPDATE,
        message.clone(),
        ErrorDetail::new(ErrorCode::UpdateDatabaseFailed, message)
            .field("statement")
            .hint(SQL_HINT),
    )
}

pub fn delete_success(affected_rows: u64) -> Response<AffectedData> {
    affected(operator::DELETE, "Delete", affected_rows)
}

pub fn delete_failure(error: &DbError) -> Response<AffectedData> {
    let message = format!("Delete failed! Error: {}", error);
    Response::failure(
        operator::DELETE,
        message.clone(),
        ErrorDetail::new(ErrorCode::DeleteDatabaseFailed, message)
            .field("statement")
            .hint(SQL_HINT),
    )
}

// ---------- static transaction ----------

pub fn static_transaction_success(results: Vec<StatementResult>) -> Response<StaticTransactionData> {
    let statement_count = results.len();
    Response::success(
        operator::STATIC_TRANSACTION,
        "Transaction success.",
        StaticTransactionData {
            results,
            statement_count,
        },
    )
}

pub fn static_transaction_failure(
    index: usize,
    statement: &str,
    error: &DbError,
) -> Response<StaticTransactionData> {
    Response::failure(
        operator::STATIC_TRANSACTION,
        format!("Transaction failed at statement {}, rolled back.", index),
        ErrorDetail::new(ErrorCode::TransactionFailed, error.to_string())
            .field("statements")
            .index(index)
            .sql(vec![statement.to_string()])
            .hint(SQL_HINT),
    )
}

/// BEGIN or COMMIT itself failed.
pub fn static_transaction_control_failure(
    stage: &str,
    error: &DbError,
) -> Response<StaticTransactionData> {
    Response::failure(
        operator::STATIC_TRANSACTION,
        format!("Transaction failed during {}.", stage),
        ErrorDetail::new(ErrorCode::TransactionFailed, error.to_string())
            .field("transaction")
            .hint("Please check connection or server status."),
    )
}

// ---------- dynamic transaction ----------

pub fn transaction_start_success(session_id: String) -> Response<SessionData> {
    Response::success(
        operator::TRANSACTION_START,
        "Transaction started.",
        SessionData { session_id },
    )
}

pub fn transaction_start_failure(message: impl Into<String>) -> Response<SessionData> {
    Response::failure(
        operator::TRANSACTION_START,
        "Failed to start dynamic transaction.",
        ErrorDetail::new(ErrorCode::TransactionFailed, message)
            .field("connectionId")
            .hint("Please try again later."),
    )
}

pub fn transaction_execute_success(outcome: ExecOutcome) -> Response<WriteData> {
    Response::success(
        operator::TRANSACTION_EXECUTE,
        "SQL executed successfully.",
        WriteData {
            affected_rows: outcome.affected_rows,
            last_insert_id: outcome.last_insert_id,
        },
    )
}

pub fn transaction_execute_failure(statement: &str, error: &DbError) -> Response<WriteData> {
    Response::failure(
        operator::TRANSACTION_EXECUTE,
        "Failed to execute SQL, transaction rolled back.",
        ErrorDetail::new(ErrorCode::TransactionFailed, error.to_string())
            .field("statement")
            .sql(vec![statement.to_string()])
            .hint("The session is closed; start a new transaction."),
    )
}

pub fn transaction_commit_success(
    session_id: String,
    total_affected_rows: u64,
    executed_statement_count: u64,
) -> Response<CommitData> {
    Response::success(
        operator::TRANSACTION_COMMIT,
        "Transaction committed successfully.",
        CommitData {
            session_id,
            total_affected_rows,
            executed_statement_count,
            commit_time: Utc::now(),
        },
    )
}

pub fn transaction_commit_failure(error: &DbError) -> Response<CommitData> {
    Response::failure(
        operator::TRANSACTION_COMMIT,
        "Transaction commit failed.",
        ErrorDetail::new(ErrorCode::TransactionFailed, error.to_string())
            .field("commit")
            .hint("Please check connection or server status."),
    )
}

pub fn transaction_rollback_success(session_id: String) -> Response<SessionData> {
    Response::success(
        operator::TRANSACTION_ROLLBACK,
        "Transaction rolled back successfully.",
        SessionData { session_id },
    )
}

pub fn transaction_rollback_failure(error: &DbError) -> Response<SessionData> {
    Response::failure(
        operator::TRANSACTION_ROLLBACK,
        "Transaction rollback failed.",
        ErrorDetail::new(ErrorCode::TransactionFailed, error.to_string())
            .field("rollback")
            .hint("Please check connection or server status."),
    )
}

// ---------- service ----------

pub fn health(service: &str, connection_count: usize, active_session_count: usize) -> Response<HealthData> {
    Response::success(
        operator::HEALTH,
        "healthy",
        HealthData {
            status: "healthy",
            service: service.to_string(),
            connection_count,
            active_session_count,
        },
    )
}

pub fn info(data: InfoData) -> Response<InfoData> {
    Response::success(operator::INFO, "Service info.", data)
}
