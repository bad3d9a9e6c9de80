use crate::connection_manager::ConnectionManager;
use crate::error::DbError;
use crate::models::response::{AffectedData, QueryData, Response, WriteData};
use crate::response_builder::{self, operator};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::udbc::connection::{Connection, ExecOutcome};
use crate::udbc::value::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 数据库操作管理器，执行单条 CRUD 语句
///
/// Each call resolves the connection id first (missing ids fail at once,
/// without retry), then runs the statement under the retry policy. Only
/// transient driver errors are retried.
pub struct DatabaseOperations {
    connections: Arc<ConnectionManager>,
    retry: RetryPolicy,
}

impl DatabaseOperations {
    pub fn new(connections: Arc<ConnectionManager>, retry: RetryPolicy) -> Self {
        Self { connections, retry }
    }

    pub async fn query(&self, connection_id: u64, sql: &str, args: &[Value]) -> Response<QueryData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::QUERY, connection_id);
        };
        let start = Instant::now();
        let result = retry_with_backoff(&self.retry, operator::QUERY, DbError::is_transient, || {
            conn.query(sql, args)
        })
        .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(output) => {
                debug!(connection_id, sql, ?args, elapsed_ms, rows = output.rows.len(), "query success");
                response_builder::query_success(output)
            }
            Err(e) => {
                error!(connection_id, sql, elapsed_ms, error = %e, "query failed");
                response_builder::query_failure(&e)
            }
        }
    }

    pub async fn insert(&self, connection_id: u64, sql: &str, args: &[Value]) -> Response<WriteData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::INSERT, connection_id);
        };
        match self.execute(operator::INSERT, connection_id, &conn, sql, args).await {
            Ok(outcome) => {
                info!(connection_id, affected = outcome.affected_rows, last_insert_id = ?outcome.last_insert_id, "insert success");
                response_builder::insert_success(outcome)
            }
            Err(e) => response_builder::insert_failure(&e),
        }
    }

    pub async fn update(&self, connection_id: u64, sql: &str, args: &[Value]) -> Response<AffectedData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::UPDATE, connection_id);
        };
        match self.execute(operator::UPDATE, connection_id, &conn, sql, args).await {
            Ok(outcome) => {
                Self::log_affected(operator::UPDATE, connection_id, sql, outcome.affected_rows);
                response_builder::update_success(outcome.affected_rows)
            }
            Err(e) => response_builder::update_failure(&e),
        }
    }

    pub async fn delete(&self, connection_id: u64, sql: &str, args: &[Value]) -> Response<AffectedData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::DELETE, connection_id);
        };
        match self.execute(operator::DELETE, connection_id, &conn, sql, args).await {
            Ok(outcome) => {
                Self::log_affected(operator::DELETE, connection_id, sql, outcome.affected_rows);
                response_builder::delete_success(outcome.affected_rows)
            }
            Err(e) => response_builder::delete_failure(&e),
        }
    }

    async fn execute(
        &self,
        op: &'static str,
        connection_id: u64,
        conn: &Arc<dyn Connection>,
        sql: &str,
        args: &[Value],
    ) -> Result<ExecOutcome, DbError> {
        let start = Instant::now();
        let result =
            retry_with_backoff(&self.retry, op, DbError::is_transient, || conn.execute(sql, args))
                .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => {
                debug!(op, connection_id, sql, ?args, elapsed_ms, affected = outcome.affected_rows, "statement executed")
            }
            Err(e) => error!(op, connection_id, sql, elapsed_ms, error = %e, "statement failed"),
        }
        result
    }

    // A zero count usually means the WHERE clause matched nothing.
    fn log_affected(op: &'static str, connection_id: u64, sql: &str, affected_rows: u64) {
        if affected_rows > 0 {
            info!(op, connection_id, affected = affected_rows, "rows affected");
        } else {
            warn!(op, connection_id, sql, "statement succeeded, but no rows were affected");
        }
    }
}
