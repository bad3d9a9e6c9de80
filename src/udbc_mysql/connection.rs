use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row as MyRow};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::udbc::Timeouts;
use crate::udbc::connection::{Connection, ExecOutcome, QueryOutput};
use crate::udbc::value::Value;
use crate::udbc_mysql::value_codec::{from_mysql_value, to_mysql_value};

pub struct MysqlConnection {
    // `None` once closed
    conn: Mutex<Option<Conn>>,
    timeouts: Timeouts,
}

impl MysqlConnection {
    pub fn new(conn: Conn, timeouts: Timeouts) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            timeouts,
        }
    }

    fn params(args: &[Value]) -> Params {
        if args.is_empty() {
            Params::Empty
        } else {
            Params::Positional(args.iter().map(to_mysql_value).collect())
        }
    }

    fn map_row(row: MyRow) -> Vec<Value> {
        (0..row.len())
            .map(|i| {
                row.as_ref(i)
                    .map(from_mysql_value)
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    async fn control(&self, statement: &'static str) -> Result<(), DbError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::Closed)?;
        bounded(self.timeouts.write, conn.query_drop(statement)).await
    }
}

/// Runs a driver future under a deadline, mapping both failure kinds into
/// [`DbError`].
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, mysql_async::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => Err(DbError::Timeout(limit.as_millis() as u64)),
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryOutput, DbError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::Closed)?;
        let params = Self::params(args);
        bounded(self.timeouts.read, async move {
            let mut result = conn.exec_iter(sql, params).await?;
            let columns = result
                .columns_ref()
                .iter()
                .map(|c| c.name_str().to_string())
                .collect();
            let rows: Vec<MyRow> = result.collect().await?;
            Ok(QueryOutput {
                columns,
                rows: rows.into_iter().map(Self::map_row).collect(),
            })
        })
        .await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::Closed)?;
        let params = Self::params(args);
        bounded(self.timeouts.write, async move {
            conn.exec_drop(sql, params).await?;
            Ok(ExecOutcome {
                affected_rows: conn.affected_rows(),
                last_insert_id: conn.last_insert_id().filter(|id| *id != 0),
            })
        })
        .await
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.control("BEGIN").await
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.control("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.control("ROLLBACK").await
    }

    async fn close(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().await.take().ok_or(DbError::Closed)?;
        bounded(self.timeouts.write, conn.disconnect()).await
    }
}
