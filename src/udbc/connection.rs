use crate::error::DbError;
use crate::udbc::value::Value;
use async_trait::async_trait;

/// Column names plus ordered rows, as returned by a single statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    /// `None` when the statement did not generate an identity value
    pub last_insert_id: Option<u64>,
}

/// A live handle to one backend connection.
///
/// Implementations serialize individual round trips on the handle, but give
/// no isolation between independent callers sharing it: two logical users of
/// the same handle interleave at statement granularity.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryOutput, DbError>;

    /// Runs a statement and reports affected rows and the generated id,
    /// both read in the same round trip.
    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError>;

    // ---------- transaction ----------
    async fn begin(&self) -> Result<(), DbError>;
    async fn commit(&self) -> Result<(), DbError>;
    async fn rollback(&self) -> Result<(), DbError>;

    /// Closes the handle. Any later call fails with [`DbError::Closed`].
    async fn close(&self) -> Result<(), DbError>;
}
