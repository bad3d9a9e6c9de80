//! In-memory scripted backend for integration tests.
//!
//! Statements are recorded instead of run. Outside a transaction they land in
//! the committed log at once; inside one they are buffered until COMMIT and
//! dropped on ROLLBACK, so atomicity is observable through [`Backend::committed`].
//!
//! Conventions:
//! * a statement containing `FAIL` is rejected with a syntax error (1064)
//! * `-- rows:N` in a statement sets the reported affected rows (default 1)
//! * INSERT statements get increasing insert ids starting at 1
//! * a statement containing `SLEEP` stalls for a minute before it is applied
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dbgate::error::DbError;
use dbgate::udbc::connection::{Connection, ExecOutcome, QueryOutput};
use dbgate::udbc::driver::Driver;
use dbgate::udbc::value::Value;
use dbgate::udbc::{ConnectOptions, Timeouts};

pub fn lost_connection() -> DbError {
    DbError::Server {
        code: 2013,
        message: "Lost connection to MySQL server during query".to_string(),
    }
}

pub fn access_denied() -> DbError {
    DbError::Server {
        code: 1045,
        message: "Access denied for user 'root'@'localhost'".to_string(),
    }
}

pub fn options() -> ConnectOptions {
    ConnectOptions::new("127.0.0.1", 3306, "agent").user("root")
}

#[derive(Default)]
pub struct Backend {
    committed: Mutex<Vec<String>>,
    next_insert_id: AtomicU64,
    connect_failures: Mutex<VecDeque<DbError>>,
    statement_failures: Mutex<VecDeque<DbError>>,
    pub connect_attempts: AtomicUsize,
    pub statement_attempts: AtomicUsize,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    /// ROLLBACK still discards the buffered work but reports a lost connection.
    pub fail_rollback: AtomicBool,
    pub fail_close: AtomicBool,
}

impl Backend {
    pub fn committed(&self) -> Vec<String> {
        self.committed.lock().unwrap().clone()
    }

    /// Fails the next connect attempt with `e`.
    pub fn push_connect_failure(&self, e: DbError) {
        self.connect_failures.lock().unwrap().push_back(e);
    }

    /// Fails the next query or execute attempt with `e`.
    pub fn push_statement_failure(&self, e: DbError) {
        self.statement_failures.lock().unwrap().push_back(e);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn statement_attempts(&self) -> usize {
        self.statement_attempts.load(Ordering::SeqCst)
    }

    fn next_statement_failure(&self) -> Option<DbError> {
        self.statement_failures.lock().unwrap().pop_front()
    }
}

pub struct MemoryDriver {
    backend: Arc<Backend>,
}

/// A driver plus a handle on the backend it writes to.
pub fn memory_driver() -> (Arc<Backend>, Arc<dyn Driver>) {
    let backend = Arc::new(Backend::default());
    let driver = MemoryDriver {
        backend: backend.clone(),
    };
    (backend, Arc::new(driver))
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(
        &self,
        _options: &ConnectOptions,
        _timeouts: Timeouts,
    ) -> Result<Arc<dyn Connection>, DbError> {
        self.backend.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.backend.connect_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        Ok(Arc::new(MemoryConnection {
            backend: self.backend.clone(),
            tx: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MemoryConnection {
    backend: Arc<Backend>,
    tx: Mutex<Option<Vec<String>>>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn check(&self, sql: &str) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        self.backend.statement_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.backend.next_statement_failure() {
            return Err(e);
        }
        if sql.contains("FAIL") {
            return Err(DbError::Server {
                code: 1064,
                message: format!("You have an error in your SQL syntax near '{}'", sql),
            });
        }
        Ok(())
    }
}

fn rows_hint(sql: &str) -> u64 {
    sql.split("-- rows:")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, sql: &str, _args: &[Value]) -> Result<QueryOutput, DbError> {
        self.check(sql)?;
        let mut visible = self.backend.committed();
        if let Some(buf) = self.tx.lock().unwrap().as_ref() {
            visible.extend(buf.iter().cloned());
        }
        Ok(QueryOutput {
            columns: vec!["statement".to_string()],
            rows: visible.into_iter().map(|s| vec![Value::Str(s)]).collect(),
        })
    }

    async fn execute(&self, sql: &str, _args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.check(sql)?;
        if sql.contains("SLEEP") {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        let last_insert_id = sql
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("INSERT")
            .then(|| self.backend.next_insert_id.fetch_add(1, Ordering::SeqCst) + 1);
        match self.tx.lock().unwrap().as_mut() {
            Some(buf) => buf.push(sql.to_string()),
            None => self.backend.committed.lock().unwrap().push(sql.to_string()),
        }
        Ok(ExecOutcome {
            affected_rows: rows_hint(sql),
            last_insert_id,
        })
    }

    async fn begin(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        if self.backend.fail_begin.load(Ordering::SeqCst) {
            return Err(lost_connection());
        }
        let mut tx = self.tx.lock().unwrap();
        // BEGIN inside a transaction commits the open one first
        if let Some(buf) = tx.take() {
            self.backend.committed.lock().unwrap().extend(buf);
        }
        *tx = Some(Vec::new());
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        if self.backend.fail_commit.load(Ordering::SeqCst) {
            return Err(lost_connection());
        }
        if let Some(buf) = self.tx.lock().unwrap().take() {
            self.backend.committed.lock().unwrap().extend(buf);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        self.tx.lock().unwrap().take();
        if self.backend.fail_rollback.load(Ordering::SeqCst) {
            return Err(lost_connection());
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        self.closed.store(true, Ordering::SeqCst);
        self.tx.lock().unwrap().take();
        if self.backend.fail_close.load(Ordering::SeqCst) {
            return Err(DbError::Connection("socket already closed".to_string()));
        }
        Ok(())
    }
}
