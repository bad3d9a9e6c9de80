use crate::connection_manager::ConnectionManager;
use crate::error::DbError;
use crate::models::request::Statement;
use crate::models::response::{
    CommitData, Response, SessionData, StatementResult, StaticTransactionData, WriteData,
};
use crate::response_builder::{self, operator};
use crate::udbc::connection::{Connection, ExecOutcome};
use crate::udbc::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// An explicit transaction on one connection that rolls itself back when
/// dropped unfinished, e.g. when the request future is cancelled between
/// statements.
struct TransactionGuard {
    conn: Arc<dyn Connection>,
    finished: bool,
}

impl TransactionGuard {
    async fn begin(conn: Arc<dyn Connection>) -> Result<Self, DbError> {
        conn.begin().await?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.conn.execute(sql, args).await
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        let r = self.conn.commit().await;
        if r.is_ok() {
            self.finished = true;
        }
        r
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.finished = true;
        self.conn.rollback().await
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if !self.finished {
            rollback_detached(self.conn.clone());
        }
    }
}

fn rollback_detached(conn: Arc<dyn Connection>) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            if let Err(e) = conn.rollback().await {
                warn!(error = %e, "background rollback failed");
            }
        });
    }
}

/// 动态事务会话
struct DynamicSession {
    connection_id: u64,
    conn: Arc<dyn Connection>,
    executed_statement_count: u64,
    total_affected_rows: u64,
    open: bool,
}

impl Drop for DynamicSession {
    fn drop(&mut self) {
        if self.open {
            rollback_detached(self.conn.clone());
        }
    }
}

type SessionSlot = Arc<Mutex<DynamicSession>>;

// owner marker for a connection being closed, never a valid uuid
const CLOSE_RESERVATION: &str = "<closing>";

/// 事务管理器：静态事务与动态事务
///
/// Sessions live in a registry keyed by an unguessable id. Every operation
/// looks a session up, then locks it; teardown marks the session closed under
/// that same lock, so a session is never used after commit, rollback or
/// cleanup has released it. A connection is owned by at most one session.
///
/// Nothing here stops plain CRUD calls from using a connection that a session
/// owns. Such calls interleave with the session's statements inside its open
/// transaction. A static transaction on such a connection is worse: its BEGIN
/// makes MySQL implicitly commit the session's pending work, and a later
/// rollback of the session still reports success.
pub struct TransactionManager {
    connections: Arc<ConnectionManager>,
    sessions: DashMap<String, SessionSlot>,
    // connection id -> owning session id
    owners: DashMap<u64, String>,
}

impl TransactionManager {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            sessions: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// Runs all statements inside one transaction on one connection. Any
    /// failure rolls back everything executed by this call. Never retried:
    /// replaying a partially applied batch is not safe.
    pub async fn execute_static(
        &self,
        connection_id: u64,
        statements: &[Statement],
    ) -> Response<StaticTransactionData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::STATIC_TRANSACTION, connection_id);
        };

        let mut tx = match TransactionGuard::begin(conn).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(connection_id, error = %e, "failed to begin static transaction");
                return response_builder::static_transaction_control_failure("BEGIN", &e);
            }
        };

        let mut results = Vec::with_capacity(statements.len());
        for (index, st) in statements.iter().enumerate() {
            match tx.execute(&st.statement, &st.args).await {
                Ok(outcome) => {
                    debug!(connection_id, index, sql = %st.statement, args = ?st.args, "[transaction] executed");
                    results.push(StatementResult {
                        index,
                        statement: st.statement.clone(),
                        affected_rows: outcome.affected_rows,
                    });
                }
                Err(e) => {
                    error!(connection_id, index, sql = %st.statement, error = %e, "static transaction failed, rolling back");
                    if let Err(rb) = tx.rollback().await {
                        error!(connection_id, error = %rb, "rollback failed");
                    }
                    return response_builder::static_transaction_failure(index, &st.statement, &e);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            error!(connection_id, error = %e, "static transaction commit failed");
            if let Err(rb) = tx.rollback().await {
                error!(connection_id, error = %rb, "rollback failed");
            }
            return response_builder::static_transaction_control_failure("COMMIT", &e);
        }
        info!(connection_id, statements = results.len(), "static transaction committed");
        response_builder::static_transaction_success(results)
    }

    pub async fn start(&self, connection_id: u64) -> Response<SessionData> {
        let Some(conn) = self.connections.get(connection_id) else {
            return response_builder::connection_not_found(operator::TRANSACTION_START, connection_id);
        };

        let session_id = Uuid::new_v4().to_string();
        match self.owners.entry(connection_id) {
            Entry::Occupied(owner) => {
                warn!(connection_id, owner = %owner.get(), "connection already owned by a session");
                return response_builder::transaction_start_failure(format!(
                    "Connection {} already has an open dynamic transaction.",
                    connection_id
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id.clone());
            }
        }

        if let Err(e) = conn.begin().await {
            self.owners.remove(&connection_id);
            error!(connection_id, error = %e, "failed to start dynamic transaction");
            return response_builder::transaction_start_failure(e.to_string());
        }

        let session = DynamicSession {
            connection_id,
            conn,
            executed_statement_count: 0,
            total_affected_rows: 0,
            open: true,
        };
        self.sessions
            .insert(session_id.clone(), Arc::new(Mutex::new(session)));
        info!(connection_id, session_id = %session_id, "dynamic transaction started");
        response_builder::transaction_start_success(session_id)
    }

    /// Any failure rolls the session back and closes it; the caller has to
    /// start a new one.
    pub async fn execute(&self, session_id: &str, sql: &str, args: &[Value]) -> Response<WriteData> {
        let Some(slot) = self.lookup(session_id) else {
            return response_builder::session_not_found(operator::TRANSACTION_EXECUTE, session_id);
        };
        let mut session = slot.lock().await;
        if !session.open {
            return response_builder::session_not_found(operator::TRANSACTION_EXECUTE, session_id);
        }

        debug!(session_id, sql, ?args, "executing in dynamic transaction");
        match session.conn.execute(sql, args).await {
            Ok(outcome) => {
                session.executed_statement_count += 1;
                session.total_affected_rows += outcome.affected_rows;
                info!(session_id, affected = outcome.affected_rows, "executed in dynamic transaction");
                response_builder::transaction_execute_success(outcome)
            }
            Err(e) => {
                error!(session_id, sql, error = %e, "statement failed, rolling back dynamic transaction");
                if let Err(rb) = session.conn.rollback().await {
                    error!(session_id, error = %rb, "rollback failed");
                }
                session.open = false;
                self.deregister(session_id, &slot, session.connection_id);
                response_builder::transaction_execute_failure(sql, &e)
            }
        }
    }

    /// The session is released whether or not the commit succeeds.
    pub async fn commit(&self, session_id: &str) -> Response<CommitData> {
        let Some(slot) = self.take(session_id) else {
            return response_builder::session_not_found(operator::TRANSACTION_COMMIT, session_id);
        };
        let mut session = slot.lock().await;
        if !session.open {
            return response_builder::session_not_found(operator::TRANSACTION_COMMIT, session_id);
        }
        session.open = false;
        let result = session.conn.commit().await;
        self.release_owner(session.connection_id, session_id);

        match result {
            Ok(()) => {
                info!(
                    session_id,
                    statements = session.executed_statement_count,
                    affected = session.total_affected_rows,
                    "dynamic transaction committed"
                );
                response_builder::transaction_commit_success(
                    session_id.to_string(),
                    session.total_affected_rows,
                    session.executed_statement_count,
                )
            }
            Err(e) => {
                error!(session_id, error = %e, "failed to commit dynamic transaction");
                response_builder::transaction_commit_failure(&e)
            }
        }
    }

    pub async fn rollback(&self, session_id: &str) -> Response<SessionData> {
        let Some(slot) = self.take(session_id) else {
            return response_builder::session_not_found(operator::TRANSACTION_ROLLBACK, session_id);
        };
        let mut session = slot.lock().await;
        if !session.open {
            return response_builder::session_not_found(operator::TRANSACTION_ROLLBACK, session_id);
        }
        session.open = false;
        let result = session.conn.rollback().await;
        self.release_owner(session.connection_id, session_id);

        match result {
            Ok(()) => {
                info!(session_id, "dynamic transaction rolled back");
                response_builder::transaction_rollback_success(session_id.to_string())
            }
            Err(e) => {
                error!(session_id, error = %e, "failed to roll back dynamic transaction");
                response_builder::transaction_rollback_failure(&e)
            }
        }
    }

    /// Shutdown only: rolls back every open session. Failures are logged and
    /// the registry always ends empty.
    pub async fn cleanup_all_sessions(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for session_id in ids {
            let Some(slot) = self.take(&session_id) else {
                continue;
            };
            let mut session = slot.lock().await;
            if !session.open {
                continue;
            }
            session.open = false;
            match session.conn.rollback().await {
                Ok(()) => info!(session_id = %session_id, "cleaned up transaction session"),
                Err(e) => error!(session_id = %session_id, error = %e, "error cleaning up session"),
            }
            self.release_owner(session.connection_id, &session_id);
        }
        self.sessions.clear();
        self.owners.clear();
        info!("all dynamic transaction sessions cleaned up");
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session_on(&self, connection_id: u64) -> bool {
        self.owners.contains_key(&connection_id)
    }

    /// Blocks new sessions on a connection that is about to be closed.
    /// Returns false when a session already owns it.
    pub fn reserve_for_close(&self, connection_id: u64) -> bool {
        match self.owners.entry(connection_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(CLOSE_RESERVATION.to_string());
                true
            }
        }
    }

    pub fn release_reservation(&self, connection_id: u64) {
        self.owners
            .remove_if(&connection_id, |_, owner| owner == CLOSE_RESERVATION);
    }

    fn lookup(&self, session_id: &str) -> Option<SessionSlot> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    fn take(&self, session_id: &str) -> Option<SessionSlot> {
        self.sessions.remove(session_id).map(|(_, slot)| slot)
    }

    fn deregister(&self, session_id: &str, slot: &SessionSlot, connection_id: u64) {
        self.sessions
            .remove_if(session_id, |_, v| Arc::ptr_eq(v, slot));
        self.release_owner(connection_id, session_id);
    }

    fn release_owner(&self, connection_id: u64, session_id: &str) {
        self.owners
            .remove_if(&connection_id, |_, owner| owner == session_id);
    }
}
