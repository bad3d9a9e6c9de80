//! 服务入口：请求校验 + 分发到各管理器

use std::sync::Arc;

use tracing::{info, warn};

use crate::connection_manager::{CloseError, ConnectionManager};
use crate::executor::DatabaseOperations;
use crate::models::config::ServiceConfig;
use crate::models::request::{
    ConnectRequest, DisconnectRequest, SessionExecuteRequest, SessionRequest, SqlRequest,
    StartTransactionRequest, StaticTransactionRequest,
};
use crate::models::response::{
    AffectedData, CommitData, ConnectData, HealthData, InfoData, QueryData, Response, SessionData,
    StaticTransactionData, WriteData,
};
use crate::response_builder::{self, operator};
use crate::transaction::TransactionManager;
use crate::udbc::ConnectOptions;
use crate::udbc::driver::Driver;

fn blank<T>(op: &'static str, field: &'static str, value: &str) -> Option<Response<T>> {
    if value.trim().is_empty() {
        Some(response_builder::invalid_request(
            op,
            field,
            format!("'{}' must not be empty.", field),
        ))
    } else {
        None
    }
}

/// Validates connect parameters before anything reaches the driver.
fn check_connect(req: &ConnectRequest) -> Option<Response<ConnectData>> {
    let op = operator::CONNECT;
    if let Some(r) = blank(op, "host", &req.host) {
        return Some(r);
    }
    if req.port == 0 {
        return Some(response_builder::invalid_request(op, "port", "'port' must be greater than 0."));
    }
    if let Some(r) = blank(op, "user", &req.user) {
        return Some(r);
    }
    if let Some(r) = blank(op, "database", &req.database) {
        return Some(r);
    }
    None
}

/// One entry point per operation. Requests are checked for shape, then handed
/// to the manager that owns the operation. Every call returns an envelope.
pub struct DbService {
    config: ServiceConfig,
    connections: Arc<ConnectionManager>,
    operations: DatabaseOperations,
    transactions: TransactionManager,
}

impl DbService {
    pub fn new(driver: Arc<dyn Driver>, config: ServiceConfig) -> Self {
        let connections = Arc::new(ConnectionManager::new(
            driver,
            config.retry,
            config.timeouts(),
        ));
        let operations = DatabaseOperations::new(connections.clone(), config.retry);
        let transactions = TransactionManager::new(connections.clone());
        Self {
            config,
            connections,
            operations,
            transactions,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub async fn connect(&self, req: ConnectRequest) -> Response<ConnectData> {
        if let Some(r) = check_connect(&req) {
            return r;
        }
        let options = ConnectOptions::from(req);
        if !options.charset_is_valid() {
            return response_builder::invalid_request(
                operator::CONNECT,
                "charset",
                format!("Unsupported charset '{}'.", options.charset),
            );
        }
        let database = options.database.clone();
        match self.connections.connect(options).await {
            Ok(connection_id) => response_builder::connect_success(connection_id, &database),
            Err(e) => response_builder::connect_failure(&database, &e),
        }
    }

    /// A connection owned by an open dynamic transaction is not closed. While
    /// the close runs no session can be started on the connection.
    pub async fn disconnect(&self, req: DisconnectRequest) -> Response<ConnectData> {
        let connection_id = req.connection_id;
        if !self.transactions.reserve_for_close(connection_id) {
            warn!(connection_id, "refusing to close a connection owned by a session");
            return response_builder::disconnect_busy(connection_id);
        }
        let closed = self.connections.close(connection_id).await;
        self.transactions.release_reservation(connection_id);
        match closed {
            Ok(()) => response_builder::disconnect_success(connection_id),
            Err(CloseError::NotFound(id)) => {
                response_builder::connection_not_found(operator::DISCONNECT, id)
            }
            Err(CloseError::Driver(e)) => response_builder::disconnect_with_warning(connection_id, &e),
        }
    }

    pub async fn query(&self, req: SqlRequest) -> Response<QueryData> {
        if let Some(r) = blank(operator::QUERY, "statement", &req.statement) {
            return r;
        }
        self.operations
            .query(req.connection_id, &req.statement, &req.args)
            .await
    }

    pub async fn insert(&self, req: SqlRequest) -> Response<WriteData> {
        if let Some(r) = blank(operator::INSERT, "statement", &req.statement) {
            return r;
        }
        self.operations
            .insert(req.connection_id, &req.statement, &req.args)
            .await
    }

    pub async fn update(&self, req: SqlRequest) -> Response<AffectedData> {
        if let Some(r) = blank(operator::UPDATE, "statement", &req.statement) {
            return r;
        }
        self.operations
            .update(req.connection_id, &req.statement, &req.args)
            .await
    }

    pub async fn delete(&self, req: SqlRequest) -> Response<AffectedData> {
        if let Some(r) = blank(operator::DELETE, "statement", &req.statement) {
            return r;
        }
        self.operations
            .delete(req.connection_id, &req.statement, &req.args)
            .await
    }

    pub async fn static_transaction(
        &self,
        req: StaticTransactionRequest,
    ) -> Response<StaticTransactionData> {
        let op = operator::STATIC_TRANSACTION;
        if req.statements.is_empty() {
            return response_builder::invalid_request(op, "statements", "'statements' must not be empty.");
        }
        if let Some(index) = req
            .statements
            .iter()
            .position(|s| s.statement.trim().is_empty())
        {
            return response_builder::invalid_request(
                op,
                "statements",
                format!("Statement {} must not be empty.", index),
            );
        }
        self.transactions
            .execute_static(req.connection_id, &req.statements)
            .await
    }

    pub async fn start_transaction(&self, req: StartTransactionRequest) -> Response<SessionData> {
        self.transactions.start(req.connection_id).await
    }

    pub async fn execute_in_transaction(&self, req: SessionExecuteRequest) -> Response<WriteData> {
        let op = operator::TRANSACTION_EXECUTE;
        if let Some(r) = blank(op, "sessionId", &req.session_id) {
            return r;
        }
        if let Some(r) = blank(op, "statement", &req.statement) {
            return r;
        }
        self.transactions
            .execute(&req.session_id, &req.statement, &req.args)
            .await
    }

    pub async fn commit_transaction(&self, req: SessionRequest) -> Response<CommitData> {
        if let Some(r) = blank(operator::TRANSACTION_COMMIT, "sessionId", &req.session_id) {
            return r;
        }
        self.transactions.commit(&req.session_id).await
    }

    pub async fn rollback_transaction(&self, req: SessionRequest) -> Response<SessionData> {
        if let Some(r) = blank(operator::TRANSACTION_ROLLBACK, "sessionId", &req.session_id) {
            return r;
        }
        self.transactions.rollback(&req.session_id).await
    }

    pub fn health(&self) -> Response<HealthData> {
        response_builder::health(
            &self.config.service_name,
            self.connections.connection_count(),
            self.transactions.active_session_count(),
        )
    }

    pub fn info(&self) -> Response<InfoData> {
        response_builder::info(InfoData {
            service_name: self.config.service_name.clone(),
            service_id: self.config.service_id(),
            version: env!("CARGO_PKG_VERSION"),
            host: self.config.host.clone(),
            port: self.config.port,
            connection_count: self.connections.connection_count(),
            active_session_count: self.transactions.active_session_count(),
            connection_ids: self.connections.connection_ids(),
        })
    }

    /// Rolls back open sessions, then closes every connection. Sessions go
    /// first since they pin connections.
    pub async fn shutdown(&self) {
        info!(
            sessions = self.transactions.active_session_count(),
            connections = self.connections.connection_count(),
            "shutting down database service"
        );
        self.transactions.cleanup_all_sessions().await;
        self.connections.close_all().await;
    }
}
