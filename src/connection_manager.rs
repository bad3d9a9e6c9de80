use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::DbError;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::{ConnectOptions, Timeouts};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloseError {
    #[error("Connection ID '{0}' does not exist")]
    NotFound(u64),
    #[error(transparent)]
    Driver(DbError),
}

struct ManagedConnection {
    options: ConnectOptions,
    handle: Arc<dyn Connection>,
}

/// 数据库连接管理器
/// Owns every live backend connection, keyed by a process-unique id.
///
/// Ids come from a counter that only advances after a successful connect, so
/// they are strictly increasing and never reused within one process.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    retry: RetryPolicy,
    timeouts: Timeouts,
    next_id: AtomicU64,
    connections: DashMap<u64, ManagedConnection>,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn Driver>, retry: RetryPolicy, timeouts: Timeouts) -> Self {
        Self {
            driver,
            retry,
            timeouts,
            next_id: AtomicU64::new(0),
            connections: DashMap::new(),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Opens a connection, retrying transient failures with backoff.
    ///
    /// On failure the last driver error is returned and no id is used up.
    pub async fn connect(&self, options: ConnectOptions) -> Result<u64, DbError> {
        let start = Instant::now();
        let handle = retry_with_backoff(
            &self.retry,
            "connect",
            DbError::is_transient,
            || self.driver.connect(&options, self.timeouts),
        )
        .await
        .inspect_err(|e| {
            error!(
                driver = self.driver.name(),
                host = %options.host,
                port = options.port,
                database = %options.database,
                error = %e,
                "failed to connect to database"
            );
        })?;

        let connection_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!(
            connection_id,
            database = %options.database,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "connected to database"
        );
        self.connections
            .insert(connection_id, ManagedConnection { options, handle });
        Ok(connection_id)
    }

    /// Absence is an ordinary outcome, callers must check for it.
    pub fn get(&self, connection_id: u64) -> Option<Arc<dyn Connection>> {
        self.connections
            .get(&connection_id)
            .map(|c| c.value().handle.clone())
    }

    pub fn database_of(&self, connection_id: u64) -> Option<String> {
        self.connections
            .get(&connection_id)
            .map(|c| c.value().options.database.clone())
    }

    /// Closes one connection. The entry is removed even when the driver
    /// reports an error while closing.
    pub async fn close(&self, connection_id: u64) -> Result<(), CloseError> {
        let (_, conn) = self
            .connections
            .remove(&connection_id)
            .ok_or(CloseError::NotFound(connection_id))?;
        match conn.handle.close().await {
            Ok(()) => {
                info!(connection_id, "closed connection");
                Ok(())
            }
            Err(e) => {
                warn!(connection_id, error = %e, "driver error while closing connection");
                Err(CloseError::Driver(e))
            }
        }
    }

    /// Shutdown only. One bad connection never stops the others from being
    /// closed, and the table is always empty afterwards.
    pub async fn close_all(&self) {
        for connection_id in self.connection_ids() {
            match self.close(connection_id).await {
                Ok(()) | Err(CloseError::NotFound(_)) => {}
                Err(e) => error!(connection_id, error = %e, "error closing connection"),
            }
        }
        self.connections.clear();
        info!("all database connections closed");
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.connections.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }
}
