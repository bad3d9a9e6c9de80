use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::{ConnectOptions, Timeouts};
use crate::udbc_mysql::connection::{MysqlConnection, bounded};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder};
use std::sync::Arc;
use tracing::debug;

const MYSQL_DRIVER_NAME: &str = "mysql";

/// Opens one dedicated `mysql_async::Conn` per call, outside any pool, so
/// that the handle's session state (open transaction, charset) belongs to a
/// single connection id.
#[derive(Debug, Default, Clone)]
pub struct MysqlDriver;

impl MysqlDriver {
    pub fn new() -> Self {
        Self
    }

    fn opts(options: &ConnectOptions) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port)
            .user(Some(options.user.clone()))
            .pass(Some(options.password.clone()))
            .db_name(Some(options.database.clone()))
            .prefer_socket(false)
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        MYSQL_DRIVER_NAME
    }

    async fn connect(
        &self,
        options: &ConnectOptions,
        timeouts: Timeouts,
    ) -> Result<Arc<dyn Connection>, DbError> {
        if !options.charset_is_valid() {
            return Err(DbError::Value(format!("invalid charset '{}'", options.charset)));
        }
        let mut conn = bounded(timeouts.connect, Conn::new(Self::opts(options))).await?;
        // charset is restricted to [A-Za-z0-9_], safe to inline
        let set_names = format!("SET NAMES {}", options.charset);
        if let Err(e) = bounded(timeouts.write, conn.query_drop(set_names)).await {
            let _ = conn.disconnect().await;
            return Err(e);
        }
        debug!(host = %options.host, port = options.port, database = %options.database, "mysql handshake done");
        Ok(Arc::new(MysqlConnection::new(conn, timeouts)))
    }
}
