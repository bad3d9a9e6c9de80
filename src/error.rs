use thiserror::Error;

/// MySQL server error codes that describe a condition which can clear up on
/// its own (overload, lock contention, lost link).
const TRANSIENT_SERVER_CODES: &[u16] = &[
    1040, // ER_CON_COUNT_ERROR
    1053, // ER_SERVER_SHUTDOWN
    1205, // ER_LOCK_WAIT_TIMEOUT
    1213, // ER_LOCK_DEADLOCK
    1927, // ER_CONNECTION_KILLED
    2006, // CR_SERVER_GONE_ERROR
    2013, // CR_SERVER_LOST
];

/// Represents errors that can occur in the UDBC layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("General error: {0}")]
    General(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Timed out after {0}ms")]
    Timeout(u64),
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },
    #[error("Query error: {0}")]
    Query(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("Connection is closed")]
    Closed,
}

impl DbError {
    /// 是否为可重试的瞬时错误
    ///
    /// Link failures, timeouts and the server codes in
    /// [`TRANSIENT_SERVER_CODES`] are transient. Everything else (syntax
    /// errors, constraint violations, access denied, closed handles) fails
    /// the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Connection(_) | DbError::Timeout(_) => true,
            DbError::Server { code, .. } => TRANSIENT_SERVER_CODES.contains(code),
            DbError::General(_) | DbError::Query(_) | DbError::Value(_) | DbError::Closed => false,
        }
    }
}

/// Failures while bringing the service up.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Io(io) => DbError::Connection(io.to_string()),
            mysql_async::Error::Server(server) => DbError::Server {
                code: server.code,
                message: server.message,
            },
            mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => {
                DbError::Connection("connection closed by server".to_string())
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failures_are_transient() {
        assert!(DbError::Connection("reset by peer".into()).is_transient());
        assert!(DbError::Timeout(10_000).is_transient());
    }

    #[test]
    fn test_server_codes() {
        let deadlock = DbError::Server {
            code: 1213,
            message: "Deadlock found".into(),
        };
        assert!(deadlock.is_transient());

        let syntax = DbError::Server {
            code: 1064,
            message: "You have an error in your SQL syntax".into(),
        };
        assert!(!syntax.is_transient());

        let denied = DbError::Server {
            code: 1045,
            message: "Access denied".into(),
        };
        assert!(!denied.is_transient());
    }

    #[test]
    fn test_closed_handle_is_not_retried() {
        assert!(!DbError::Closed.is_transient());
        assert!(!DbError::Query("bad params".into()).is_transient());
    }

    #[test]
    fn test_display_keeps_driver_message() {
        let e = DbError::Server {
            code: 1146,
            message: "Table 'app.users' doesn't exist".into(),
        };
        assert_eq!(e.to_string(), "Server error 1146: Table 'app.users' doesn't exist");
    }
}
