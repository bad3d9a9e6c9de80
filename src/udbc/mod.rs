pub mod value;

pub mod connection;
pub mod driver;

use std::fmt;
use std::time::Duration;

pub const DEFAULT_CHARSET: &str = "utf8mb4";

/// 单个后端连接的参数，连接建立后不再修改
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: String::new(),
            password: String::new(),
            database: database.into(),
            charset: DEFAULT_CHARSET.to_string(),
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Charset names are inlined into `SET NAMES`, so only `[A-Za-z0-9_]+`
    /// is accepted.
    pub fn charset_is_valid(&self) -> bool {
        !self.charset.is_empty()
            && self
                .charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

/// Bounds applied by a driver to every round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect plus handshake
    pub connect: Duration,
    /// statements that return a result set
    pub read: Duration,
    /// statements that only report affected rows, and transaction control
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(10),
            write: Duration::from_secs(10),
        }
    }
}
