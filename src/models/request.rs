use serde::{Deserialize, Deserializer};

use crate::udbc::value::Value;
use crate::udbc::{ConnectOptions, DEFAULT_CHARSET};

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

/// `null` args mean no args.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl From<ConnectRequest> for ConnectOptions {
    fn from(req: ConnectRequest) -> Self {
        ConnectOptions::new(req.host, req.port, req.database)
            .user(req.user)
            .password(req.password)
            .charset(req.charset)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    #[serde(alias = "connection_id")]
    pub connection_id: u64,
}

/// query / insert / update / delete
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlRequest {
    #[serde(alias = "connection_id")]
    pub connection_id: u64,
    #[serde(alias = "sql")]
    pub statement: String,
    #[serde(default, alias = "sql_args", deserialize_with = "null_as_empty")]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    #[serde(alias = "sql")]
    pub statement: String,
    #[serde(default, alias = "sql_args", deserialize_with = "null_as_empty")]
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(statement: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTransactionRequest {
    #[serde(alias = "connection_id")]
    pub connection_id: u64,
    #[serde(alias = "sql_requests")]
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionRequest {
    #[serde(alias = "connection_id")]
    pub connection_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExecuteRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(alias = "sql")]
    pub statement: String,
    #[serde(default, alias = "sql_args", deserialize_with = "null_as_empty")]
    pub args: Vec<Value>,
}

/// commit / rollback
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(alias = "session_id")]
    pub session_id: String,
}
