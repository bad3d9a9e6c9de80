use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::udbc::value::Value;

/// 响应错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConnectDatabaseFailed,
    ConnectionIdNotExists,
    QueryDatabaseFailed,
    InsertDatabaseFailed,
    DeleteDatabaseFailed,
    UpdateDatabaseFailed,
    TransactionFailed,
    InvalidRequest,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            ErrorCode::ConnectDatabaseFailed => 1001,
            ErrorCode::ConnectionIdNotExists => 1002,
            ErrorCode::QueryDatabaseFailed => 2001,
            ErrorCode::InsertDatabaseFailed => 3001,
            ErrorCode::DeleteDatabaseFailed => 4001,
            ErrorCode::UpdateDatabaseFailed => 5001,
            ErrorCode::TransactionFailed => 6001,
            ErrorCode::InvalidRequest => 7001,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::ConnectDatabaseFailed => "CONNECT_DATABASE_FAILED",
            ErrorCode::ConnectionIdNotExists => "CONNECTION_ID_NOT_EXISTS",
            ErrorCode::QueryDatabaseFailed => "QUERY_DATABASE_FAILED",
            ErrorCode::InsertDatabaseFailed => "INSERT_DATABASE_FAILED",
            ErrorCode::DeleteDatabaseFailed => "DELETE_DATABASE_FAILED",
            ErrorCode::UpdateDatabaseFailed => "UPDATE_DATABASE_FAILED",
            ErrorCode::TransactionFailed => "TRANSACTION_FAILED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    /// failing statement(s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<Vec<String>>,
    /// position of the failing statement inside a static transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            sql: None,
            index: None,
            hint: None,
        }
    }

    pub fn field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn sql(mut self, sql: Vec<String>) -> Self {
        self.sql = Some(sql);
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// The envelope every operation returns.
///
/// `data` is only present when `result` is true; `error_code` and `errors`
/// only when it is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    pub operator: &'static str,
    pub result: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub timestamp: DateTime<Utc>,
}

impl<T> Response<T> {
    pub fn success(operator: &'static str, message: impl Into<String>, data: T) -> Self {
        Self {
            operator,
            result: true,
            message: message.into(),
            data: Some(data),
            error_code: None,
            errors: None,
            level: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(operator: &'static str, message: impl Into<String>, detail: ErrorDetail) -> Self {
        Self {
            operator,
            result: false,
            message: message.into(),
            data: None,
            error_code: Some(detail.code),
            errors: Some(vec![detail]),
            level: Some(Level::Error),
            timestamp: Utc::now(),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn is_success(&self) -> bool {
        self.result
    }

    /// First error detail, if this is a failure.
    pub fn first_error(&self) -> Option<&ErrorDetail> {
        self.errors.as_ref().and_then(|e| e.first())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
    pub connection_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

/// Insert and in-session statement results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteData {
    pub affected_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedData {
    pub affected_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResult {
    pub index: usize,
    pub statement: String,
    pub affected_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTransactionData {
    pub results: Vec<StatementResult>,
    pub statement_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitData {
    pub session_id: String,
    pub total_affected_rows: u64,
    pub executed_statement_count: u64,
    pub commit_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: &'static str,
    pub service: String,
    pub connection_count: usize,
    pub active_session_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoData {
    pub service_name: String,
    pub service_id: String,
    pub version: &'static str,
    pub host: String,
    pub port: u16,
    pub connection_count: usize,
    pub active_session_count: usize,
    pub connection_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_has_no_error_fields() {
        let r = Response::success("Connect Database", "ok", ConnectData { connection_id: 3 });
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["operator"], "Connect Database");
        assert_eq!(v["result"], true);
        assert_eq!(v["data"], json!({ "connectionId": 3 }));
        assert!(v.get("errorCode").is_none());
        assert!(v.get("errors").is_none());
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn test_failure_has_no_data() {
        let detail = ErrorDetail::new(ErrorCode::TransactionFailed, "boom")
            .field("sql")
            .index(2)
            .sql(vec!["UPDATE t SET a = 1".into()]);
        let r: Response<AffectedData> = Response::failure("Transaction", "Transaction failed.", detail);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["result"], false);
        assert_eq!(v["errorCode"], 6001);
        assert_eq!(v["level"], "error");
        assert!(v.get("data").is_none());
        assert_eq!(
            v["errors"],
            json!([{
                "code": 6001,
                "message": "boom",
                "field": "sql",
                "sql": ["UPDATE t SET a = 1"],
                "index": 2
            }])
        );
    }

    #[test]
    fn test_codes_match_wire_values() {
        assert_eq!(ErrorCode::ConnectionIdNotExists.as_u16(), 1002);
        assert_eq!(ErrorCode::ConnectionIdNotExists.name(), "CONNECTION_ID_NOT_EXISTS");
        assert_eq!(serde_json::to_value(ErrorCode::DeleteDatabaseFailed).unwrap(), json!(4001));
    }

    #[test]
    fn test_optional_insert_id_is_omitted() {
        let v = serde_json::to_value(WriteData {
            affected_rows: 1,
            last_insert_id: None,
        })
        .unwrap();
        assert_eq!(v, json!({ "affectedRows": 1 }));
    }
}
