//! IPC protocol types and validation for seatboard-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

// Error codes carried in `ErrorInfo::code`. Clients match on these; the
// message is for humans only.
//
// Transport (request could not be read): `request_too_large`,
// `read_timeout`, `read_error`, `empty_request`, `invalid_json`.
// Envelope and params: `protocol_mismatch`, `invalid_params`,
// `missing_field`, `invalid_command_id`, `invalid_timestamp`,
// `invalid_weekday`, `invalid_time`, `invalid_instant`.
// Store and records: `student_not_found`, `seat_occupied`,
// `invalid_record`, `store_write_failed`, `store_read_failed`,
// `serialization_error`.
pub const ERROR_REQUEST_TOO_LARGE: &str = "request_too_large";
pub const ERROR_READ_TIMEOUT: &str = "read_timeout";
pub const ERROR_READ_FAILED: &str = "read_error";
pub const ERROR_EMPTY_REQUEST: &str = "empty_request";
pub const ERROR_INVALID_JSON: &str = "invalid_json";
pub const ERROR_PROTOCOL_MISMATCH: &str = "protocol_mismatch";
pub const ERROR_INVALID_PARAMS: &str = "invalid_params";
pub const ERROR_MISSING_FIELD: &str = "missing_field";
pub const ERROR_INVALID_COMMAND_ID: &str = "invalid_command_id";
pub const ERROR_INVALID_TIMESTAMP: &str = "invalid_timestamp";
pub const ERROR_INVALID_WEEKDAY: &str = "invalid_weekday";
pub const ERROR_INVALID_TIME: &str = "invalid_time";
pub const ERROR_INVALID_INSTANT: &str = "invalid_instant";
pub const ERROR_STUDENT_NOT_FOUND: &str = "student_not_found";
pub const ERROR_SEAT_OCCUPIED: &str = "seat_occupied";
pub const ERROR_INVALID_RECORD: &str = "invalid_record";
pub const ERROR_STORE_WRITE: &str = "store_write_failed";
pub const ERROR_STORE_READ: &str = "store_read_failed";
pub const ERROR_SERIALIZATION: &str = "serialization_error";

/// Every code the daemon can return.
pub const ERROR_CODES: &[&str] = &[
    ERROR_REQUEST_TOO_LARGE,
    ERROR_READ_TIMEOUT,
    ERROR_READ_FAILED,
    ERROR_EMPTY_REQUEST,
    ERROR_INVALID_JSON,
    ERROR_PROTOCOL_MISMATCH,
    ERROR_INVALID_PARAMS,
    ERROR_MISSING_FIELD,
    ERROR_INVALID_COMMAND_ID,
    ERROR_INVALID_TIMESTAMP,
    ERROR_INVALID_WEEKDAY,
    ERROR_INVALID_TIME,
    ERROR_INVALID_INSTANT,
    ERROR_STUDENT_NOT_FOUND,
    ERROR_SEAT_OCCUPIED,
    ERROR_INVALID_RECORD,
    ERROR_STORE_WRITE,
    ERROR_STORE_READ,
    ERROR_SERIALIZATION,
];

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(mon|tue|wed|thu|fri|sat|sun)[a-z]*$").expect("valid weekday regex")
});
static TIME_OF_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]?\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetBoard,
    GetSeat,
    ListStudents,
    Command,
    UpsertStudent,
    DeleteStudent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Board queries
// ═══════════════════════════════════════════════════════════════════════════════

/// Optional evaluation instant for `get_board` / `get_seat`. Both fields or
/// neither; when absent the daemon uses its own clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl BoardQuery {
    pub fn at(weekday: &str, time: &str) -> Self {
        Self {
            weekday: Some(weekday.to_string()),
            time: Some(time.to_string()),
        }
    }

    /// Returns the instant as `"<DAY> <HH:MM>"`, or `None` for "now".
    pub fn validate(&self) -> Result<Option<String>, ErrorInfo> {
        match (&self.weekday, &self.time) {
            (None, None) => Ok(None),
            (Some(weekday), Some(time)) => {
                let weekday = weekday.trim();
                let time = time.trim();
                if !WEEKDAY.is_match(weekday) {
                    return Err(ErrorInfo::new(
                        ERROR_INVALID_WEEKDAY,
                        format!("unknown weekday {:?}", weekday),
                    ));
                }
                if !TIME_OF_DAY.is_match(time) {
                    return Err(ErrorInfo::new(
                        ERROR_INVALID_TIME,
                        format!("time must be HH:MM, got {:?}", time),
                    ));
                }
                Ok(Some(format!("{} {}", weekday, time)))
            }
            _ => Err(ErrorInfo::new(
                ERROR_INVALID_PARAMS,
                "weekday and time must be given together",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeatQuery {
    pub seat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<BoardQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeatKey {
    pub seat_id: String,
}

pub fn parse_board_query(params: Option<Value>) -> Result<BoardQuery, ErrorInfo> {
    let query: BoardQuery = match params {
        None | Some(Value::Null) => BoardQuery::default(),
        Some(value) => serde_json::from_value(value).map_err(|err| {
            ErrorInfo::new(ERROR_INVALID_PARAMS, format!("board query is invalid: {}", err))
        })?,
    };
    query.validate()?;
    Ok(query)
}

pub fn parse_seat_query(params: Option<Value>) -> Result<SeatQuery, ErrorInfo> {
    let query: SeatQuery = parse_required(params, "seat query")?;
    require_string(&Some(query.seat_id.clone()), "seat_id")?;
    if let Some(at) = &query.at {
        at.validate()?;
    }
    Ok(query)
}

pub fn parse_seat_key(params: Option<Value>) -> Result<SeatKey, ErrorInfo> {
    let key: SeatKey = parse_required(params, "seat key")?;
    require_string(&Some(key.seat_id.clone()), "seat_id")?;
    Ok(key)
}

fn parse_required<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    what: &str,
) -> Result<T, ErrorInfo> {
    let params =
        params.ok_or_else(|| ErrorInfo::new(ERROR_INVALID_PARAMS, "params are required"))?;
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(ERROR_INVALID_PARAMS, format!("{} is invalid: {}", what, err))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Override commands
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum CommandKind {
    MarkAway,
    MarkOut,
    MarkReturned,
    MarkAbsent,
    SetMemo,
    QuickRegister,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandEnvelope {
    pub command_id: String,
    pub issued_at: String,
    pub seat_id: String,
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl CommandEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.command_id.trim().is_empty() {
            return Err(ErrorInfo::new(ERROR_INVALID_COMMAND_ID, "command_id is required"));
        }
        if self.command_id.len() > 128 {
            return Err(ErrorInfo::new(
                ERROR_INVALID_COMMAND_ID,
                "command_id must be 128 characters or fewer",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.issued_at).is_err() {
            return Err(ErrorInfo::new(ERROR_INVALID_TIMESTAMP, "issued_at must be RFC3339"));
        }

        require_string(&Some(self.seat_id.clone()), "seat_id")?;

        match self.command {
            CommandKind::QuickRegister => require_string(&self.name, "name")?,
            // An empty memo clears it, so only presence is required.
            CommandKind::SetMemo => {
                if self.memo.is_none() {
                    return Err(ErrorInfo::new(ERROR_MISSING_FIELD, "memo is required"));
                }
            }
            CommandKind::MarkAway
            | CommandKind::MarkOut
            | CommandKind::MarkReturned
            | CommandKind::MarkAbsent => {}
        }

        Ok(())
    }
}

pub fn parse_command(params: Value) -> Result<CommandEnvelope, ErrorInfo> {
    let envelope: CommandEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("command payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

fn require_string(value: &Option<String>, field: &str) -> Result<(), ErrorInfo> {
    if let Some(candidate) = value {
        if !candidate.trim().is_empty() {
            return Ok(());
        }
    }
    Err(ErrorInfo::new(ERROR_MISSING_FIELD, format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_command(command: CommandKind) -> CommandEnvelope {
        CommandEnvelope {
            command_id: "cmd-1".to_string(),
            issued_at: "2026-10-19T09:00:00+09:00".to_string(),
            seat_id: "독-001".to_string(),
            command,
            name: None,
            memo: None,
        }
    }

    #[test]
    fn validates_field_commands() {
        for kind in [
            CommandKind::MarkAway,
            CommandKind::MarkOut,
            CommandKind::MarkReturned,
            CommandKind::MarkAbsent,
        ] {
            assert!(base_command(kind).validate().is_ok());
        }
    }

    #[test]
    fn quick_register_requires_name() {
        let mut command = base_command(CommandKind::QuickRegister);
        assert_eq!(command.validate().unwrap_err().code, "missing_field");
        command.name = Some("  ".to_string());
        assert!(command.validate().is_err());
        command.name = Some("Kim".to_string());
        assert!(command.validate().is_ok());
    }

    #[test]
    fn set_memo_accepts_empty_memo() {
        let mut command = base_command(CommandKind::SetMemo);
        assert!(command.validate().is_err());
        command.memo = Some(String::new());
        assert!(command.validate().is_ok());
    }

    #[test]
    fn rejects_missing_seat() {
        let mut command = base_command(CommandKind::MarkAbsent);
        command.seat_id = " ".to_string();
        assert!(command.validate().is_err());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let mut command = base_command(CommandKind::MarkAway);
        command.issued_at = "yesterday".to_string();
        assert_eq!(command.validate().unwrap_err().code, "invalid_timestamp");
    }

    #[test]
    fn rejects_long_command_id() {
        let mut command = base_command(CommandKind::MarkAway);
        command.command_id = "a".repeat(256);
        assert!(command.validate().is_err());
    }

    #[test]
    fn parse_command_rejects_unknown_fields() {
        let err = parse_command(json!({
            "command_id": "cmd-1",
            "issued_at": "2026-10-19T09:00:00Z",
            "seat_id": "독-001",
            "command": "mark_away",
            "extra": true,
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn board_query_accepts_both_or_neither() {
        assert_eq!(BoardQuery::default().validate().unwrap(), None);
        assert_eq!(
            BoardQuery::at("wed", "13:00").validate().unwrap().as_deref(),
            Some("wed 13:00")
        );
        let half = BoardQuery {
            weekday: Some("WED".to_string()),
            time: None,
        };
        assert!(half.validate().is_err());
    }

    #[test]
    fn board_query_rejects_bad_values() {
        assert_eq!(
            BoardQuery::at("someday", "13:00").validate().unwrap_err().code,
            "invalid_weekday"
        );
        assert_eq!(
            BoardQuery::at("MON", "24:00").validate().unwrap_err().code,
            "invalid_time"
        );
        assert!(BoardQuery::at("MON", "9:00").validate().is_ok());
    }

    #[test]
    fn parse_board_query_treats_null_as_now() {
        assert_eq!(parse_board_query(None).unwrap(), BoardQuery::default());
        assert_eq!(
            parse_board_query(Some(Value::Null)).unwrap(),
            BoardQuery::default()
        );
    }

    #[test]
    fn seat_query_requires_seat() {
        assert!(parse_seat_query(None).is_err());
        assert!(parse_seat_query(Some(json!({ "seat_id": "" }))).is_err());
        let query = parse_seat_query(Some(json!({
            "seat_id": "독-001",
            "at": { "weekday": "FRI", "time": "10:00" }
        })))
        .unwrap();
        assert_eq!(query.seat_id, "독-001");
    }

    #[test]
    fn error_codes_are_unique_snake_case() {
        let mut seen = std::collections::HashSet::new();
        for code in ERROR_CODES {
            assert!(seen.insert(*code), "duplicate error code {}", code);
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
        assert!(ERROR_CODES.contains(&ERROR_READ_TIMEOUT));
        assert!(ERROR_CODES.contains(&ERROR_SERIALIZATION));
    }

    #[test]
    fn request_round_trips_method_names() {
        let request = Request::new(Method::GetBoard, None);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["method"], "get_board");
        assert_eq!(encoded["protocol_version"], PROTOCOL_VERSION);
    }
}
