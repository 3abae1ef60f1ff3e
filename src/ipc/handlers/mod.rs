pub mod attendance;
pub mod core;
pub mod reports;
pub mod students;
pub mod subjects;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{CoreError, Department, Year};
use chrono::NaiveDate;
use rusqlite::Connection;

/// Guard shared by every db-backed method: no workspace selected means no
/// connection to hand to the handler body.
pub(super) fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

/// Handler-level failure carrying the IPC error envelope fields. Core errors
/// convert losslessly; param parsing produces `bad_params`.
pub(super) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.message(),
            details: e.details(),
        }
    }
}

pub(super) fn required_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub(super) fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub(super) fn required_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<NaiveDate, HandlerErr> {
    let raw = required_str(params, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub(super) fn optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match optional_str(params, key) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))),
        None => Ok(None),
    }
}

pub(super) fn required_department(
    params: &serde_json::Value,
    key: &str,
) -> Result<Department, HandlerErr> {
    let raw = required_str(params, key)?;
    parse_department(&raw, key)
}

pub(super) fn optional_department(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Department>, HandlerErr> {
    match optional_str(params, key) {
        Some(raw) => parse_department(&raw, key).map(Some),
        None => Ok(None),
    }
}

fn parse_department(raw: &str, key: &str) -> Result<Department, HandlerErr> {
    Department::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!(
            "{} must be one of CSE, ECE, MECH, CIVIL, BA, IT",
            key
        ))
    })
}

pub(super) fn required_year(
    params: &serde_json::Value,
    key: &str,
) -> Result<Year, HandlerErr> {
    let raw = params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    Year::from_i64(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be between 1 and 4", key)))
}

pub(super) fn optional_year(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Year>, HandlerErr> {
    let Some(v) = params.get(key) else { return Ok(None) };
    if v.is_null() {
        return Ok(None);
    }
    let raw = v
        .as_i64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key)))?;
    Year::from_i64(raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be between 1 and 4", key)))
}
