use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request, Role};
use rusqlite::Connection;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent and explicit-null both mean "leave the field alone", matching the
/// partial-update contract.
pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn optional_str_list(req: &Request, key: &str) -> Option<Vec<String>> {
    req.params.get(key).and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect()
    })
}

pub fn required_day_of_week(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    let day = req
        .params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    if !(0..5).contains(&day) {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be in 0..=4 (Monday..Friday)", key),
            None,
        ));
    }
    Ok(day)
}

/// The single authorization guard for every protected write. The failure is
/// uniform regardless of what was being changed.
pub fn require_admin(state: &AppState, req: &Request) -> Result<(), serde_json::Value> {
    match state.session.as_ref() {
        Some(s) if s.role == Role::Admin => Ok(()),
        _ => Err(err(
            &req.id,
            "unauthorized",
            "administrator role required",
            None,
        )),
    }
}
