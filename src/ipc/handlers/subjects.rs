use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, optional_str_list, require_admin, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub const DEFAULT_SUBJECT_COLOR: &str = "#a78bfa";
const KIND_MAIN: &str = "MAIN";
const KIND_INTERVENTION: &str = "INTERVENTION";
const KIND_BOOSTER: &str = "BOOSTER";

fn validate_kind(kind: &str) -> bool {
    matches!(kind, KIND_MAIN | KIND_INTERVENTION | KIND_BOOSTER)
}

fn year_group_links(
    conn: &Connection,
    subject_id: &str,
) -> Result<Vec<serde_json::Value>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT ys.id, ys.year_group_id, yg.name
         FROM year_subjects ys
         JOIN year_groups yg ON yg.id = ys.year_group_id
         WHERE ys.subject_id = ?
         ORDER BY yg.name, ys.id",
    )?;
    let rows = stmt.query_map([subject_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "yearGroupId": r.get::<_, String>(1)?,
            "yearGroupName": r.get::<_, String>(2)?,
        }))
    })?;
    rows.collect()
}

fn subject_row(conn: &Connection, id: &str) -> Result<Option<serde_json::Value>, rusqlite::Error> {
    let base = conn
        .query_row(
            "SELECT id, name, color, kind, created_at FROM subjects WHERE id = ?",
            [id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "color": r.get::<_, String>(2)?,
                    "type": r.get::<_, String>(3)?,
                    "createdAt": r.get::<_, String>(4)?,
                }))
            },
        )
        .optional()?;
    let Some(mut subject) = base else {
        return Ok(None);
    };
    subject["yearSubjects"] = json!(year_group_links(conn, id)?);
    Ok(Some(subject))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let ids = {
        let mut stmt = match conn.prepare("SELECT id FROM subjects ORDER BY name") {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        match stmt
            .query_map([], |r| r.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    };

    let mut subjects = Vec::with_capacity(ids.len());
    for id in ids {
        match subject_row(conn, &id) {
            Ok(Some(subject)) => subjects.push(subject),
            Ok(None) => {}
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    ok(&req.id, json!({ "subjects": subjects }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state, req) {
        return e;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let color = optional_str(req, "color").unwrap_or_else(|| DEFAULT_SUBJECT_COLOR.to_string());
    let kind = optional_str(req, "type").unwrap_or_else(|| KIND_MAIN.to_string());
    if !validate_kind(&kind) {
        return err(
            &req.id,
            "bad_params",
            "type must be one of: MAIN, INTERVENTION, BOOSTER",
            None,
        );
    }

    let year_group_ids = optional_str_list(req, "yearGroupIds").unwrap_or_default();

    let subject_id = Uuid::new_v4().to_string();
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute(
        "INSERT INTO subjects(id, name, color, kind, created_at) VALUES(?, ?, ?, ?, ?)",
        (&subject_id, &name, &color, &kind, db::now_ts()),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    // Optional initial links to year groups.
    for yg in &year_group_ids {
        if let Err(e) = tx.execute(
            "INSERT INTO year_subjects(id, year_group_id, subject_id) VALUES(?, ?, ?)",
            (Uuid::new_v4().to_string(), yg, &subject_id),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "year_subjects" })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match subject_row(conn, &subject_id) {
        Ok(Some(subject)) => ok(&req.id, json!({ "subject": subject })),
        Ok(None) => err(&req.id, "not_found", "subject not found after insert", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state, req) {
        return e;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&subject_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "subject not found", None);
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();
    if let Some(name) = optional_str(req, "name") {
        sets.push("name = ?");
        vals.push(Value::Text(name));
    }
    if let Some(color) = optional_str(req, "color") {
        sets.push("color = ?");
        vals.push(Value::Text(color));
    }
    if let Some(kind) = optional_str(req, "type") {
        if !validate_kind(&kind) {
            return err(
                &req.id,
                "bad_params",
                "type must be one of: MAIN, INTERVENTION, BOOSTER",
                None,
            );
        }
        sets.push("kind = ?");
        vals.push(Value::Text(kind));
    }

    // A supplied yearGroupIds list replaces every existing link.
    let year_group_ids = optional_str_list(req, "yearGroupIds");

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if !sets.is_empty() {
        let sql = format!("UPDATE subjects SET {} WHERE id = ?", sets.join(", "));
        vals.push(Value::Text(subject_id.clone()));
        if let Err(e) = tx.execute(&sql, params_from_iter(vals)) {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    if let Some(year_group_ids) = year_group_ids {
        if let Err(e) = tx.execute(
            "DELETE FROM year_subjects WHERE subject_id = ?",
            [&subject_id],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_delete_failed", e.to_string(), None);
        }
        for yg in &year_group_ids {
            if let Err(e) = tx.execute(
                "INSERT INTO year_subjects(id, year_group_id, subject_id) VALUES(?, ?, ?)",
                (Uuid::new_v4().to_string(), yg, &subject_id),
            ) {
                let _ = tx.rollback();
                return err(&req.id, "db_insert_failed", e.to_string(), None);
            }
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match subject_row(conn, &subject_id) {
        Ok(Some(subject)) => ok(&req.id, json!({ "subject": subject })),
        Ok(None) => err(&req.id, "not_found", "subject not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state, req) {
        return e;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let deleted = match conn.execute("DELETE FROM subjects WHERE id = ?", [&subject_id]) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "subjects" })),
            )
        }
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "subject not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_list(state, req)),
        "subjects.create" => Some(handle_create(state, req)),
        "subjects.update" => Some(handle_update(state, req)),
        "subjects.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
