use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, require_admin, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub const DEFAULT_TEACHER_COLOR: &str = "#6366f1";

fn teacher_row(conn: &Connection, id: &str) -> Result<Option<serde_json::Value>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, name, email, color, created_at FROM teachers WHERE id = ?",
        [id],
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "email": r.get::<_, String>(2)?,
                "color": r.get::<_, String>(3)?,
                "createdAt": r.get::<_, String>(4)?,
            }))
        },
    )
    .optional()
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT
           t.id,
           t.name,
           t.email,
           t.color,
           t.created_at,
           (SELECT COUNT(*) FROM schedules s WHERE s.teacher_id = t.id) AS schedule_count
         FROM teachers t
         ORDER BY t.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "email": r.get::<_, String>(2)?,
                "color": r.get::<_, String>(3)?,
                "createdAt": r.get::<_, String>(4)?,
                "scheduleCount": r.get::<_, i64>(5)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
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
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let color = optional_str(req, "color").unwrap_or_else(|| DEFAULT_TEACHER_COLOR.to_string());

    let taken: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken.is_some() {
        return err(&req.id, "email_taken", "teacher email already exists", None);
    }

    let teacher_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO teachers(id, name, email, color, created_at) VALUES(?, ?, ?, ?, ?)",
        (&teacher_id, &name, &email, &color, db::now_ts()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    match teacher_row(conn, &teacher_id) {
        Ok(Some(teacher)) => ok(&req.id, json!({ "teacher": teacher })),
        Ok(None) => err(&req.id, "not_found", "teacher not found after insert", None),
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
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match teacher_row(conn, &teacher_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "teacher not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // Partial update: only supplied fields change.
    let mut sets: Vec<&str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();
    if let Some(name) = optional_str(req, "name") {
        sets.push("name = ?");
        vals.push(Value::Text(name));
    }
    if let Some(email) = optional_str(req, "email") {
        sets.push("email = ?");
        vals.push(Value::Text(email));
    }
    if let Some(color) = optional_str(req, "color") {
        sets.push("color = ?");
        vals.push(Value::Text(color));
    }

    if !sets.is_empty() {
        let sql = format!("UPDATE teachers SET {} WHERE id = ?", sets.join(", "));
        vals.push(Value::Text(teacher_id.clone()));
        if let Err(e) = conn.execute(&sql, params_from_iter(vals)) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    match teacher_row(conn, &teacher_id) {
        Ok(Some(teacher)) => ok(&req.id, json!({ "teacher": teacher })),
        Ok(None) => err(&req.id, "not_found", "teacher not found", None),
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
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Dependent schedules go with the teacher via the cascade rules.
    let deleted = match conn.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id]) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "teachers" })),
            )
        }
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_list(state, req)),
        "teachers.create" => Some(handle_create(state, req)),
        "teachers.update" => Some(handle_update(state, req)),
        "teachers.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
