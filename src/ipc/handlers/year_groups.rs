use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, optional_str_list, require_admin, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn subject_links(
    conn: &Connection,
    year_group_id: &str,
) -> Result<Vec<serde_json::Value>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT ys.id, ys.subject_id, s.name, s.color, s.kind
         FROM year_subjects ys
         JOIN subjects s ON s.id = ys.subject_id
         WHERE ys.year_group_id = ?
         ORDER BY s.name, ys.id",
    )?;
    let rows = stmt.query_map([year_group_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "subjectId": r.get::<_, String>(1)?,
            "subjectName": r.get::<_, String>(2)?,
            "subjectColor": r.get::<_, String>(3)?,
            "subjectType": r.get::<_, String>(4)?,
        }))
    })?;
    rows.collect()
}

fn year_group_row(
    conn: &Connection,
    id: &str,
) -> Result<Option<serde_json::Value>, rusqlite::Error> {
    let base = conn
        .query_row(
            "SELECT
               yg.id,
               yg.name,
               yg.created_at,
               (SELECT COUNT(*) FROM schedules s WHERE s.year_group_id = yg.id) AS schedule_count
             FROM year_groups yg
             WHERE yg.id = ?",
            [id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "createdAt": r.get::<_, String>(2)?,
                    "scheduleCount": r.get::<_, i64>(3)?,
                }))
            },
        )
        .optional()?;
    let Some(mut year_group) = base else {
        return Ok(None);
    };
    year_group["yearSubjects"] = json!(subject_links(conn, id)?);
    Ok(Some(year_group))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let ids = {
        let mut stmt = match conn.prepare("SELECT id FROM year_groups ORDER BY name") {
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

    let mut year_groups = Vec::with_capacity(ids.len());
    for id in ids {
        match year_group_row(conn, &id) {
            Ok(Some(yg)) => year_groups.push(yg),
            Ok(None) => {}
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    ok(&req.id, json!({ "yearGroups": year_groups }))
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
    let subject_ids = optional_str_list(req, "subjectIds").unwrap_or_default();

    let year_group_id = Uuid::new_v4().to_string();
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute(
        "INSERT INTO year_groups(id, name, created_at) VALUES(?, ?, ?)",
        (&year_group_id, &name, db::now_ts()),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "year_groups" })),
        );
    }

    for sid in &subject_ids {
        if let Err(e) = tx.execute(
            "INSERT INTO year_subjects(id, year_group_id, subject_id) VALUES(?, ?, ?)",
            (Uuid::new_v4().to_string(), &year_group_id, sid),
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

    match year_group_row(conn, &year_group_id) {
        Ok(Some(yg)) => ok(&req.id, json!({ "yearGroup": yg })),
        Ok(None) => err(&req.id, "not_found", "year group not found after insert", None),
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
    let year_group_id = match required_str(req, "yearGroupId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM year_groups WHERE id = ?",
            [&year_group_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "year group not found", None);
    }

    let name = optional_str(req, "name");
    let subject_ids = optional_str_list(req, "subjectIds");

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Some(name) = &name {
        if let Err(e) = tx.execute(
            "UPDATE year_groups SET name = ? WHERE id = ?",
            (name, &year_group_id),
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    if let Some(subject_ids) = subject_ids {
        if let Err(e) = tx.execute(
            "DELETE FROM year_subjects WHERE year_group_id = ?",
            [&year_group_id],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_delete_failed", e.to_string(), None);
        }
        for sid in &subject_ids {
            if let Err(e) = tx.execute(
                "INSERT INTO year_subjects(id, year_group_id, subject_id) VALUES(?, ?, ?)",
                (Uuid::new_v4().to_string(), &year_group_id, sid),
            ) {
                let _ = tx.rollback();
                return err(&req.id, "db_insert_failed", e.to_string(), None);
            }
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match year_group_row(conn, &year_group_id) {
        Ok(Some(yg)) => ok(&req.id, json!({ "yearGroup": yg })),
        Ok(None) => err(&req.id, "not_found", "year group not found", None),
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
    let year_group_id = match required_str(req, "yearGroupId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let deleted = match conn.execute("DELETE FROM year_groups WHERE id = ?", [&year_group_id]) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "year_groups" })),
            )
        }
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "year group not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "yearGroups.list" => Some(handle_list(state, req)),
        "yearGroups.create" => Some(handle_create(state, req)),
        "yearGroups.update" => Some(handle_update(state, req)),
        "yearGroups.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
