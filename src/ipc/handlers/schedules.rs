use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, optional_str, optional_str_list, require_admin, required_day_of_week, required_str,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn enrolled_students(
    conn: &Connection,
    schedule_id: &str,
) -> Result<Vec<serde_json::Value>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT st.id, st.name
         FROM student_schedules ss
         JOIN students st ON st.id = ss.student_id
         WHERE ss.schedule_id = ?
         ORDER BY st.name",
    )?;
    let rows = stmt.query_map([schedule_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
        }))
    })?;
    rows.collect()
}

pub(super) const SCHEDULE_SELECT: &str = "SELECT
   s.id, s.teacher_id, s.subject_id, s.year_group_id, s.day_of_week,
   s.start_time, s.end_time, s.created_at,
   t.name, t.email, t.color,
   sub.name, sub.color, sub.kind,
   yg.name
 FROM schedules s
 JOIN teachers t ON t.id = s.teacher_id
 JOIN subjects sub ON sub.id = s.subject_id
 LEFT JOIN year_groups yg ON yg.id = s.year_group_id";

pub(super) fn row_to_schedule(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let teacher_id: String = r.get(1)?;
    let subject_id: String = r.get(2)?;
    let year_group_id: Option<String> = r.get(3)?;
    let year_group_name: Option<String> = r.get(14)?;
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "teacherId": teacher_id.clone(),
        "subjectId": subject_id.clone(),
        "yearGroupId": year_group_id.clone(),
        "dayOfWeek": r.get::<_, i64>(4)?,
        "startTime": r.get::<_, String>(5)?,
        "endTime": r.get::<_, String>(6)?,
        "createdAt": r.get::<_, String>(7)?,
        "teacher": {
            "id": teacher_id,
            "name": r.get::<_, String>(8)?,
            "email": r.get::<_, String>(9)?,
            "color": r.get::<_, String>(10)?,
        },
        "subject": {
            "id": subject_id,
            "name": r.get::<_, String>(11)?,
            "color": r.get::<_, String>(12)?,
            "type": r.get::<_, String>(13)?,
        },
        "yearGroup": year_group_id.map(|id| json!({
            "id": id,
            "name": year_group_name,
        })),
    }))
}

fn schedule_row(conn: &Connection, id: &str) -> Result<Option<serde_json::Value>, rusqlite::Error> {
    let sql = format!("{} WHERE s.id = ?", SCHEDULE_SELECT);
    let base = conn.query_row(&sql, [id], |r| row_to_schedule(r)).optional()?;
    let Some(mut schedule) = base else {
        return Ok(None);
    };
    schedule["students"] = json!(enrolled_students(conn, id)?);
    Ok(Some(schedule))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let mut clauses: Vec<&str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();
    if let Some(teacher_id) = optional_str(req, "teacherId") {
        clauses.push("s.teacher_id = ?");
        vals.push(Value::Text(teacher_id));
    }
    if let Some(year_group_id) = optional_str(req, "yearGroupId") {
        clauses.push("s.year_group_id = ?");
        vals.push(Value::Text(year_group_id));
    }
    if let Some(day) = req.params.get("dayOfWeek").and_then(|v| v.as_i64()) {
        clauses.push("s.day_of_week = ?");
        vals.push(Value::Integer(day));
    }

    let mut sql = SCHEDULE_SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY s.day_of_week, s.start_time");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(vals), |r| row_to_schedule(r))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let mut schedules = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    for schedule in &mut schedules {
        let sid = schedule["id"].as_str().unwrap_or_default().to_string();
        match enrolled_students(conn, &sid) {
            Ok(students) => schedule["students"] = json!(students),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    ok(&req.id, json!({ "schedules": schedules }))
}

fn ensure_exists(
    conn: &Connection,
    table: &str,
    id: &str,
) -> Result<bool, rusqlite::Error> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ? LIMIT 1", table);
    Ok(conn
        .query_row(&sql, [id], |_r| Ok(()))
        .optional()?
        .is_some())
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state, req) {
        return e;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    // Required-field presence per the gateway contract. startTime < endTime
    // is deliberately not checked, matching the original behavior.
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day_of_week = match required_day_of_week(req, "dayOfWeek") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_time = match required_str(req, "startTime") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end_time = match required_str(req, "endTime") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year_group_id = optional_str(req, "yearGroupId");
    let student_ids = optional_str_list(req, "studentIds").unwrap_or_default();

    for (table, id) in [("teachers", &teacher_id), ("subjects", &subject_id)] {
        match ensure_exists(conn, table, id) {
            Ok(true) => {}
            Ok(false) => {
                return err(
                    &req.id,
                    "not_found",
                    format!("referenced {} record not found", table),
                    None,
                )
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let schedule_id = Uuid::new_v4().to_string();
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if let Err(e) = tx.execute(
        "INSERT INTO schedules(id, teacher_id, subject_id, year_group_id, day_of_week,
                               start_time, end_time, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &schedule_id,
            &teacher_id,
            &subject_id,
            &year_group_id,
            day_of_week,
            &start_time,
            &end_time,
            db::now_ts(),
        ),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "schedules" })),
        );
    }

    for sid in &student_ids {
        if let Err(e) = tx.execute(
            "INSERT INTO student_schedules(id, schedule_id, student_id) VALUES(?, ?, ?)",
            (Uuid::new_v4().to_string(), &schedule_id, sid),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "student_schedules" })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match schedule_row(conn, &schedule_id) {
        Ok(Some(schedule)) => ok(&req.id, json!({ "schedule": schedule })),
        Ok(None) => err(&req.id, "not_found", "schedule not found after insert", None),
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
    let schedule_id = match required_str(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match ensure_exists(conn, "schedules", &schedule_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "schedule not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();
    if let Some(teacher_id) = optional_str(req, "teacherId") {
        sets.push("teacher_id = ?");
        vals.push(Value::Text(teacher_id));
    }
    if let Some(subject_id) = optional_str(req, "subjectId") {
        sets.push("subject_id = ?");
        vals.push(Value::Text(subject_id));
    }
    if let Some(year_group_id) = optional_str(req, "yearGroupId") {
        sets.push("year_group_id = ?");
        vals.push(Value::Text(year_group_id));
    }
    if req.params.get("dayOfWeek").map_or(false, |v| !v.is_null()) {
        let day = match required_day_of_week(req, "dayOfWeek") {
            Ok(v) => v,
            Err(e) => return e,
        };
        sets.push("day_of_week = ?");
        vals.push(Value::Integer(day));
    }
    if let Some(start_time) = optional_str(req, "startTime") {
        sets.push("start_time = ?");
        vals.push(Value::Text(start_time));
    }
    if let Some(end_time) = optional_str(req, "endTime") {
        sets.push("end_time = ?");
        vals.push(Value::Text(end_time));
    }

    let student_ids = optional_str_list(req, "studentIds");

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    if !sets.is_empty() {
        let sql = format!("UPDATE schedules SET {} WHERE id = ?", sets.join(", "));
        vals.push(Value::Text(schedule_id.clone()));
        if let Err(e) = tx.execute(&sql, params_from_iter(vals)) {
            let _ = tx.rollback();
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    // A supplied studentIds list replaces the enrollment set.
    if let Some(student_ids) = student_ids {
        if let Err(e) = tx.execute(
            "DELETE FROM student_schedules WHERE schedule_id = ?",
            [&schedule_id],
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_delete_failed", e.to_string(), None);
        }
        for sid in &student_ids {
            if let Err(e) = tx.execute(
                "INSERT INTO student_schedules(id, schedule_id, student_id) VALUES(?, ?, ?)",
                (Uuid::new_v4().to_string(), &schedule_id, sid),
            ) {
                let _ = tx.rollback();
                return err(&req.id, "db_insert_failed", e.to_string(), None);
            }
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    match schedule_row(conn, &schedule_id) {
        Ok(Some(schedule)) => ok(&req.id, json!({ "schedule": schedule })),
        Ok(None) => err(&req.id, "not_found", "schedule not found", None),
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
    let schedule_id = match required_str(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let deleted = match conn.execute("DELETE FROM schedules WHERE id = ?", [&schedule_id]) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "schedules" })),
            )
        }
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "schedule not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.list" => Some(handle_list(state, req)),
        "schedules.create" => Some(handle_create(state, req)),
        "schedules.update" => Some(handle_update(state, req)),
        "schedules.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
