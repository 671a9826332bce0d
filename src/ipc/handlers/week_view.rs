use super::schedules::{row_to_schedule, SCHEDULE_SELECT};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, optional_str_list};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{
    self, GridLayout, ScheduleSlot, TeacherFilter, DAY_NAMES, DEFAULT_HOUR_HEIGHT,
};
use chrono::{Local, NaiveDate};
use serde_json::json;
use std::collections::HashMap;

/// Assembles one week of the calendar: resolved dates, laid-out day buckets,
/// lunch overlays, and per-teacher workload strings.
fn handle_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let reference_date = match optional_str(req, "date") {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("date must be YYYY-MM-DD, got {}", raw),
                    None,
                )
            }
        },
        None => Local::now().date_naive(),
    };
    // Prev/next navigation: whole weeks relative to the reference date.
    let week_offset = req
        .params
        .get("weekOffset")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let reference_date = timetable::shift_week(reference_date, week_offset);

    let hour_height = match req.params.get("hourHeight") {
        None => DEFAULT_HOUR_HEIGHT,
        Some(v) => match v.as_f64().filter(|h| *h > 0.0) {
            Some(h) => h,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "hourHeight must be a positive number",
                    None,
                )
            }
        },
    };
    let layout = GridLayout::new(hour_height);

    let year_group_id = optional_str(req, "yearGroupId");
    let selected_teachers = optional_str_list(req, "teacherIds").unwrap_or_default();

    let sql = match &year_group_id {
        Some(_) => format!(
            "{} WHERE s.year_group_id = ? ORDER BY s.day_of_week, s.start_time",
            SCHEDULE_SELECT
        ),
        None => format!("{} ORDER BY s.day_of_week, s.start_time", SCHEDULE_SELECT),
    };
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = match &year_group_id {
        Some(yg) => stmt.query_map([yg], row_to_schedule),
        None => stmt.query_map([], row_to_schedule),
    }
    .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // The embedded rows double as display payloads; the slots feed the
    // layout/workload/partition layer.
    let mut by_id: HashMap<String, serde_json::Value> = HashMap::new();
    let mut slots: Vec<ScheduleSlot> = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<ScheduleSlot>(row.clone()) {
            Ok(slot) => {
                by_id.insert(slot.id.clone(), row);
                slots.push(slot);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let filter = TeacherFilter::from_ids(selected_teachers);
    let visible = filter.apply(&slots);
    let days = timetable::partition_by_day(&visible);

    let day_blocks: Vec<Vec<serde_json::Value>> = days
        .iter()
        .map(|bucket| {
            bucket
                .iter()
                .map(|slot| {
                    let style = layout.block_style(&slot.start_time, &slot.end_time);
                    let mut block = by_id.get(&slot.id).cloned().unwrap_or_else(|| json!({}));
                    block["top"] = json!(style.top_px());
                    block["height"] = json!(style.height_px());
                    block
                })
                .collect()
        })
        .collect();

    let dates = timetable::week_dates(reference_date);
    let week_dates: Vec<serde_json::Value> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            json!({
                "date": d.format("%Y-%m-%d").to_string(),
                "day": DAY_NAMES[i],
                "isToday": timetable::is_today(*d),
            })
        })
        .collect();

    // Workload is computed over the full scoped set, not the teacher-filtered
    // view, so the sidebar totals stay stable while filtering.
    let workload = {
        let mut stmt = match conn.prepare("SELECT id, name, color FROM teachers ORDER BY name") {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        let teachers = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>());
        match teachers {
            Ok(list) => list
                .into_iter()
                .map(|(id, name, color)| {
                    json!({
                        "teacherId": id,
                        "name": name,
                        "color": color,
                        "hours": timetable::teacher_hours(&slots, &id),
                    })
                })
                .collect::<Vec<_>>(),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    };

    let lunch_breaks: Vec<serde_json::Value> = layout
        .lunch_breaks()
        .iter()
        .map(|b| json!({ "top": b.top_px(), "height": b.height_px() }))
        .collect();

    ok(
        &req.id,
        json!({
            "weekDates": week_dates,
            "label": timetable::format_date_range(&dates),
            "timeSlots": layout.time_slots(),
            "lunchBreaks": lunch_breaks,
            "days": day_blocks,
            "workload": workload,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.week" => Some(handle_week(state, req)),
        _ => None,
    }
}
