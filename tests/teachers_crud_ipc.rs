mod test_support;

use serde_json::json;
use test_support::{open_admin_workspace, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn teacher_create_requires_name_and_email() {
    let workspace = temp_dir("timetable-teachers-validate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_admin_workspace(&mut stdin, &mut reader, &workspace);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "email": "sarah@school.edu" }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "Sarah Johnson" }),
    );
    assert_eq!(code, "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn teacher_lifecycle_create_patch_delete() {
    let workspace = temp_dir("timetable-teachers-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_admin_workspace(&mut stdin, &mut reader, &workspace);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "name": "Sarah Johnson", "email": "sarah@school.edu" }),
    );
    let teacher = &created["teacher"];
    let teacher_id = teacher["id"].as_str().expect("teacher id").to_string();
    // Color falls back to the default when not supplied.
    assert_eq!(teacher["color"].as_str(), Some("#6366f1"));
    assert!(teacher["createdAt"].as_str().is_some());

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "Other", "email": "sarah@school.edu" }),
    );
    assert_eq!(code, "email_taken");

    // Patch only the color; name and email stay put.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.update",
        json!({ "teacherId": teacher_id, "color": "#f59e0b" }),
    );
    assert_eq!(updated["teacher"]["color"].as_str(), Some("#f59e0b"));
    assert_eq!(updated["teacher"]["name"].as_str(), Some("Sarah Johnson"));
    assert_eq!(
        updated["teacher"]["email"].as_str(),
        Some("sarah@school.edu")
    );

    // A patch with no recognized fields is a no-op, not an error.
    let untouched = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "teachers.update",
        json!({ "teacherId": teacher_id }),
    );
    assert_eq!(untouched["teacher"]["color"].as_str(), Some("#f59e0b"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.update",
        json!({ "teacherId": "missing-id", "name": "X" }),
    );
    assert_eq!(code, "not_found");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "teachers.delete",
        json!({ "teacherId": teacher_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "teachers.delete",
        json!({ "teacherId": teacher_id }),
    );
    assert_eq!(code, "not_found");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn teacher_list_is_ordered_with_schedule_counts() {
    let workspace = temp_dir("timetable-teachers-list");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_admin_workspace(&mut stdin, &mut reader, &workspace);

    let t_b = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "name": "Brian Lee", "email": "brian@school.edu" }),
    )["teacher"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let _t_a = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "Amy Poole", "email": "amy@school.edu" }),
    );
    let subject_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({ "name": "Math" }),
    )["subject"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.create",
        json!({
            "teacherId": t_b, "subjectId": subject_id, "dayOfWeek": 0,
            "startTime": "07:30", "endTime": "08:30"
        }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "5", "teachers.list", json!({}));
    let teachers = listed["teachers"].as_array().expect("teachers array");
    assert_eq!(teachers.len(), 2);
    assert_eq!(teachers[0]["name"].as_str(), Some("Amy Poole"));
    assert_eq!(teachers[0]["scheduleCount"].as_i64(), Some(0));
    assert_eq!(teachers[1]["name"].as_str(), Some("Brian Lee"));
    assert_eq!(teachers[1]["scheduleCount"].as_i64(), Some(1));

    // Deleting the teacher takes the schedule with it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "teachers.delete",
        json!({ "teacherId": t_b }),
    );
    let schedules = request_ok(&mut stdin, &mut reader, "7", "schedules.list", json!({}));
    assert_eq!(
        schedules["schedules"].as_array().map(Vec::len),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}
