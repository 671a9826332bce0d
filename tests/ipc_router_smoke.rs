mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_reports_version_and_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let workspace = temp_dir("timetable-smoke");
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        selected.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );

    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert!(health
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .is_some());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let code = request_err(&mut stdin, &mut reader, "1", "no.such.method", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn entity_reads_work_without_a_session() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = temp_dir("timetable-smoke-reads");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, method) in [
        "teachers.list",
        "subjects.list",
        "yearGroups.list",
        "students.list",
        "schedules.list",
    ]
    .iter()
    .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("r{}", i),
            method,
            json!({}),
        );
        assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
    }

    let _ = std::fs::remove_dir_all(workspace);
}
