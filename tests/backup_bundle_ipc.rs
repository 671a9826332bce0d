mod test_support;

#[path = "../src/backup.rs"]
mod backup;

use serde_json::json;
use std::io::Write;
use test_support::{open_admin_workspace, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn export_bundle_carries_manifest_and_digest() {
    let workspace = temp_dir("timetable-backup-export");
    let db_bytes = b"not a real database, but faithful bytes".to_vec();
    std::fs::write(workspace.join("timetable.sqlite3"), &db_bytes).unwrap();
    let out_path = workspace.join("out").join("bundle.zip");

    let summary = backup::export_workspace_bundle(&workspace, &out_path).unwrap();
    assert_eq!(summary.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(summary.entry_count, 3);

    let file = std::fs::File::open(&out_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let manifest: serde_json::Value = {
        let entry = archive.by_name("manifest.json").unwrap();
        serde_json::from_reader(entry).unwrap()
    };
    assert_eq!(
        manifest["format"].as_str(),
        Some(backup::BUNDLE_FORMAT_V1)
    );
    assert_eq!(
        manifest["dbSha256"].as_str(),
        Some(summary.db_sha256.as_str())
    );
    assert!(archive.by_name("db/timetable.sqlite3").is_ok());
    assert!(archive.by_name("meta/workspace.json").is_ok());

    // Round trip into a fresh workspace restores the exact bytes.
    let restore = temp_dir("timetable-backup-restore");
    let imported = backup::import_workspace_bundle(&out_path, &restore).unwrap();
    assert_eq!(imported.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(
        std::fs::read(restore.join("timetable.sqlite3")).unwrap(),
        db_bytes
    );

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restore);
}

#[test]
fn import_rejects_tampered_and_foreign_bundles() {
    let staging = temp_dir("timetable-backup-tamper");

    // A digest that cannot match the stored database bytes.
    let tampered = staging.join("tampered.zip");
    write_bundle(
        &tampered,
        &json!({ "format": backup::BUNDLE_FORMAT_V1, "dbSha256": "0".repeat(64) }),
        b"db bytes the manifest never hashed",
    );
    let err = backup::import_workspace_bundle(&tampered, &staging.join("ws1")).unwrap_err();
    assert!(err.to_string().contains("digest mismatch"), "{err:#}");

    // A zip that is not one of our bundles.
    let foreign = staging.join("foreign.zip");
    write_bundle(&foreign, &json!({ "format": "somebody-elses-v9" }), b"x");
    let err = backup::import_workspace_bundle(&foreign, &staging.join("ws2")).unwrap_err();
    assert!(err.to_string().contains("unsupported bundle format"), "{err:#}");

    // A failed import must not leave a database behind.
    assert!(!staging.join("ws1").join("timetable.sqlite3").exists());

    let _ = std::fs::remove_dir_all(staging);
}

#[test]
fn bare_sqlite_file_imports_directly() {
    let staging = temp_dir("timetable-backup-bare");
    let src = staging.join("old-backup.sqlite3");
    std::fs::write(&src, b"SQLite format 3\0 pretend payload").unwrap();

    let ws = staging.join("ws");
    let imported = backup::import_workspace_bundle(&src, &ws).unwrap();
    assert_eq!(imported.bundle_format_detected, "bare-sqlite3");
    assert_eq!(
        std::fs::read(ws.join("timetable.sqlite3")).unwrap(),
        std::fs::read(&src).unwrap()
    );

    let _ = std::fs::remove_dir_all(staging);
}

fn write_bundle(path: &std::path::Path, manifest: &serde_json::Value, db_bytes: &[u8]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).unwrap();
    zip.write_all(manifest.to_string().as_bytes()).unwrap();
    zip.start_file("db/timetable.sqlite3", opts).unwrap();
    zip.write_all(db_bytes).unwrap();
    zip.finish().unwrap();
}

#[test]
fn backup_round_trips_a_seeded_workspace_over_ipc() {
    let source = temp_dir("timetable-backup-ipc-src");
    let bundle = source.join("exports").join("school.zip");
    {
        let (_child, mut stdin, mut reader) = spawn_sidecar();
        open_admin_workspace(&mut stdin, &mut reader, &source);
        let _ = request_ok(&mut stdin, &mut reader, "1", "workspace.seed", json!({}));

        let exported = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "backup.export",
            json!({ "outPath": bundle.to_string_lossy() }),
        );
        assert_eq!(exported["bundleFormat"].as_str(), Some("timetable-workspace-v1"));
        assert_eq!(exported["entryCount"].as_i64(), Some(3));
        assert_eq!(exported["dbSha256"].as_str().map(str::len), Some(64));
    }

    let target = temp_dir("timetable-backup-ipc-dst");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": target.to_string_lossy() }),
    );

    // Import is an admin operation.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(code, "unauthorized");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.register",
        json!({ "email": "head@school.edu", "password": "pw" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "email": "head@school.edu", "password": "pw" }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        imported["bundleFormatDetected"].as_str(),
        Some("timetable-workspace-v1")
    );

    // The restored workspace serves the seeded records.
    let teachers = request_ok(&mut stdin, &mut reader, "6", "teachers.list", json!({}));
    assert_eq!(teachers["teachers"].as_array().map(Vec::len), Some(5));
    let schedules = request_ok(&mut stdin, &mut reader, "7", "schedules.list", json!({}));
    assert_eq!(schedules["schedules"].as_array().map(Vec::len), Some(16));

    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(target);
}
