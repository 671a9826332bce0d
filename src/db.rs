use anyhow::anyhow;
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "timetable.sqlite3";

pub fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'STANDARD',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS year_groups(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // No UNIQUE(year_group_id, subject_id): duplicate links are tolerated.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS year_subjects(
            id TEXT PRIMARY KEY,
            year_group_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            FOREIGN KEY(year_group_id) REFERENCES year_groups(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_year_subjects_year_group ON year_subjects(year_group_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_year_subjects_subject ON year_subjects(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            year_group_id TEXT,
            day_of_week INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE,
            FOREIGN KEY(year_group_id) REFERENCES year_groups(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_teacher ON schedules(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_year_group ON schedules(year_group_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_day ON schedules(day_of_week, start_time)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_schedules(
            id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            UNIQUE(schedule_id, student_id),
            FOREIGN KEY(schedule_id) REFERENCES schedules(id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_schedules_schedule ON student_schedules(schedule_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_schedules_student ON student_schedules(student_id)",
        [],
    )?;

    Ok(conn)
}

#[derive(Debug, Clone, Copy)]
pub struct SeedSummary {
    pub teachers: usize,
    pub subjects: usize,
    pub year_groups: usize,
    pub schedules: usize,
}

/// Populates an empty workspace with the starter dataset: five teachers,
/// the standard subject list, six year groups with their subject links, and
/// one week of Year 1 lessons.
pub fn seed_demo(conn: &mut Connection) -> anyhow::Result<SeedSummary> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM teachers", [], |r| r.get(0))?;
    if existing > 0 {
        return Err(anyhow!("workspace already contains data"));
    }

    let teachers: [(&str, &str, &str); 5] = [
        ("Sarah Johnson", "sarah@school.edu", "#f59e0b"),
        ("Michael Chen", "michael@school.edu", "#ef4444"),
        ("Emily Davis", "emily@school.edu", "#8b5cf6"),
        ("James Wilson", "james@school.edu", "#10b981"),
        ("Lisa Anderson", "lisa@school.edu", "#3b82f6"),
    ];

    let subjects: [(&str, &str, &str); 14] = [
        ("Math", "#a78bfa", "MAIN"),
        ("Science", "#f87171", "MAIN"),
        ("English", "#fbbf24", "MAIN"),
        ("History", "#fb923c", "MAIN"),
        ("Social Studies", "#67e8f9", "MAIN"),
        ("Economics", "#c4b5fd", "MAIN"),
        ("Religion and Ethics", "#6ee7b7", "MAIN"),
        ("Nutrition", "#fdba74", "MAIN"),
        ("Arts and Crafts", "#bef264", "MAIN"),
        ("Business", "#94a3b8", "MAIN"),
        ("Spanish", "#f0abfc", "MAIN"),
        ("Physical Education", "#86efac", "MAIN"),
        ("Intervention", "#fca5a5", "INTERVENTION"),
        ("Booster", "#93c5fd", "BOOSTER"),
    ];

    let year_names = ["Year 1", "Year 2", "Year 3", "Year 4", "Year 5", "Year 6"];

    // (teacher idx, subject idx, day, start, end) for Year 1's sample week.
    let lessons: [(usize, usize, i64, &str, &str); 16] = [
        (0, 3, 0, "07:30", "08:30"),
        (1, 1, 0, "09:30", "11:00"),
        (0, 0, 0, "09:30", "10:30"),
        (2, 5, 1, "07:30", "08:30"),
        (1, 1, 1, "08:30", "09:30"),
        (0, 4, 1, "09:30", "11:20"),
        (3, 7, 1, "13:15", "14:00"),
        (0, 0, 1, "13:15", "14:15"),
        (2, 2, 1, "14:15", "15:15"),
        (4, 8, 1, "15:15", "16:15"),
        (0, 0, 2, "08:30", "09:30"),
        (0, 3, 3, "07:30", "08:30"),
        (2, 5, 3, "07:30", "09:00"),
        (4, 4, 3, "07:30", "09:30"),
        (2, 2, 3, "14:15", "15:15"),
        (3, 6, 4, "08:30", "10:30"),
    ];
    // Every year group gets the four core subjects plus the intervention and
    // booster streams.
    let linked_subjects = [0usize, 1, 2, 3, 12, 13];

    let tx = conn.transaction()?;
    let ts = now_ts();

    let mut teacher_ids = Vec::with_capacity(teachers.len());
    for (name, email, color) in teachers {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO teachers(id, name, email, color, created_at) VALUES(?, ?, ?, ?, ?)",
            (&id, name, email, color, &ts),
        )?;
        teacher_ids.push(id);
    }

    let mut subject_ids = Vec::with_capacity(subjects.len());
    for (name, color, kind) in subjects {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO subjects(id, name, color, kind, created_at) VALUES(?, ?, ?, ?, ?)",
            (&id, name, color, kind, &ts),
        )?;
        subject_ids.push(id);
    }

    let mut year_group_ids = Vec::with_capacity(year_names.len());
    for name in year_names {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO year_groups(id, name, created_at) VALUES(?, ?, ?)",
            (&id, name, &ts),
        )?;
        year_group_ids.push(id);
    }

    for yg in &year_group_ids {
        for si in linked_subjects {
            tx.execute(
                "INSERT INTO year_subjects(id, year_group_id, subject_id) VALUES(?, ?, ?)",
                (Uuid::new_v4().to_string(), yg, &subject_ids[si]),
            )?;
        }
    }

    let y1 = &year_group_ids[0];
    for (ti, si, day, start, end) in lessons {
        tx.execute(
            "INSERT INTO schedules(id, teacher_id, subject_id, year_group_id, day_of_week,
                                   start_time, end_time, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &teacher_ids[ti],
                &subject_ids[si],
                y1,
                day,
                start,
                end,
                &ts,
            ),
        )?;
    }

    tx.commit()?;

    Ok(SeedSummary {
        teachers: teacher_ids.len(),
        subjects: subject_ids.len(),
        year_groups: year_group_ids.len(),
        schedules: lessons.len(),
    })
}
