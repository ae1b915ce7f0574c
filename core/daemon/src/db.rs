//! SQLite persistence for seatboard-daemon.
//!
//! The daemon is the single writer. One row per seat; the full record is kept
//! as a JSON payload, with name and status copied out for ad-hoc queries.

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use seatboard_core::Student;
use std::path::PathBuf;

pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    /// Every decodable record, ordered by seat. Rows whose payload no longer
    /// parses are skipped with a warning so one bad row cannot hide the board.
    pub fn list_students(&self) -> Result<Vec<Student>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT seat_id, payload FROM students ORDER BY seat_id ASC")
                .map_err(|err| format!("Failed to prepare students query: {}", err))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|err| format!("Failed to read student rows: {}", err))?;

            let mut students = Vec::new();
            for row in rows {
                let (seat_id, payload) =
                    row.map_err(|err| format!("Failed to decode student row: {}", err))?;
                match serde_json::from_str::<Student>(&payload) {
                    Ok(student) => students.push(student),
                    Err(err) => {
                        tracing::warn!(seat = %seat_id, error = %err, "Skipping unreadable student row");
                    }
                }
            }

            Ok(students)
        })
    }

    pub fn get_student(&self, seat_id: &str) -> Result<Option<Student>, String> {
        self.with_connection(|conn| read_student(conn, seat_id))
    }

    pub fn upsert_student(&self, student: &Student) -> Result<(), String> {
        self.with_connection(|conn| write_student(conn, student))
    }

    /// Inserts only if the seat is free. Returns false when it is taken.
    pub fn insert_student_if_absent(&self, student: &Student) -> Result<bool, String> {
        self.with_connection(|conn| {
            let payload = serde_json::to_string(student)
                .map_err(|err| format!("Failed to serialize student payload: {}", err))?;
            let inserted = conn
                .execute(
                    "INSERT INTO students (seat_id, name, status, payload, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(seat_id) DO NOTHING",
                    params![
                        student.seat_id,
                        student.name,
                        student.override_status.as_str(),
                        payload,
                        Utc::now().to_rfc3339()
                    ],
                )
                .map_err(|err| format!("Failed to insert student: {}", err))?;
            Ok(inserted > 0)
        })
    }

    /// Read-modify-write inside one immediate transaction. Returns false when
    /// no record exists at `seat_id`.
    pub fn update_student(
        &self,
        seat_id: &str,
        update: impl FnOnce(&mut Student),
    ) -> Result<bool, String> {
        self.with_connection(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|err| format!("Failed to begin transaction: {}", err))?;

            let Some(mut student) = read_student(&tx, seat_id)? else {
                return Ok(false);
            };
            update(&mut student);
            write_student(&tx, &student)?;

            tx.commit()
                .map_err(|err| format!("Failed to commit student update: {}", err))?;
            Ok(true)
        })
    }

    /// Returns false when there was nothing to delete.
    pub fn delete_student(&self, seat_id: &str) -> Result<bool, String> {
        self.with_connection(|conn| {
            let deleted = conn
                .execute("DELETE FROM students WHERE seat_id = ?1", params![seat_id])
                .map_err(|err| format!("Failed to delete student: {}", err))?;
            Ok(deleted > 0)
        })
    }

    pub fn count_students(&self) -> Result<usize, String> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM students", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count.max(0) as usize)
            .map_err(|err| format!("Failed to count students: {}", err))
        })
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS students (
                    seat_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    status TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create daemon data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

fn read_student(conn: &Connection, seat_id: &str) -> Result<Option<Student>, String> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM students WHERE seat_id = ?1",
            params![seat_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| format!("Failed to read student {}: {}", seat_id, err))?;

    payload
        .map(|payload| {
            serde_json::from_str::<Student>(&payload)
                .map_err(|err| format!("Failed to parse student {}: {}", seat_id, err))
        })
        .transpose()
}

fn write_student(conn: &Connection, student: &Student) -> Result<(), String> {
    let payload = serde_json::to_string(student)
        .map_err(|err| format!("Failed to serialize student payload: {}", err))?;
    conn.execute(
        "INSERT INTO students (seat_id, name, status, payload, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(seat_id) DO UPDATE SET \
            name = excluded.name, \
            status = excluded.status, \
            payload = excluded.payload, \
            updated_at = excluded.updated_at",
        params![
            student.seat_id,
            student.name,
            student.override_status.as_str(),
            payload,
            Utc::now().to_rfc3339()
        ],
    )
    .map_err(|err| format!("Failed to upsert student: {}", err))?;
    Ok(())
}
