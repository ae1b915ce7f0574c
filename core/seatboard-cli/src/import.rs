//! Bulk import of student records.
//!
//! Two sources are accepted:
//!
//! - a JSON export: a top-level array of records or an object with a
//!   `students` array
//! - the facility's CSV timetable: seat, name, school and grade columns
//!   followed by an arrival/departure column pair for each weekday
//!
//! Records are normalized and validated here so a bad row is reported by
//! position before anything reaches the daemon.

use fs_err as fs;
use seatboard_core::{DayOfWeek, Student, WeeklyTimeWindow};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Lines above the first student row in the timetable (title and headers).
const TIMETABLE_HEADER_LINES: u64 = 3;
/// Column of Monday's arrival time; each day takes an arrival/departure pair.
const FIRST_DAY_COLUMN: usize = 5;
const WEEK: [DayOfWeek; 7] = [
    DayOfWeek::Mon,
    DayOfWeek::Tue,
    DayOfWeek::Wed,
    DayOfWeek::Thu,
    DayOfWeek::Fri,
    DayOfWeek::Sat,
    DayOfWeek::Sun,
];
/// Arrival cells that mean "no fixed schedule that day".
const NO_SCHEDULE: [&str; 3] = ["미등원", "자율 등원", "X"];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid import file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Records(Vec<serde_json::Value>),
    Wrapped { students: Vec<serde_json::Value> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Timetable,
}

impl ImportFormat {
    /// `.csv` files are timetables; anything else is read as JSON.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ImportFormat::Timetable,
            _ => ImportFormat::Json,
        }
    }
}

#[derive(Debug, Default)]
pub struct ImportBatch {
    pub students: Vec<Student>,
    /// `(row, reason)` for rows that were skipped. Rows are 1-based: the
    /// record position for JSON, the file line for timetables.
    pub rejected: Vec<(u64, String)>,
}

impl ImportBatch {
    fn accept(&mut self, row: u64, student: Student) {
        let student = student.normalized();
        match student.validate() {
            Ok(()) => self.students.push(student),
            Err(err) => self.rejected.push((row, err.to_string())),
        }
    }
}

pub fn read_file(path: &Path, format: ImportFormat) -> Result<ImportBatch, ImportError> {
    match format {
        ImportFormat::Json => read_students(path),
        ImportFormat::Timetable => parse_timetable(fs::File::open(path)?),
    }
}

pub fn read_students(path: &Path) -> Result<ImportBatch, ImportError> {
    let raw = fs::read_to_string(path)?;
    parse_students(&raw)
}

pub fn parse_students(raw: &str) -> Result<ImportBatch, ImportError> {
    let rows = match serde_json::from_str::<ImportFile>(raw)? {
        ImportFile::Records(rows) => rows,
        ImportFile::Wrapped { students } => students,
    };

    let mut batch = ImportBatch::default();
    for (row, value) in (1u64..).zip(rows) {
        match serde_json::from_value::<Student>(value) {
            Ok(student) => batch.accept(row, student),
            Err(err) => batch.rejected.push((row, err.to_string())),
        }
    }
    Ok(batch)
}

/// Reads the timetable export. Rows without a seat or name, and repeated
/// header rows, are skipped silently.
pub fn parse_timetable<R: Read>(reader: R) -> Result<ImportBatch, ImportError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut batch = ImportBatch::default();
    for result in csv.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map(|pos| pos.line()).unwrap_or(0);
                batch.rejected.push((line, err.to_string()));
                continue;
            }
        };
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        if line <= TIMETABLE_HEADER_LINES {
            continue;
        }

        let cell = |index: usize| record.get(index).map(str::trim).unwrap_or("");
        let seat = cell(0);
        let name = cell(2);
        if seat.is_empty() || name.is_empty() || seat.starts_with("좌석") {
            continue;
        }

        let mut student = Student::quick(seat, name);
        student.school = cell(3).to_string();
        student.grade = cell(4).to_string();
        for (offset, day) in WEEK.iter().enumerate() {
            let column = FIRST_DAY_COLUMN + offset * 2;
            student
                .schedules
                .extend(day_windows(*day, cell(column), cell(column + 1)));
        }
        tracing::debug!(seat = %seat, windows = student.schedules.len(), "Timetable row read");
        batch.accept(line, student);
    }
    Ok(batch)
}

/// One day's cells. `"9:00,14:00"` / `"12:00,18:00"` gives two windows; a
/// start without a matching end is open-ended.
fn day_windows(day: DayOfWeek, arrivals: &str, departures: &str) -> Vec<WeeklyTimeWindow> {
    if arrivals.is_empty() || NO_SCHEDULE.contains(&arrivals) {
        return Vec::new();
    }
    let ends: Vec<&str> = departures.split(',').map(str::trim).collect();
    arrivals
        .split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, start)| !start.is_empty())
        .map(|(index, start)| {
            let end = ends.get(index).copied().unwrap_or("");
            WeeklyTimeWindow::new(day, start, end)
        })
        .collect()
}
