//! Override commands.
//!
//! Each command is one write against the record store. Nothing here looks at
//! schedules or the clock: the next snapshot or tick re-derives status.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeatboardError};
use crate::store::RecordStore;
use crate::types::{OverrideStatus, Student, StudentPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwayKind {
    /// Short break away from the seat.
    #[default]
    SteppedOut,
    /// Long outing.
    Out,
}

impl AwayKind {
    pub fn status(self) -> OverrideStatus {
        match self {
            AwayKind::SteppedOut => OverrideStatus::SteppedOut,
            AwayKind::Out => OverrideStatus::Out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideCommand {
    MarkAway { kind: AwayKind },
    MarkReturned,
    MarkAbsent,
    SetMemo(String),
    QuickRegister { name: String },
}

impl OverrideCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OverrideCommand::MarkAway { .. } => "mark_away",
            OverrideCommand::MarkReturned => "mark_returned",
            OverrideCommand::MarkAbsent => "mark_absent",
            OverrideCommand::SetMemo(_) => "set_memo",
            OverrideCommand::QuickRegister { .. } => "quick_register",
        }
    }

    /// The field patch for commands that update an existing record.
    fn patch(&self) -> Option<StudentPatch> {
        match self {
            OverrideCommand::MarkAway { kind } => Some(StudentPatch::status(kind.status())),
            OverrideCommand::MarkReturned => Some(StudentPatch::status(OverrideStatus::Enrolled)),
            OverrideCommand::MarkAbsent => Some(StudentPatch::status(OverrideStatus::Absent)),
            OverrideCommand::SetMemo(memo) => Some(StudentPatch::memo(memo)),
            OverrideCommand::QuickRegister { .. } => None,
        }
    }
}

/// Applies `command` to the record at `seat_id`.
///
/// Failures are returned to the caller and never retried. The store is the
/// only state touched, so a failed write leaves every board as it was.
pub fn apply(store: &dyn RecordStore, seat_id: &str, command: &OverrideCommand) -> Result<()> {
    let seat_id = seat_id.trim();
    if seat_id.is_empty() {
        return Err(SeatboardError::InvalidRecord {
            seat: String::new(),
            reason: "seat number is required".to_string(),
        });
    }

    let result = match (command, command.patch()) {
        (OverrideCommand::QuickRegister { name }, _) => {
            let student = Student::quick(seat_id, name.trim());
            student.validate()?;
            store.insert_new(&student)
        }
        (_, Some(patch)) => store.merge(seat_id, &patch),
        (_, None) => Ok(()),
    };

    match &result {
        Ok(()) => tracing::info!(seat = %seat_id, command = command.name(), "Override applied"),
        Err(err) => tracing::warn!(
            seat = %seat_id,
            command = command.name(),
            error = %err,
            "Override failed"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::BoardEvent;
    use crate::store::MemoryStore;
    use crate::types::{DayOfWeek, WeeklyTimeWindow};
    use std::sync::mpsc::Sender;

    fn store_with(seat: &str) -> MemoryStore {
        let mut student = Student::quick(seat, "Kim");
        student
            .schedules
            .push(WeeklyTimeWindow::new(DayOfWeek::Tue, "14:00", "16:00"));
        MemoryStore::with_students(vec![student])
    }

    fn status_of(store: &MemoryStore, seat: &str) -> OverrideStatus {
        store.get(seat).unwrap().unwrap().override_status
    }

    #[test]
    fn test_mark_away_and_return() {
        let store = store_with("A-1");
        apply(&store, "A-1", &OverrideCommand::MarkAway { kind: AwayKind::SteppedOut }).unwrap();
        assert_eq!(status_of(&store, "A-1"), OverrideStatus::SteppedOut);

        apply(&store, "A-1", &OverrideCommand::MarkAway { kind: AwayKind::Out }).unwrap();
        assert_eq!(status_of(&store, "A-1"), OverrideStatus::Out);

        apply(&store, "A-1", &OverrideCommand::MarkReturned).unwrap();
        assert_eq!(status_of(&store, "A-1"), OverrideStatus::Enrolled);
    }

    #[test]
    fn test_mark_absent_keeps_schedules() {
        let store = store_with("A-1");
        apply(&store, "A-1", &OverrideCommand::MarkAbsent).unwrap();
        let student = store.get("A-1").unwrap().unwrap();
        assert_eq!(student.override_status, OverrideStatus::Absent);
        assert_eq!(student.schedules.len(), 1);
    }

    #[test]
    fn test_set_memo() {
        let store = store_with("A-1");
        apply(&store, "A-1", &OverrideCommand::SetMemo("call parent".to_string())).unwrap();
        let student = store.get("A-1").unwrap().unwrap();
        assert_eq!(student.memo, "call parent");
        assert!(student.has_memo());
    }

    #[test]
    fn test_field_commands_need_existing_record() {
        let store = MemoryStore::new();
        let err = apply(&store, "A-9", &OverrideCommand::MarkAbsent).unwrap_err();
        assert!(matches!(err, SeatboardError::StudentNotFound(_)));
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_quick_register_creates_minimal_record() {
        let store = MemoryStore::new();
        apply(
            &store,
            "독-012",
            &OverrideCommand::QuickRegister { name: " Park ".to_string() },
        )
        .unwrap();
        let student = store.get("독-012").unwrap().unwrap();
        assert_eq!(student.name, "Park");
        assert_eq!(student.id, "독-012");
        assert_eq!(student.override_status, OverrideStatus::Enrolled);
        assert!(student.schedules.is_empty());
        assert!(student.mentoring_sessions.is_empty());
        assert!(!student.has_memo());
    }

    #[test]
    fn test_quick_register_rejects_occupied_seat_and_blank_name() {
        let store = store_with("A-1");
        let err = apply(
            &store,
            "A-1",
            &OverrideCommand::QuickRegister { name: "Lee".to_string() },
        )
        .unwrap_err();
        assert!(matches!(err, SeatboardError::SeatOccupied(_)));

        let err = apply(
            &store,
            "A-2",
            &OverrideCommand::QuickRegister { name: "  ".to_string() },
        )
        .unwrap_err();
        assert!(matches!(err, SeatboardError::InvalidRecord { .. }));
        assert!(store.get("A-2").unwrap().is_none());
    }

    #[test]
    fn test_blank_seat_is_rejected() {
        let store = store_with("A-1");
        let err = apply(&store, " ", &OverrideCommand::MarkReturned).unwrap_err();
        assert!(matches!(err, SeatboardError::InvalidRecord { .. }));
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn subscribe(&self, _sender: Sender<BoardEvent>) -> Result<()> {
            Ok(())
        }
        fn snapshot(&self) -> Result<Vec<Student>> {
            Ok(Vec::new())
        }
        fn get(&self, _seat_id: &str) -> Result<Option<Student>> {
            Ok(None)
        }
        fn put(&self, _student: &Student) -> Result<()> {
            Err(SeatboardError::store_write("put", "disk full"))
        }
        fn merge(&self, _seat_id: &str, _patch: &StudentPatch) -> Result<()> {
            Err(SeatboardError::store_write("merge", "disk full"))
        }
        fn insert_new(&self, _student: &Student) -> Result<()> {
            Err(SeatboardError::store_write("insert", "disk full"))
        }
        fn delete(&self, _seat_id: &str) -> Result<()> {
            Err(SeatboardError::store_write("delete", "disk full"))
        }
    }

    #[test]
    fn test_store_write_failure_is_reported() {
        let err = apply(&FailingStore, "A-1", &OverrideCommand::MarkAbsent).unwrap_err();
        assert!(matches!(err, SeatboardError::StoreWrite { .. }));
        assert!(err.to_string().contains("disk full"));
    }
}
