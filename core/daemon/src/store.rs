//! `RecordStore` over the daemon's SQLite database.
//!
//! Every successful write re-reads the table and publishes the full snapshot
//! to subscribers (the board worker). Failed writes publish nothing.
//!
//! Writes are serialized through `writes` together with their publish, so the
//! worker never receives an older snapshot after a newer one.

use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};

use seatboard_core::{
    BoardEvent, RecordStore, Result, SeatboardError, SnapshotHub, Student, StudentPatch,
};

use crate::db::Db;

pub struct SqliteStore {
    db: Db,
    hub: SnapshotHub,
    writes: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            hub: SnapshotHub::new(),
            writes: Mutex::new(()),
        }
    }

    pub fn count(&self) -> Result<usize> {
        self.db
            .count_students()
            .map_err(|err| SeatboardError::store_read("count", err))
    }

    fn publish(&self) {
        match self.db.list_students() {
            Ok(snapshot) => self.hub.publish(snapshot),
            Err(err) => tracing::warn!(error = %err, "Failed to read snapshot after write"),
        }
    }
}

impl RecordStore for SqliteStore {
    fn subscribe(&self, sender: Sender<BoardEvent>) -> Result<()> {
        let _writes = lock(&self.writes);
        let initial = self.snapshot()?;
        self.hub.add(sender, initial);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<Student>> {
        self.db
            .list_students()
            .map_err(|err| SeatboardError::store_read("snapshot", err))
    }

    fn get(&self, seat_id: &str) -> Result<Option<Student>> {
        self.db
            .get_student(seat_id)
            .map_err(|err| SeatboardError::store_read("get", err))
    }

    fn put(&self, student: &Student) -> Result<()> {
        let _writes = lock(&self.writes);
        self.db
            .upsert_student(student)
            .map_err(|err| SeatboardError::store_write("put", err))?;
        self.publish();
        Ok(())
    }

    fn merge(&self, seat_id: &str, patch: &StudentPatch) -> Result<()> {
        let _writes = lock(&self.writes);
        let found = self
            .db
            .update_student(seat_id, |student| patch.apply_to(student))
            .map_err(|err| SeatboardError::store_write("merge", err))?;
        if !found {
            return Err(SeatboardError::StudentNotFound(seat_id.to_string()));
        }
        self.publish();
        Ok(())
    }

    fn insert_new(&self, student: &Student) -> Result<()> {
        let _writes = lock(&self.writes);
        let inserted = self
            .db
            .insert_student_if_absent(student)
            .map_err(|err| SeatboardError::store_write("insert", err))?;
        if !inserted {
            return Err(SeatboardError::SeatOccupied(student.seat_id.clone()));
        }
        self.publish();
        Ok(())
    }

    fn delete(&self, seat_id: &str) -> Result<()> {
        let _writes = lock(&self.writes);
        let deleted = self
            .db
            .delete_student(seat_id)
            .map_err(|err| SeatboardError::store_write("delete", err))?;
        if deleted {
            self.publish();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatboard_core::{apply, OverrideCommand, OverrideStatus};
    use std::sync::{mpsc, Arc};
    use std::thread;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Db::new(temp_dir.path().join("students.db")).expect("db init");
        (temp_dir, SqliteStore::new(db))
    }

    fn snapshot_len(event: BoardEvent) -> usize {
        match event {
            BoardEvent::Snapshot(students) => students.len(),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn subscribers_see_every_write() {
        let (_dir, store) = temp_store();
        let (tx, rx) = mpsc::channel();
        store.subscribe(tx).expect("subscribe");
        assert_eq!(snapshot_len(rx.try_recv().expect("initial")), 0);

        store.put(&Student::quick("독-001", "Kim")).expect("put");
        assert_eq!(snapshot_len(rx.try_recv().expect("after put")), 1);

        apply(
            &store,
            "독-002",
            &OverrideCommand::QuickRegister {
                name: "Lee".to_string(),
            },
        )
        .expect("quick register");
        assert_eq!(snapshot_len(rx.try_recv().expect("after insert")), 2);

        store.delete("독-001").expect("delete");
        assert_eq!(snapshot_len(rx.try_recv().expect("after delete")), 1);
    }

    #[test]
    fn failed_commands_publish_nothing() {
        let (_dir, store) = temp_store();
        store.put(&Student::quick("독-001", "Kim")).expect("put");
        let (tx, rx) = mpsc::channel();
        store.subscribe(tx).expect("subscribe");
        let _ = rx.try_recv();

        let err = apply(&store, "독-050", &OverrideCommand::MarkAbsent).unwrap_err();
        assert!(matches!(err, SeatboardError::StudentNotFound(_)));
        let err = apply(
            &store,
            "독-001",
            &OverrideCommand::QuickRegister {
                name: "Lee".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SeatboardError::SeatOccupied(_)));
        assert!(rx.try_recv().is_err());

        let stored = store.get("독-001").expect("get").expect("present");
        assert_eq!(stored.name, "Kim");
        assert_eq!(stored.override_status, OverrideStatus::Enrolled);
    }

    #[test]
    fn concurrent_writes_reach_subscribers_in_order() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let (tx, rx) = mpsc::channel();
        store.subscribe(tx).expect("subscribe");

        let writers: Vec<_> = (0..6)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .put(&Student::quick(&format!("독-{:03}", n), "Kim"))
                        .expect("put");
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("writer");
        }

        let sizes: Vec<usize> = rx.try_iter().map(snapshot_len).collect();
        assert_eq!(sizes, vec![0, 1, 2, 3, 4, 5, 6]);
    }
}
