//! Record-store seam.
//!
//! The store owns student records keyed by seat number. Every successful
//! write publishes a full snapshot to all subscribers; consumers replace their
//! map with it rather than merging. Concurrent writers are last-writer-wins.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! embedders; the daemon provides a SQLite-backed one.

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, SeatboardError};
use crate::live::BoardEvent;
use crate::types::{Student, StudentPatch};

pub trait RecordStore: Send + Sync {
    /// Registers a subscriber. It receives the current snapshot right away and
    /// a fresh one after every write.
    fn subscribe(&self, sender: Sender<BoardEvent>) -> Result<()>;

    fn snapshot(&self) -> Result<Vec<Student>>;

    fn get(&self, seat_id: &str) -> Result<Option<Student>>;

    /// Writes the whole record, creating or replacing it.
    fn put(&self, student: &Student) -> Result<()>;

    /// Applies a field patch to an existing record.
    fn merge(&self, seat_id: &str, patch: &StudentPatch) -> Result<()>;

    /// Creates a record only if the seat is free.
    fn insert_new(&self, student: &Student) -> Result<()>;

    fn delete(&self, seat_id: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot fan-out
// ═══════════════════════════════════════════════════════════════════════════════

/// Subscriber list shared by store implementations.
#[derive(Default)]
pub struct SnapshotHub {
    subscribers: Mutex<Vec<Sender<BoardEvent>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sender: Sender<BoardEvent>, initial: Vec<Student>) {
        if sender.send(BoardEvent::Snapshot(initial)).is_ok() {
            lock(&self.subscribers).push(sender);
        }
    }

    /// Sends `snapshot` to every live subscriber and forgets the ones that
    /// hung up.
    pub fn publish(&self, snapshot: Vec<Student>) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|sender| sender.send(BoardEvent::Snapshot(snapshot.clone())).is_ok());
        tracing::debug!(
            subscribers = subscribers.len(),
            students = snapshot.len(),
            "Snapshot published"
        );
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Student>>,
    hub: SnapshotHub,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(students: Vec<Student>) -> Self {
        let records = students
            .into_iter()
            .map(|student| (student.seat_id.clone(), student))
            .collect();
        MemoryStore {
            records: Mutex::new(records),
            hub: SnapshotHub::new(),
        }
    }

    /// Publishes while the caller still holds the records lock, so
    /// subscribers receive snapshots in write order.
    fn publish(&self, records: &BTreeMap<String, Student>) {
        self.hub.publish(records.values().cloned().collect());
    }
}

impl RecordStore for MemoryStore {
    fn subscribe(&self, sender: Sender<BoardEvent>) -> Result<()> {
        let records = lock(&self.records);
        self.hub.add(sender, records.values().cloned().collect());
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<Student>> {
        Ok(lock(&self.records).values().cloned().collect())
    }

    fn get(&self, seat_id: &str) -> Result<Option<Student>> {
        Ok(lock(&self.records).get(seat_id).cloned())
    }

    fn put(&self, student: &Student) -> Result<()> {
        let mut records = lock(&self.records);
        records.insert(student.seat_id.clone(), student.clone());
        self.publish(&records);
        Ok(())
    }

    fn merge(&self, seat_id: &str, patch: &StudentPatch) -> Result<()> {
        let mut records = lock(&self.records);
        let record = records
            .get_mut(seat_id)
            .ok_or_else(|| SeatboardError::StudentNotFound(seat_id.to_string()))?;
        patch.apply_to(record);
        self.publish(&records);
        Ok(())
    }

    fn insert_new(&self, student: &Student) -> Result<()> {
        let mut records = lock(&self.records);
        if records.contains_key(&student.seat_id) {
            return Err(SeatboardError::SeatOccupied(student.seat_id.clone()));
        }
        records.insert(student.seat_id.clone(), student.clone());
        self.publish(&records);
        Ok(())
    }

    fn delete(&self, seat_id: &str) -> Result<()> {
        let mut records = lock(&self.records);
        if records.remove(seat_id).is_some() {
            self.publish(&records);
        }
        Ok(())
    }
}
