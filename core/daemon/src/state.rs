//! State owned by the daemon: the record store, the seat layout, and the
//! latest board evaluation published by the board worker.
//!
//! Connection threads write through the store. The store fans snapshots out to
//! the single board worker, which also receives clock ticks; the worker keeps
//! `latest` current for `get_board` requests that do not pin an instant.

use chrono::{DateTime, Utc};
use seatboard_core::{
    apply, spawn_ticker, AwayKind, Board, BoardEvent, BoardView, Clock, EvalInstant, LiveBoard,
    OverrideCommand, RecordStore, SeatLayout, SeatView, SeatboardError, Student,
};
use seatboard_daemon_protocol::{CommandEnvelope, CommandKind};
use serde::Serialize;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct SeatDetail {
    pub seat: Option<SeatView>,
    pub student: Option<Student>,
    pub in_layout: bool,
}

pub struct SharedState {
    store: Arc<SqliteStore>,
    layout: Arc<SeatLayout>,
    clock: Arc<dyn Clock + Sync>,
    latest: Arc<Mutex<Option<BoardView>>>,
    events: Mutex<Sender<BoardEvent>>,
    tick_interval: Duration,
    started_at: DateTime<Utc>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SharedState {
    /// Spawns the board worker and the ticker, then subscribes the worker to
    /// the store so it evaluates the current snapshot right away.
    pub fn start(
        store: SqliteStore,
        layout: SeatLayout,
        clock: Arc<dyn Clock + Sync>,
        tick_interval: Duration,
    ) -> Result<Self, SeatboardError> {
        let duplicates = layout.duplicate_seats();
        if !duplicates.is_empty() {
            tracing::warn!(seats = ?duplicates, "Seat layout lists some seats more than once");
        }

        let store = Arc::new(store);
        let layout = Arc::new(layout);
        let latest: Arc<Mutex<Option<BoardView>>> = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::channel();

        let worker = LiveBoard::new(Arc::clone(&layout), Arc::clone(&clock));
        let sink = Arc::clone(&latest);
        thread::spawn(move || {
            worker.run(rx, |view| {
                tracing::debug!(
                    at = %view.evaluated_at,
                    occupied = view.summary.occupied,
                    present = view.summary.present,
                    "Board evaluated"
                );
                *lock(&sink) = Some(view.clone());
            })
        });

        store.subscribe(tx.clone())?;
        spawn_ticker(tick_interval, tx.clone());

        Ok(Self {
            store,
            layout,
            clock,
            latest,
            events: Mutex::new(tx),
            tick_interval,
            started_at: Utc::now(),
        })
    }

    pub fn health_snapshot(&self) -> serde_json::Value {
        let students = match self.store.count() {
            Ok(count) => serde_json::json!(count),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to count students for health");
                serde_json::Value::Null
            }
        };
        let last_evaluated = lock(&self.latest)
            .as_ref()
            .map(|view| view.evaluated_at.to_string());
        serde_json::json!({
            "students": students,
            "seats": self.layout.seat_count(),
            "tick_interval_secs": self.tick_interval.as_secs(),
            "started_at": self.started_at.to_rfc3339(),
            "last_evaluated_at": last_evaluated,
        })
    }

    /// The board at `at`. Without an instant this is the worker's latest
    /// evaluation, provided it is for the current minute.
    pub fn board(&self, at: Option<EvalInstant>) -> Result<BoardView, SeatboardError> {
        let now = self.clock.instant();
        match at {
            None => {
                if let Some(view) = lock(&self.latest).as_ref() {
                    if view.evaluated_at == now {
                        return Ok(view.clone());
                    }
                }
                self.evaluate(&now)
            }
            Some(at) => self.evaluate(&at),
        }
    }

    fn evaluate(&self, at: &EvalInstant) -> Result<BoardView, SeatboardError> {
        let board = Board::from_snapshot(self.store.snapshot()?);
        Ok(board.evaluate(&self.layout, at))
    }

    pub fn seat(
        &self,
        seat_id: &str,
        at: Option<EvalInstant>,
    ) -> Result<SeatDetail, SeatboardError> {
        let at = at.unwrap_or_else(|| self.clock.instant());
        let view = self.evaluate(&at)?;
        Ok(SeatDetail {
            seat: view.seat(seat_id).cloned(),
            student: self.store.get(seat_id)?,
            in_layout: self.layout.contains_seat(seat_id),
        })
    }

    pub fn students(&self) -> Result<Vec<Student>, SeatboardError> {
        self.store.snapshot()
    }

    pub fn command(&self, envelope: &CommandEnvelope) -> Result<(), SeatboardError> {
        tracing::debug!(
            command_id = %envelope.command_id,
            issued_at = %envelope.issued_at,
            "Applying override command"
        );
        apply(
            self.store.as_ref(),
            &envelope.seat_id,
            &override_command(envelope),
        )
    }

    /// Normalizes, validates and writes a full record.
    pub fn upsert_student(&self, student: Student) -> Result<Student, SeatboardError> {
        let student = student.normalized();
        student.validate()?;
        self.store.put(&student)?;
        tracing::info!(seat = %student.seat_id, "Student record saved");
        Ok(student)
    }

    /// Returns whether a record existed.
    pub fn delete_student(&self, seat_id: &str) -> Result<bool, SeatboardError> {
        let existed = self.store.get(seat_id)?.is_some();
        self.store.delete(seat_id)?;
        if existed {
            tracing::info!(seat = %seat_id, "Student record deleted");
        }
        Ok(existed)
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<BoardView> {
        lock(&self.latest).clone()
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        let _ = lock(&self.events).send(BoardEvent::Shutdown);
    }
}

fn override_command(envelope: &CommandEnvelope) -> OverrideCommand {
    match envelope.command {
        CommandKind::MarkAway => OverrideCommand::MarkAway {
            kind: AwayKind::SteppedOut,
        },
        CommandKind::MarkOut => OverrideCommand::MarkAway {
            kind: AwayKind::Out,
        },
        CommandKind::MarkReturned => OverrideCommand::MarkReturned,
        CommandKind::MarkAbsent => OverrideCommand::MarkAbsent,
        CommandKind::SetMemo => OverrideCommand::SetMemo(envelope.memo.clone().unwrap_or_default()),
        CommandKind::QuickRegister => OverrideCommand::QuickRegister {
            name: envelope.name.clone().unwrap_or_default(),
        },
    }
}
