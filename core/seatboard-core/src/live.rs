//! Live board driver.
//!
//! One thread owns the [`Board`]. Store snapshots and clock ticks arrive on a
//! single channel; every snapshot replaces the student map and every event
//! re-evaluates the whole board at the clock's current instant.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::board::{Board, BoardView};
use crate::clock::Clock;
use crate::layout::SeatLayout;
use crate::types::{StatusCategory, Student};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Full collection from the record store.
    Snapshot(Vec<Student>),
    /// Periodic re-evaluation with no record change.
    Tick,
    Shutdown,
}

/// Sends [`BoardEvent::Tick`] every `interval` until the receiver hangs up.
pub fn spawn_ticker(interval: Duration, sender: Sender<BoardEvent>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(interval);
        if sender.send(BoardEvent::Tick).is_err() {
            tracing::debug!("Board receiver gone; ticker stopping");
            break;
        }
    })
}

/// A seat whose derived category changed between two evaluations. `None`
/// means the seat had no occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub seat_id: String,
    pub from: Option<StatusCategory>,
    pub to: Option<StatusCategory>,
}

pub fn transitions(previous: &BoardView, next: &BoardView) -> Vec<StatusTransition> {
    let mut before: HashMap<&str, Option<StatusCategory>> = previous
        .seats()
        .map(|view| (view.seat_id.as_str(), view.category()))
        .collect();

    let mut changes = Vec::new();
    for view in next.seats() {
        let from = before.remove(view.seat_id.as_str()).flatten();
        let to = view.category();
        if from != to {
            changes.push(StatusTransition {
                seat_id: view.seat_id.clone(),
                from,
                to,
            });
        }
    }

    // Unplaced seats whose student was deleted.
    let mut vanished: Vec<StatusTransition> = before
        .into_iter()
        .filter_map(|(seat_id, from)| {
            from.map(|from| StatusTransition {
                seat_id: seat_id.to_string(),
                from: Some(from),
                to: None,
            })
        })
        .collect();
    vanished.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
    changes.extend(vanished);
    changes
}

fn category_name(category: Option<StatusCategory>) -> &'static str {
    category.map(|c| c.as_str()).unwrap_or("EMPTY")
}

pub struct LiveBoard<C: Clock> {
    board: Board,
    layout: Arc<SeatLayout>,
    clock: C,
    current: Option<BoardView>,
}

impl<C: Clock> LiveBoard<C> {
    pub fn new(layout: Arc<SeatLayout>, clock: C) -> Self {
        LiveBoard {
            board: Board::new(),
            layout,
            clock,
            current: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> Option<&BoardView> {
        self.current.as_ref()
    }

    /// Applies one event and returns the fresh evaluation, or `None` for
    /// [`BoardEvent::Shutdown`].
    pub fn handle(&mut self, event: BoardEvent) -> Option<&BoardView> {
        match event {
            BoardEvent::Snapshot(students) => {
                tracing::debug!(students = students.len(), "Snapshot received");
                self.board.replace(students);
            }
            BoardEvent::Tick => {}
            BoardEvent::Shutdown => return None,
        }
        Some(self.evaluate())
    }

    fn evaluate(&mut self) -> &BoardView {
        let at = self.clock.instant();
        let view = self.board.evaluate(&self.layout, &at);
        if let Some(previous) = &self.current {
            for change in transitions(previous, &view) {
                tracing::info!(
                    seat = %change.seat_id,
                    from = category_name(change.from),
                    to = category_name(change.to),
                    at = %at,
                    "Seat status changed"
                );
            }
        }
        self.current.insert(view)
    }

    /// Consumes events until shutdown or until every sender is gone, handing
    /// each evaluation to `publish`.
    pub fn run<F>(mut self, events: Receiver<BoardEvent>, mut publish: F)
    where
        F: FnMut(&BoardView),
    {
        for event in events {
            if event == BoardEvent::Shutdown {
                tracing::info!("Board worker shutting down");
                return;
            }
            if let Some(view) = self.handle(event) {
                publish(view);
            }
        }
        tracing::info!("Board event channel closed");
    }
}
