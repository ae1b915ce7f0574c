//! The in-memory student map and its evaluation against a layout.
//!
//! A `Board` is rebuilt wholesale from every store snapshot; there is no
//! incremental merge. Evaluation produces a `BoardView`: per-cell status in
//! layout order, ready for a renderer.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::layout::{SeatCell, SeatLayout};
use crate::resolver::resolve_at;
use crate::types::{EvalInstant, ResolvedStatus, StatusCategory, Student};

#[derive(Debug, Clone, Default)]
pub struct Board {
    students: HashMap<String, Student>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Vec<Student>) -> Self {
        let mut board = Board::new();
        board.replace(snapshot);
        board
    }

    /// Replaces the whole map. Later records win if a snapshot repeats a seat.
    pub fn replace(&mut self, snapshot: Vec<Student>) {
        self.students = snapshot
            .into_iter()
            .map(|student| (student.seat_id.clone(), student))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn students(&self) -> &HashMap<String, Student> {
        &self.students
    }

    pub fn get(&self, seat_id: &str) -> Option<&Student> {
        self.students.get(seat_id)
    }

    pub fn evaluate(&self, layout: &SeatLayout, at: &EvalInstant) -> BoardView {
        let mut summary = BoardSummary {
            total_seats: layout.seat_count(),
            ..BoardSummary::default()
        };

        let mut rows: Vec<Vec<CellView>> = Vec::with_capacity(layout.rows.len());
        for cells in &layout.rows {
            let mut row = Vec::with_capacity(cells.len());
            for cell in cells {
                row.push(match cell {
                    SeatCell::Seat(id) => {
                        CellView::Seat(self.seat_view(layout, id, at, &mut summary))
                    }
                    SeatCell::LargeGap => CellView::LargeGap,
                    SeatCell::SmallGap => CellView::SmallGap,
                });
            }
            rows.push(row);
        }

        let mut waiting: Vec<SeatView> = Vec::with_capacity(layout.waiting.len());
        for id in &layout.waiting {
            waiting.push(self.seat_view(layout, id, at, &mut summary));
        }

        let mut unplaced: Vec<SeatView> = self
            .students
            .values()
            .filter(|student| !layout.contains_seat(&student.seat_id))
            .map(|student| SeatView::occupied(student, resolve_at(student, at)))
            .collect();
        unplaced.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
        for view in &unplaced {
            if let Some(occupant) = &view.occupant {
                summary.record(occupant.status.category);
            }
        }

        BoardView {
            evaluated_at: at.clone(),
            rows,
            waiting,
            unplaced,
            summary,
        }
    }

    fn seat_view(
        &self,
        layout: &SeatLayout,
        seat_id: &str,
        at: &EvalInstant,
        summary: &mut BoardSummary,
    ) -> SeatView {
        match layout.occupant(seat_id, &self.students) {
            Some(student) => {
                let status = resolve_at(student, at);
                summary.record(status.category);
                SeatView::occupied(student, status)
            }
            None => SeatView::empty(seat_id),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Board View
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupantView {
    pub name: String,
    pub school: String,
    pub grade: String,
    pub status: ResolvedStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub seat_id: String,
    pub occupant: Option<OccupantView>,
}

impl SeatView {
    fn empty(seat_id: &str) -> Self {
        SeatView {
            seat_id: seat_id.to_string(),
            occupant: None,
        }
    }

    fn occupied(student: &Student, status: ResolvedStatus) -> Self {
        SeatView {
            seat_id: student.seat_id.clone(),
            occupant: Some(OccupantView {
                name: student.name.clone(),
                school: student.school.clone(),
                grade: student.grade.clone(),
                status,
            }),
        }
    }

    pub fn category(&self) -> Option<StatusCategory> {
        self.occupant.as_ref().map(|o| o.status.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellView {
    Seat(SeatView),
    LargeGap,
    SmallGap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub total_seats: usize,
    pub occupied: usize,
    pub present: usize,
    pub by_category: BTreeMap<StatusCategory, usize>,
}

impl BoardSummary {
    fn record(&mut self, category: StatusCategory) {
        self.occupied += 1;
        if category.is_present() {
            self.present += 1;
        }
        *self.by_category.entry(category).or_insert(0) += 1;
    }

    pub fn count(&self, category: StatusCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub evaluated_at: EvalInstant,
    pub rows: Vec<Vec<CellView>>,
    pub waiting: Vec<SeatView>,
    pub unplaced: Vec<SeatView>,
    pub summary: BoardSummary,
}

impl BoardView {
    /// Every seat view in print order: grid, waiting area, then unplaced.
    pub fn seats(&self) -> impl Iterator<Item = &SeatView> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|cell| match cell {
                CellView::Seat(view) => Some(view),
                CellView::LargeGap | CellView::SmallGap => None,
            })
            .chain(self.waiting.iter())
            .chain(self.unplaced.iter())
    }

    pub fn seat(&self, seat_id: &str) -> Option<&SeatView> {
        self.seats().find(|view| view.seat_id == seat_id)
    }
}
