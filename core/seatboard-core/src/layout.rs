//! Static seat topology.
//!
//! A layout is an ordered list of rows; each row is an ordered list of cells
//! (a seat, a large gap, or a small gap). The definition order is the
//! canonical traversal and print order. Gap markers only affect spacing.
//!
//! In config files a row is a list of strings: seat identifiers, or the
//! markers `"BIG_GAP"` / `"GAP"`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::Student;

pub const LARGE_GAP_MARKER: &str = "BIG_GAP";
pub const SMALL_GAP_MARKER: &str = "GAP";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeatCell {
    Seat(String),
    LargeGap,
    SmallGap,
}

impl SeatCell {
    pub fn seat(id: &str) -> Self {
        SeatCell::Seat(id.to_string())
    }

    pub fn seat_id(&self) -> Option<&str> {
        match self {
            SeatCell::Seat(id) => Some(id),
            SeatCell::LargeGap | SeatCell::SmallGap => None,
        }
    }
}

impl From<String> for SeatCell {
    fn from(value: String) -> Self {
        match value.trim() {
            LARGE_GAP_MARKER => SeatCell::LargeGap,
            SMALL_GAP_MARKER | "" => SeatCell::SmallGap,
            id => SeatCell::Seat(id.to_string()),
        }
    }
}

impl From<SeatCell> for String {
    fn from(cell: SeatCell) -> Self {
        match cell {
            SeatCell::Seat(id) => id,
            SeatCell::LargeGap => LARGE_GAP_MARKER.to_string(),
            SeatCell::SmallGap => SMALL_GAP_MARKER.to_string(),
        }
    }
}

/// One step of the layout traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPosition<'a> {
    pub row: usize,
    pub column: usize,
    pub cell: &'a SeatCell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLayout {
    #[serde(default)]
    pub rows: Vec<Vec<SeatCell>>,
    #[serde(default)]
    pub waiting: Vec<String>,
}

impl Default for SeatLayout {
    fn default() -> Self {
        SeatLayout::reading_room()
    }
}

impl SeatLayout {
    pub fn new(rows: Vec<Vec<SeatCell>>, waiting: Vec<String>) -> Self {
        SeatLayout { rows, waiting }
    }

    /// Grid cells in definition order, row by row, gaps included.
    pub fn traverse(&self) -> impl Iterator<Item = LayoutPosition<'_>> {
        self.rows.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(move |(column, cell)| LayoutPosition { row, column, cell })
        })
    }

    /// Every seat identifier: grid seats in traversal order, then the waiting area.
    pub fn seat_ids(&self) -> impl Iterator<Item = &str> {
        self.traverse()
            .filter_map(|position| position.cell.seat_id())
            .chain(self.waiting.iter().map(String::as_str))
    }

    pub fn seat_count(&self) -> usize {
        self.seat_ids().count()
    }

    pub fn contains_seat(&self, seat_id: &str) -> bool {
        self.seat_ids().any(|id| id == seat_id)
    }

    /// The student at `seat_id`, or `None` for an empty or unknown seat.
    pub fn occupant<'s>(
        &self,
        seat_id: &str,
        students: &'s HashMap<String, Student>,
    ) -> Option<&'s Student> {
        students.get(seat_id)
    }

    /// Seat identifiers that appear more than once. The layout is expected to
    /// have none; this is a diagnostic, nothing enforces it.
    pub fn duplicate_seats(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in self.seat_ids() {
            if !seen.insert(id) && !duplicates.iter().any(|dup: &String| dup == id) {
                duplicates.push(id.to_string());
            }
        }
        duplicates
    }

    /// The facility's reading room: one column of seats on the left, a large
    /// aisle, then serpentine rows. Waiting-area seats sit outside the grid.
    pub fn reading_room() -> Self {
        fn run(from: u32, to: u32) -> Vec<SeatCell> {
            let ids: Vec<u32> = if from <= to {
                (from..=to).collect()
            } else {
                (to..=from).rev().collect()
            };
            ids.into_iter()
                .map(|n| SeatCell::Seat(format!("독-{:03}", n)))
                .collect()
        }

        fn row(head: u32, tail: &[Vec<SeatCell>]) -> Vec<SeatCell> {
            let mut cells = vec![SeatCell::Seat(format!("독-{:03}", head))];
            if !tail.is_empty() {
                cells.push(SeatCell::LargeGap);
            }
            for (index, segment) in tail.iter().enumerate() {
                if index > 0 {
                    cells.push(SeatCell::SmallGap);
                }
                cells.extend(segment.iter().cloned());
            }
            cells
        }

        let rows = vec![
            row(88, &[run(42, 35)]),
            row(89, &[run(43, 49)]),
            row(90, &[run(56, 50)]),
            row(91, &[run(57, 61)]),
            row(92, &[run(67, 62)]),
            row(93, &[run(68, 77)]),
            row(94, &[]),
            row(95, &[run(87, 78)]),
            row(96, &[]),
            row(97, &[run(28, 28), run(9, 1)]),
            row(98, &[run(10, 18)]),
            row(99, &[run(27, 19)]),
            row(100, &[run(29, 34)]),
        ];
        let waiting = (1..=13).map(|n| format!("대-{:03}", n)).collect();

        SeatLayout { rows, waiting }
    }
}
