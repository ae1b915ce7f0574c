//! Plain-text rendering of daemon payloads.
//!
//! One line per seat in board print order. Gaps are kept as blank markers so
//! the row structure survives in a terminal.

use seatboard_core::{BoardView, CellView, SeatView};
use serde_json::Value;
use std::fmt::Write;

pub fn board(view: &BoardView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Board at {}", view.evaluated_at);

    for (index, row) in view.rows.iter().enumerate() {
        let _ = writeln!(out, "Row {}", index + 1);
        for cell in row {
            match cell {
                CellView::Seat(seat) => {
                    let _ = writeln!(out, "  {}", seat_line(seat));
                }
                CellView::LargeGap => {
                    let _ = writeln!(out, "  ----");
                }
                CellView::SmallGap => {
                    let _ = writeln!(out, "  --");
                }
            }
        }
    }

    if !view.waiting.is_empty() {
        let _ = writeln!(out, "Waiting area");
        for seat in &view.waiting {
            let _ = writeln!(out, "  {}", seat_line(seat));
        }
    }

    if !view.unplaced.is_empty() {
        let _ = writeln!(out, "Not in layout");
        for seat in &view.unplaced {
            let _ = writeln!(out, "  {}", seat_line(seat));
        }
    }

    let summary = &view.summary;
    let _ = write!(
        out,
        "{} seats, {} occupied, {} present",
        summary.total_seats, summary.occupied, summary.present
    );
    for (category, count) in &summary.by_category {
        let _ = write!(out, ", {} {}", category, count);
    }
    out.push('\n');
    out
}

pub fn seat_line(seat: &SeatView) -> String {
    match &seat.occupant {
        None => format!("{:<8} (empty)", seat.seat_id),
        Some(occupant) => {
            let memo = if occupant.status.has_memo { " *" } else { "" };
            format!(
                "{:<8} {:<10} {:<20} {}{}",
                seat.seat_id,
                occupant.name,
                occupant.status.category.as_str(),
                occupant.status.label,
                memo
            )
        }
    }
}

/// Renders a `get_seat` payload: the evaluated seat plus the stored memo.
pub fn seat_detail(data: &Value) -> String {
    let mut out = String::new();
    let seat: Option<SeatView> = data
        .get("seat")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok());
    match seat {
        Some(seat) => {
            let _ = writeln!(out, "{}", seat_line(&seat));
        }
        None => {
            let _ = writeln!(out, "(no such seat)");
        }
    }

    if let Some(memo) = data
        .pointer("/student/memo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|memo| !memo.is_empty())
    {
        let _ = writeln!(out, "memo: {}", memo);
    }
    if data.get("in_layout").and_then(Value::as_bool) == Some(false) {
        let _ = writeln!(out, "note: seat is not part of the layout");
    }
    out
}

/// Students as `seat name status`, one per line.
pub fn students(data: &Value) -> String {
    let mut out = String::new();
    for student in data.as_array().into_iter().flatten() {
        let field = |name: &str| student.get(name).and_then(Value::as_str).unwrap_or("");
        let _ = writeln!(
            out,
            "{:<8} {:<10} {}",
            field("seatNumber"),
            field("name"),
            field("status")
        );
    }
    out
}
