//! Status resolution: one student + one instant → one display state.
//!
//! Precedence, first match wins:
//!
//! ```text
//! 1. status WITHDRAWN                 → WITHDRAWN
//! 2. a mentoring window is active     → MENTORING (mentor in label)
//! 3. a schedule window is active      → STEPPED_OUT_OVERRIDE if marked away, else STUDYING
//! 4. nothing active (gap state)       → FREE | BEFORE_ARRIVAL | AFTER_DEPARTURE | BETWEEN_WINDOWS
//! ```
//!
//! The memo flag is overlaid on whatever category wins. Resolution is pure:
//! the instant is always passed in, never read from a clock here.

use crate::types::{
    DayOfWeek, EvalInstant, MentoringWindow, OverrideStatus, ResolvedStatus, StatusCategory,
    Student, WeeklyTimeWindow,
};
use crate::window::{is_well_formed, window_contains, window_end};

pub fn resolve(student: &Student, weekday: DayOfWeek, time: &str) -> ResolvedStatus {
    let (category, label) = resolve_category(student, weekday, time);
    ResolvedStatus {
        category,
        label,
        has_memo: student.has_memo(),
    }
}

pub fn resolve_at(student: &Student, instant: &EvalInstant) -> ResolvedStatus {
    resolve(student, instant.weekday, &instant.time)
}

fn resolve_category(student: &Student, weekday: DayOfWeek, time: &str) -> (StatusCategory, String) {
    if student.override_status == OverrideStatus::Withdrawn {
        return (StatusCategory::Withdrawn, "Withdrawn".to_string());
    }

    if let Some(session) = student
        .mentoring_sessions
        .iter()
        .find(|session| window_contains(&session.window, weekday, time))
    {
        return (StatusCategory::Mentoring, mentoring_label(session));
    }

    let scheduled_now = student
        .schedules
        .iter()
        .any(|schedule| window_contains(schedule, weekday, time));
    if scheduled_now {
        return if student.override_status.is_away() {
            (
                StatusCategory::SteppedOutOverride,
                away_label(student.override_status).to_string(),
            )
        } else {
            (StatusCategory::Studying, "Studying".to_string())
        };
    }

    gap_state(&student.schedules, weekday, time)
}

fn mentoring_label(session: &MentoringWindow) -> String {
    let mentor = session.mentor_name.trim();
    let mut label = if mentor.is_empty() {
        "Mentoring".to_string()
    } else {
        format!("Mentoring with {}", mentor)
    };
    if let Some(subject) = session.subject.as_deref().map(str::trim) {
        if !subject.is_empty() {
            label.push_str(&format!(" ({})", subject));
        }
    }
    label
}

fn away_label(status: OverrideStatus) -> &'static str {
    match status {
        OverrideStatus::Out => "Out",
        _ => "Stepped out",
    }
}

/// Derives the gap state for an instant that no window covers.
///
/// Windows are ordered by start time with a stable sort, so windows that
/// start at the same time keep their insertion order.
fn gap_state(schedules: &[WeeklyTimeWindow], weekday: DayOfWeek, time: &str) -> (StatusCategory, String) {
    let mut today: Vec<&WeeklyTimeWindow> = schedules
        .iter()
        .filter(|window| window.weekday == Some(weekday) && is_well_formed(window))
        .collect();
    today.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let (Some(first), Some(last)) = (today.first(), today.last()) else {
        return (StatusCategory::Free, "Self-directed".to_string());
    };

    if time < first.start_time.as_str() {
        return (
            StatusCategory::BeforeArrival,
            format!("Arrives {}", first.start_time),
        );
    }

    if let Some(end) = window_end(last) {
        if time > end {
            return (StatusCategory::AfterDeparture, format!("Left at {}", end));
        }
    }

    if let Some(next) = today.iter().find(|window| window.start_time.as_str() > time) {
        return (
            StatusCategory::BetweenWindows,
            format!("Back at {}", next.start_time),
        );
    }

    (StatusCategory::Free, "Waiting".to_string())
}
