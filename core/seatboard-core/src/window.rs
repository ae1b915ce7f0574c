//! Weekly time-window matching.
//!
//! Times are compared as strings. That is only correct because every value
//! that reaches the matcher is exactly `HH:MM` (zero-padded, 24-hour), so the
//! matcher refuses anything else instead of comparing it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{DayOfWeek, WeeklyTimeWindow};

// Loose ingestion shape: "9:00", "09:00", "09:00:00".
static LOOSE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::\d{2})?$").expect("valid time regex"));

/// Returns true for exactly `HH:MM` with HH in 00..=23 and MM in 00..=59.
pub fn is_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hour < 24 && minute < 60
}

/// True iff the window is on `weekday`, `time >= start`, and either the end
/// is empty (open-ended) or `time <= end`. Malformed windows or times never
/// match.
pub fn window_contains(window: &WeeklyTimeWindow, weekday: DayOfWeek, time: &str) -> bool {
    if window.weekday != Some(weekday) {
        return false;
    }
    if !is_hhmm(time) || !is_hhmm(&window.start_time) {
        return false;
    }
    if time < window.start_time.as_str() {
        return false;
    }
    if window.is_open_ended() {
        return true;
    }
    is_hhmm(&window.end_time) && time <= window.end_time.as_str()
}

/// Usable for gap-state derivation: has a weekday and a well-formed start.
/// A malformed end is treated as open-ended by [`window_end`].
pub fn is_well_formed(window: &WeeklyTimeWindow) -> bool {
    window.weekday.is_some() && is_hhmm(&window.start_time)
}

/// The window's end if it has a usable one.
pub fn window_end(window: &WeeklyTimeWindow) -> Option<&str> {
    let end = window.end_time.as_str();
    is_hhmm(end).then_some(end)
}

/// Normalizes an ingested time string to `HH:MM`. Returns `None` when the
/// value cannot be read as a time of day.
pub fn normalize_time(value: &str) -> Option<String> {
    let captures = LOOSE_TIME.captures(value.trim())?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

/// Normalizes both ends of a window in place. Values that cannot be read are
/// left as they are (and will never match); an empty end stays empty.
pub fn normalize_window(window: &mut WeeklyTimeWindow) {
    if let Some(start) = normalize_time(&window.start_time) {
        window.start_time = start;
    } else {
        tracing::debug!(start = %window.start_time, "Leaving unreadable start time as-is");
    }

    if window.end_time.trim().is_empty() {
        window.end_time.clear();
    } else if let Some(end) = normalize_time(&window.end_time) {
        window.end_time = end;
    } else {
        tracing::debug!(end = %window.end_time, "Leaving unreadable end time as-is");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mon(start: &str, end: &str) -> WeeklyTimeWindow {
        WeeklyTimeWindow::new(DayOfWeek::Mon, start, end)
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = mon("09:00", "12:00");
        assert!(window_contains(&window, DayOfWeek::Mon, "09:00"));
        assert!(window_contains(&window, DayOfWeek::Mon, "10:30"));
        assert!(window_contains(&window, DayOfWeek::Mon, "12:00"));
        assert!(!window_contains(&window, DayOfWeek::Mon, "08:59"));
        assert!(!window_contains(&window, DayOfWeek::Mon, "12:01"));
    }

    #[test]
    fn test_other_weekday_never_matches() {
        let window = mon("00:00", "23:59");
        assert!(!window_contains(&window, DayOfWeek::Tue, "10:00"));
    }

    #[test]
    fn test_open_ended_window_has_no_upper_bound() {
        let window = mon("09:00", "");
        assert!(window_contains(&window, DayOfWeek::Mon, "09:00"));
        assert!(window_contains(&window, DayOfWeek::Mon, "23:59"));
        assert!(!window_contains(&window, DayOfWeek::Mon, "08:00"));
    }

    #[test]
    fn test_malformed_values_never_match() {
        assert!(!window_contains(&mon("9:00", "12:00"), DayOfWeek::Mon, "10:00"));
        assert!(!window_contains(&mon("09:00", "noon"), DayOfWeek::Mon, "10:00"));
        assert!(!window_contains(&mon("09:00", "12:00"), DayOfWeek::Mon, "10"));

        let mut no_day = mon("09:00", "12:00");
        no_day.weekday = None;
        assert!(!window_contains(&no_day, DayOfWeek::Mon, "10:00"));
    }

    #[test]
    fn test_inverted_window_matches_nothing() {
        // start > end is not rejected by the model; it just never contains anything.
        let window = mon("18:00", "09:00");
        assert!(!window_contains(&window, DayOfWeek::Mon, "12:00"));
        assert!(!window_contains(&window, DayOfWeek::Mon, "19:00"));
    }

    #[test]
    fn test_is_hhmm() {
        assert!(is_hhmm("00:00"));
        assert!(is_hhmm("23:59"));
        assert!(!is_hhmm("24:00"));
        assert!(!is_hhmm("12:60"));
        assert!(!is_hhmm("9:00"));
        assert!(!is_hhmm("09:00:00"));
        assert!(!is_hhmm(""));
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("9:00").as_deref(), Some("09:00"));
        assert_eq!(normalize_time(" 14:30 ").as_deref(), Some("14:30"));
        assert_eq!(normalize_time("08:15:00").as_deref(), Some("08:15"));
        assert_eq!(normalize_time("24:00"), None);
        assert_eq!(normalize_time("자율 등원"), None);
        assert_eq!(normalize_time(""), None);
    }

    #[test]
    fn test_normalize_window_keeps_unreadable_values() {
        let mut window = mon("미등원", " ");
        normalize_window(&mut window);
        assert_eq!(window.start_time, "미등원");
        assert_eq!(window.end_time, "");
        assert!(!window_contains(&window, DayOfWeek::Mon, "10:00"));
    }
}
