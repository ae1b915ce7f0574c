//! Core types shared across all Seatboard clients.
//!
//! These types are the wire format as well: the daemon stores them as JSON,
//! the CLI imports them, and the board view hands them to renderers. Field
//! names follow the record store's camelCase documents (`seatNumber`,
//! `startTime`, `mentoringSessions`).

use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SeatboardError};
use crate::window;

// ═══════════════════════════════════════════════════════════════════════════════
// Calendar Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Mon => "MON",
            DayOfWeek::Tue => "TUE",
            DayOfWeek::Wed => "WED",
            DayOfWeek::Thu => "THU",
            DayOfWeek::Fri => "FRI",
            DayOfWeek::Sat => "SAT",
            DayOfWeek::Sun => "SUN",
        }
    }

    /// Accepts `MON`, `mon`, `Monday` and so on. Anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        value
            .trim()
            .parse::<chrono::Weekday>()
            .ok()
            .map(DayOfWeek::from)
    }
}

impl From<chrono::Weekday> for DayOfWeek {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => DayOfWeek::Mon,
            chrono::Weekday::Tue => DayOfWeek::Tue,
            chrono::Weekday::Wed => DayOfWeek::Wed,
            chrono::Weekday::Thu => DayOfWeek::Thu,
            chrono::Weekday::Fri => DayOfWeek::Fri,
            chrono::Weekday::Sat => DayOfWeek::Sat,
            chrono::Weekday::Sun => DayOfWeek::Sun,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A corrupt or missing weekday must not reject the whole record; it simply
/// never matches.
fn lenient_weekday<'de, D>(deserializer: D) -> std::result::Result<Option<DayOfWeek>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|value| value.as_str())
        .and_then(DayOfWeek::parse))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Time Windows
// ═══════════════════════════════════════════════════════════════════════════════

/// A recurring interval on one weekday. Times are `HH:MM` strings; an empty
/// `end_time` means the window has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTimeWindow {
    #[serde(rename = "day", alias = "weekday", default, deserialize_with = "lenient_weekday")]
    pub weekday: Option<DayOfWeek>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl WeeklyTimeWindow {
    pub fn new(weekday: DayOfWeek, start_time: &str, end_time: &str) -> Self {
        WeeklyTimeWindow {
            weekday: Some(weekday),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_time.trim().is_empty()
    }

    pub fn contains(&self, weekday: DayOfWeek, time: &str) -> bool {
        window::window_contains(self, weekday, time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentoringWindow {
    #[serde(flatten)]
    pub window: WeeklyTimeWindow,
    #[serde(default)]
    pub mentor_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl MentoringWindow {
    pub fn new(weekday: DayOfWeek, start_time: &str, end_time: &str, mentor_name: &str) -> Self {
        MentoringWindow {
            window: WeeklyTimeWindow::new(weekday, start_time, end_time),
            mentor_name: mentor_name.to_string(),
            subject: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Student Records
// ═══════════════════════════════════════════════════════════════════════════════

/// Administrator-set status. Independent of the weekly schedule; it only
/// participates in the precedence table.
///
/// Aliases accept the Korean labels used by the facility's existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideStatus {
    #[default]
    #[serde(alias = "재원")]
    Enrolled,
    #[serde(alias = "휴원")]
    Suspended,
    #[serde(alias = "퇴원")]
    Withdrawn,
    #[serde(alias = "대기")]
    Waiting,
    #[serde(alias = "이석")]
    SteppedOut,
    #[serde(alias = "외출")]
    Out,
    #[serde(alias = "결석")]
    Absent,
}

impl OverrideStatus {
    /// Manually marked as not at the seat while a schedule says otherwise.
    /// Absence is recorded but does not count as away.
    pub fn is_away(&self) -> bool {
        matches!(self, OverrideStatus::SteppedOut | OverrideStatus::Out)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideStatus::Enrolled => "ENROLLED",
            OverrideStatus::Suspended => "SUSPENDED",
            OverrideStatus::Withdrawn => "WITHDRAWN",
            OverrideStatus::Waiting => "WAITING",
            OverrideStatus::SteppedOut => "STEPPED_OUT",
            OverrideStatus::Out => "OUT",
            OverrideStatus::Absent => "ABSENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "seatNumber", alias = "seatId")]
    pub seat_id: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub grade: String,
    #[serde(rename = "status", default)]
    pub override_status: OverrideStatus,
    #[serde(default)]
    pub schedules: Vec<WeeklyTimeWindow>,
    #[serde(default)]
    pub mentoring_sessions: Vec<MentoringWindow>,
    #[serde(default)]
    pub memo: String,
}

impl Student {
    /// Minimal record created by clicking an empty seat.
    pub fn quick(seat_id: &str, name: &str) -> Self {
        Student {
            id: seat_id.to_string(),
            name: name.to_string(),
            seat_id: seat_id.to_string(),
            school: String::new(),
            grade: String::new(),
            override_status: OverrideStatus::Enrolled,
            schedules: Vec::new(),
            mentoring_sessions: Vec::new(),
            memo: String::new(),
        }
    }

    pub fn has_memo(&self) -> bool {
        !self.memo.trim().is_empty()
    }

    /// Checks the fields every stored record needs. Schedule contents are
    /// deliberately not checked here; bad windows just never match.
    pub fn validate(&self) -> Result<()> {
        if self.seat_id.trim().is_empty() {
            return Err(SeatboardError::InvalidRecord {
                seat: self.seat_id.clone(),
                reason: "seat number is required".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(SeatboardError::InvalidRecord {
                seat: self.seat_id.clone(),
                reason: "name is required".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the record with every window time zero-padded to `HH:MM` and
    /// the id pinned to the seat number.
    pub fn normalized(mut self) -> Self {
        self.seat_id = self.seat_id.trim().to_string();
        self.name = self.name.trim().to_string();
        self.id = self.seat_id.clone();
        for schedule in &mut self.schedules {
            window::normalize_window(schedule);
        }
        for session in &mut self.mentoring_sessions {
            window::normalize_window(&mut session.window);
        }
        self
    }
}

/// Field-level update applied by override commands. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_status: Option<OverrideStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl StudentPatch {
    pub fn status(status: OverrideStatus) -> Self {
        StudentPatch {
            override_status: Some(status),
            memo: None,
        }
    }

    pub fn memo(memo: &str) -> Self {
        StudentPatch {
            override_status: None,
            memo: Some(memo.to_string()),
        }
    }

    pub fn apply_to(&self, student: &mut Student) {
        if let Some(status) = self.override_status {
            student.override_status = status;
        }
        if let Some(memo) = &self.memo {
            student.memo = memo.clone();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolution Output
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    Mentoring,
    SteppedOutOverride,
    Studying,
    BeforeArrival,
    BetweenWindows,
    AfterDeparture,
    Free,
    Withdrawn,
}

impl StatusCategory {
    /// Physically expected at the facility right now.
    pub fn is_present(&self) -> bool {
        matches!(self, StatusCategory::Studying | StatusCategory::Mentoring)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Mentoring => "MENTORING",
            StatusCategory::SteppedOutOverride => "STEPPED_OUT_OVERRIDE",
            StatusCategory::Studying => "STUDYING",
            StatusCategory::BeforeArrival => "BEFORE_ARRIVAL",
            StatusCategory::BetweenWindows => "BETWEEN_WINDOWS",
            StatusCategory::AfterDeparture => "AFTER_DEPARTURE",
            StatusCategory::Free => "FREE",
            StatusCategory::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStatus {
    pub category: StatusCategory,
    pub label: String,
    pub has_memo: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluation Instant
// ═══════════════════════════════════════════════════════════════════════════════

/// The (weekday, time-of-day) pair the engine evaluates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalInstant {
    pub weekday: DayOfWeek,
    pub time: String,
}

impl EvalInstant {
    pub fn new(weekday: DayOfWeek, time: &str) -> Self {
        EvalInstant {
            weekday,
            time: time.to_string(),
        }
    }

    pub fn from_datetime(at: &NaiveDateTime) -> Self {
        EvalInstant {
            weekday: at.weekday().into(),
            time: format!("{:02}:{:02}", at.hour(), at.minute()),
        }
    }

    /// Parses `"WED 13:00"` (weekday first, then time).
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        let (Some(day), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SeatboardError::InvalidInstant(format!(
                "expected \"<DAY> <HH:MM>\", got {:?}",
                value
            )));
        };
        let weekday = DayOfWeek::parse(day)
            .ok_or_else(|| SeatboardError::InvalidInstant(format!("unknown weekday {:?}", day)))?;
        let time = window::normalize_time(time)
            .ok_or_else(|| SeatboardError::InvalidInstant(format!("bad time {:?}", time)))?;
        Ok(EvalInstant { weekday, time })
    }
}

impl fmt::Display for EvalInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.weekday, self.time)
    }
}
