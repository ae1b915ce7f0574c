//! End-to-end board scenarios: store writes flow through the live board and
//! come out as per-seat statuses.

use std::sync::mpsc;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use seatboard_core::{
    apply, AwayKind, BoardEvent, DayOfWeek, EvalInstant, FixedClock, LiveBoard, MemoryStore,
    OverrideCommand, OverrideStatus, RecordStore, SeatLayout, StatusCategory, Student,
};

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    // 2026-10-19 is a Monday.
    NaiveDate::from_ymd_opt(2026, 10, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

fn imported(json: &str) -> Student {
    serde_json::from_str::<Student>(json)
        .expect("record should parse")
        .normalized()
}

fn category(live: &LiveBoard<FixedClock>, seat: &str) -> Option<StatusCategory> {
    live.current()
        .and_then(|view| view.seat(seat))
        .and_then(|view| view.category())
}

#[test]
fn test_imported_record_resolves_across_the_day() {
    let student = imported(
        r#"{
            "seatNumber": "독-042",
            "name": "Kim",
            "school": "Hanbit High",
            "grade": "2",
            "status": "재원",
            "schedules": [
                { "day": "WED", "startTime": "9:00", "endTime": "12:00" },
                { "day": "WED", "startTime": "14:00", "endTime": "18:00" }
            ],
            "mentoringSessions": [
                { "day": "WED", "startTime": "15:00", "endTime": "15:30", "mentorName": "Lee" }
            ]
        }"#,
    );
    assert_eq!(student.schedules[0].start_time, "09:00");

    let clock = FixedClock::new(at(21, 8, 30));
    let mut live = LiveBoard::new(Arc::new(SeatLayout::reading_room()), clock.clone());
    live.handle(BoardEvent::Snapshot(vec![student]));

    let expected = [
        ((8, 30), StatusCategory::BeforeArrival),
        ((9, 0), StatusCategory::Studying),
        ((13, 0), StatusCategory::BetweenWindows),
        ((15, 10), StatusCategory::Mentoring),
        ((17, 0), StatusCategory::Studying),
        ((18, 1), StatusCategory::AfterDeparture),
    ];
    for ((hour, minute), want) in expected {
        clock.set(at(21, hour, minute));
        live.handle(BoardEvent::Tick);
        assert_eq!(
            category(&live, "독-042"),
            Some(want),
            "at {:02}:{:02}",
            hour,
            minute
        );
    }

    // Thursday has no windows at all.
    clock.set(at(22, 10, 0));
    live.handle(BoardEvent::Tick);
    assert_eq!(category(&live, "독-042"), Some(StatusCategory::Free));
}

#[test]
fn test_override_commands_reach_the_board_through_snapshots() {
    let store = MemoryStore::with_students(vec![imported(
        r#"{
            "seatNumber": "독-001",
            "name": "Park",
            "schedules": [{ "day": "TUE", "startTime": "14:00", "endTime": "16:00" }]
        }"#,
    )]);
    let (tx, rx) = mpsc::channel();
    store.subscribe(tx).expect("subscribe");

    let mut live = LiveBoard::new(
        Arc::new(SeatLayout::reading_room()),
        FixedClock::new(at(20, 15, 0)),
    );
    let drain = |live: &mut LiveBoard<FixedClock>| {
        while let Ok(event) = rx.try_recv() {
            live.handle(event);
        }
    };

    drain(&mut live);
    assert_eq!(category(&live, "독-001"), Some(StatusCategory::Studying));

    apply(&store, "독-001", &OverrideCommand::MarkAway { kind: AwayKind::SteppedOut })
        .expect("mark away");
    drain(&mut live);
    assert_eq!(
        category(&live, "독-001"),
        Some(StatusCategory::SteppedOutOverride)
    );

    apply(&store, "독-001", &OverrideCommand::MarkReturned).expect("mark returned");
    apply(
        &store,
        "독-002",
        &OverrideCommand::QuickRegister {
            name: "Choi".to_string(),
        },
    )
    .expect("quick register");
    drain(&mut live);
    assert_eq!(category(&live, "독-001"), Some(StatusCategory::Studying));
    assert_eq!(category(&live, "독-002"), Some(StatusCategory::Free));

    let view = live.current().expect("evaluated");
    assert_eq!(view.summary.occupied, 2);
    assert_eq!(view.summary.present, 1);
}

#[test]
fn test_withdrawn_record_from_store_dominates() {
    let student = imported(
        r#"{
            "seatNumber": "대-003",
            "name": "Yoon",
            "status": "퇴원",
            "schedules": [{ "day": "MON", "startTime": "09:00", "endTime": "" }],
            "mentoringSessions": [
                { "day": "MON", "startTime": "09:00", "endTime": "10:00", "mentorName": "Lee" }
            ]
        }"#,
    );
    assert_eq!(student.override_status, OverrideStatus::Withdrawn);

    let board = seatboard_core::Board::from_snapshot(vec![student]);
    let view = board.evaluate(
        &SeatLayout::reading_room(),
        &EvalInstant::new(DayOfWeek::Mon, "09:30"),
    );
    let seat = view.seat("대-003").expect("waiting seat");
    assert_eq!(seat.category(), Some(StatusCategory::Withdrawn));
}

#[test]
fn test_corrupt_window_does_not_block_other_seats() {
    let broken = imported(
        r#"{
            "seatNumber": "독-010",
            "name": "Broken",
            "schedules": [
                { "day": "SOMEDAY", "startTime": "nine", "endTime": "12:00" },
                { "day": "MON", "startTime": "자율", "endTime": "" }
            ]
        }"#,
    );
    let fine = imported(
        r#"{
            "seatNumber": "독-011",
            "name": "Fine",
            "schedules": [{ "day": "MON", "startTime": "09:00", "endTime": "12:00" }]
        }"#,
    );

    let board = seatboard_core::Board::from_snapshot(vec![broken, fine]);
    let view = board.evaluate(
        &SeatLayout::reading_room(),
        &EvalInstant::new(DayOfWeek::Mon, "10:00"),
    );
    assert_eq!(
        view.seat("독-010").and_then(|v| v.category()),
        Some(StatusCategory::Free)
    );
    assert_eq!(
        view.seat("독-011").and_then(|v| v.category()),
        Some(StatusCategory::Studying)
    );
}
