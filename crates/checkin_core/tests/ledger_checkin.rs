use checkin_core::db::open_db;
use checkin_core::{
    AttendanceLedger, CheckInOutcome, Event, InMemoryAttendanceStore, RejectReason,
    SqliteAttendanceStore, StaticEventDirectory,
};
use std::sync::Barrier;

fn directory() -> StaticEventDirectory {
    StaticEventDirectory::new([
        Event::new(1, "Orientation", "2025-01-10", "Gym"),
        Event::new(2, "Tech Talk", "2025-02-14", "Room 301"),
        Event::new(3, "Hackathon", "2025-03-01", "Hall B"),
    ])
    .unwrap()
}

#[test]
fn repeated_check_in_is_granted_once_then_duplicate() {
    let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());

    assert_eq!(
        ledger.record_attendance(1, "M1").unwrap(),
        CheckInOutcome::Granted
    );
    for _ in 0..3 {
        assert_eq!(
            ledger.record_attendance(1, "M1").unwrap(),
            CheckInOutcome::Duplicate
        );
    }

    assert_eq!(ledger.attendees_for_event(1).unwrap(), vec!["M1".to_string()]);
    assert_eq!(ledger.attendee_count(1).unwrap(), 1);
}

#[test]
fn same_member_is_counted_once_per_event() {
    let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());

    assert_eq!(
        ledger.record_attendance(1, "M1").unwrap(),
        CheckInOutcome::Granted
    );
    assert_eq!(
        ledger.record_attendance(2, "M1").unwrap(),
        CheckInOutcome::Granted
    );

    assert_eq!(ledger.attendee_count(1).unwrap(), 1);
    assert_eq!(ledger.attendee_count(2).unwrap(), 1);
    assert!(ledger.is_member_present(1, "M1").unwrap());
    assert!(ledger.is_member_present(2, "M1").unwrap());
    assert!(!ledger.is_member_present(3, "M1").unwrap());
}

#[test]
fn attendees_keep_arrival_order() {
    let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());
    for member in ["Z9", "A1", "M5", "A1"] {
        ledger.record_attendance(3, member).unwrap();
    }
    assert_eq!(
        ledger.attendees_for_event(3).unwrap(),
        vec!["Z9".to_string(), "A1".to_string(), "M5".to_string()]
    );
}

#[test]
fn unknown_event_is_rejected_without_side_effects() {
    let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());
    ledger.record_attendance(1, "M0").unwrap();
    let before = ledger.snapshot().unwrap();

    assert_eq!(
        ledger.record_attendance(999, "M1").unwrap(),
        CheckInOutcome::Rejected(RejectReason::UnknownEvent)
    );

    assert_eq!(ledger.snapshot().unwrap(), before);
    assert!(ledger.attendees_for_event(999).unwrap().is_empty());
}

#[test]
fn concurrent_check_ins_for_one_pair_grant_exactly_once_in_memory() {
    const SCANNERS: usize = 16;
    let store = InMemoryAttendanceStore::new();
    let events = directory();
    let ledger = AttendanceLedger::new(&store, &events);
    let before = ledger.attendee_count(2).unwrap();
    let barrier = Barrier::new(SCANNERS);

    let outcomes: Vec<CheckInOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..SCANNERS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    ledger.record_attendance(2, "M42").unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let granted = outcomes.iter().filter(|outcome| outcome.is_granted()).count();
    let duplicates = outcomes
        .iter()
        .filter(|outcome| **outcome == CheckInOutcome::Duplicate)
        .count();
    assert_eq!(granted, 1);
    assert_eq!(duplicates, SCANNERS - 1);
    assert_eq!(ledger.attendee_count(2).unwrap(), before + 1);
}

#[test]
fn concurrent_scanner_instances_share_one_sqlite_ledger() {
    const SCANNERS: usize = 6;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");
    let events = directory();
    drop(open_db(&path).unwrap());
    let barrier = Barrier::new(SCANNERS);

    let outcomes: Vec<CheckInOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..SCANNERS)
            .map(|_| {
                scope.spawn(|| {
                    let conn = open_db(&path).unwrap();
                    let store = SqliteAttendanceStore::try_new(&conn).unwrap();
                    let ledger = AttendanceLedger::new(store, &events);
                    barrier.wait();
                    ledger.record_attendance(1, "M7").unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_granted()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| **outcome == CheckInOutcome::Duplicate)
            .count(),
        SCANNERS - 1
    );

    let conn = open_db(&path).unwrap();
    let ledger = AttendanceLedger::new(SqliteAttendanceStore::try_new(&conn).unwrap(), &events);
    assert_eq!(ledger.attendees_for_event(1).unwrap(), vec!["M7".to_string()]);
}

#[test]
fn sqlite_ledger_behaves_like_in_memory_ledger() {
    let conn = checkin_core::db::open_db_in_memory().unwrap();
    let ledger = AttendanceLedger::new(SqliteAttendanceStore::try_new(&conn).unwrap(), directory());

    assert_eq!(
        ledger.record_attendance(1, "A").unwrap(),
        CheckInOutcome::Granted
    );
    assert_eq!(
        ledger.record_attendance(1, "A").unwrap(),
        CheckInOutcome::Duplicate
    );
    assert_eq!(
        ledger.record_attendance(404, "A").unwrap(),
        CheckInOutcome::Rejected(RejectReason::UnknownEvent)
    );
    assert_eq!(
        ledger.record_attendance(1, "").unwrap(),
        CheckInOutcome::Rejected(RejectReason::InvalidMember)
    );
    assert_eq!(ledger.attendee_count(1).unwrap(), 1);
}
