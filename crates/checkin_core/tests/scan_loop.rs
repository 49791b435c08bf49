use checkin_core::{
    AttendanceLedger, CheckInOutcome, DecodeError, Event, InMemoryAttendanceStore,
    LineScanSource, RunSummary, ScanConfig, ScanControl, ScanDriver, ScanOutcome, ScanReport,
    ScanState, StaticEventDirectory,
};
use std::io::Cursor;

fn ledger() -> AttendanceLedger<InMemoryAttendanceStore, StaticEventDirectory> {
    let events = StaticEventDirectory::new([
        Event::new(1, "Orientation", "2025-01-10", "Gym"),
        Event::new(2, "Tech Talk", "2025-02-14", "Room 301"),
    ])
    .unwrap();
    AttendanceLedger::new(InMemoryAttendanceStore::new(), events)
}

fn fast_config() -> ScanConfig {
    ScanConfig {
        sample_interval_ms: 0,
        ..ScanConfig::default()
    }
}

fn enabled_control() -> ScanControl {
    let control = ScanControl::new();
    control.enable();
    control
}

#[test]
fn piped_session_reports_every_outcome() {
    let ledger = ledger();
    let input = concat!(
        "{\"memberId\":\"M1\",\"eventId\":1}\n",
        "\n",
        "{\"memberId\":\"M2\",\"eventId\":\"1\"}\n",
        "{\"memberId\":\"M1\",\"eventId\":2}\n",
        "{\"memberId\":\"M1\",\"eventId\":1}\n",
        "{\"eventId\":1}\n",
        "https://example.org/not-a-payload\n",
        "{\"memberId\":\"M3\",\"eventId\":9}\n",
    );
    let mut source = LineScanSource::new(Cursor::new(input));
    let mut driver = ScanDriver::new(&ledger, fast_config());
    let mut statuses = Vec::new();

    let summary = driver
        .run(&mut source, &enabled_control(), |report: &ScanReport| {
            statuses.push(report.outcome.status_text())
        })
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 7,
            granted: 3,
            duplicates: 1,
            rejected: 1,
            decode_failures: 2,
        }
    );
    assert_eq!(statuses[0], "Scan successful — badge granted.");
    assert_eq!(statuses[3], "Duplicate scan — already granted for this event.");
    assert_eq!(statuses[4], "QR missing memberId");
    assert_eq!(statuses[5], "Unrecognized QR content");
    assert_eq!(driver.state(), ScanState::Idle);
    assert_eq!(ledger.attendee_count(1).unwrap(), 2);
    assert_eq!(ledger.attendee_count(2).unwrap(), 1);
}

#[test]
fn consecutive_identical_detections_are_processed_once() {
    let ledger = ledger();
    let line = "{\"memberId\":\"M1\",\"eventId\":1}\n";
    let mut source = LineScanSource::new(Cursor::new(line.repeat(4)));
    let mut driver = ScanDriver::new(&ledger, fast_config());

    let summary = driver
        .run(&mut source, &enabled_control(), |_| {})
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.granted, 1);
    assert_eq!(summary.duplicates, 0);
}

#[test]
fn payload_without_event_uses_configured_fallback() {
    let ledger = ledger();
    let mut source = LineScanSource::new(Cursor::new("{\"memberId\":\"M9\"}\n"));
    let config = ScanConfig {
        event_fallback: Some(2),
        ..fast_config()
    };
    let mut driver = ScanDriver::new(&ledger, config);
    let mut reports = Vec::new();

    driver
        .run(&mut source, &enabled_control(), |report| {
            reports.push(report.clone())
        })
        .unwrap();

    assert_eq!(
        reports[0].outcome,
        ScanOutcome::CheckIn {
            event_id: 2,
            member_id: "M9".to_string(),
            outcome: CheckInOutcome::Granted,
        }
    );
}

#[test]
fn payload_without_event_is_rejected_when_no_fallback() {
    let ledger = ledger();
    let mut source = LineScanSource::new(Cursor::new("{\"memberId\":\"M9\"}\n"));
    let mut driver = ScanDriver::new(&ledger, fast_config());
    let mut reports = Vec::new();

    driver
        .run(&mut source, &enabled_control(), |report| {
            reports.push(report.clone())
        })
        .unwrap();

    assert_eq!(
        reports[0].outcome,
        ScanOutcome::DecodeFailed(DecodeError::InvalidEventReference)
    );
    assert!(ledger.snapshot().unwrap().is_empty());
}

#[test]
fn disabled_control_stops_before_sampling() {
    let ledger = ledger();
    let mut source = LineScanSource::new(Cursor::new("{\"memberId\":\"M1\",\"eventId\":1}\n"));
    let mut driver = ScanDriver::new(&ledger, fast_config());

    let summary = driver
        .run(&mut source, &ScanControl::new(), |_| {})
        .unwrap();

    assert_eq!(summary, RunSummary::default());
    assert_eq!(driver.state(), ScanState::Idle);
    assert_eq!(ledger.attendee_count(1).unwrap(), 0);
}

#[test]
fn recent_activity_lists_newest_first_and_is_bounded() {
    let ledger = ledger();
    let input: String = (0..8)
        .map(|n| format!("{{\"memberId\":\"M{n}\",\"eventId\":1}}\n"))
        .collect();
    let mut source = LineScanSource::new(Cursor::new(input));
    let mut driver = ScanDriver::new(&ledger, fast_config());

    driver
        .run(&mut source, &enabled_control(), |_| {})
        .unwrap();

    let members: Vec<&str> = driver
        .recent_activity()
        .map(|entry| entry.member_id.as_str())
        .collect();
    assert_eq!(members, vec!["M7", "M6", "M5", "M4", "M3", "M2"]);
}
