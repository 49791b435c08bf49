//! Attendance ledger: idempotent check-in over an injected store.
//!
//! # Responsibility
//! - Validate check-ins against the event directory and member id rules.
//! - Record each `(event, member)` pair exactly once.
//! - Answer presence and per-event attendee queries.
//!
//! # Invariants
//! - Only a `Granted` outcome mutates state.
//! - Concurrent calls for the same pair yield exactly one `Granted`; the
//!   store's atomic insert-if-absent decides which.
//! - Attendee counts are always read from the backing set, never cached.
//! - A storage failure surfaces as `LedgerError`; grants already returned stay
//!   recorded.

mod retry;

pub use retry::RetryPolicy;

use crate::directory::EventDirectory;
use crate::model::event::EventId;
use crate::model::member::MemberId;
use crate::store::{AttendanceStore, LedgerSnapshot, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Why a check-in was refused without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownEvent,
    InvalidMember,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownEvent => "unknown_event",
            Self::InvalidMember => "invalid_member",
        }
    }
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEvent => write!(f, "event is not in the event directory"),
            Self::InvalidMember => write!(f, "member id is empty"),
        }
    }
}

/// Result of one `record_attendance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// The pair was inserted by this call.
    Granted,
    /// The pair already existed; nothing changed.
    Duplicate,
    /// The call was refused; nothing changed.
    Rejected(RejectReason),
}

impl CheckInOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Short stable label for logs and activity lists.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Duplicate => "duplicate",
            Self::Rejected(_) => "rejected",
        }
    }

    /// Operator-facing status line.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Granted => "Scan successful — badge granted.",
            Self::Duplicate => "Duplicate scan — already granted for this event.",
            Self::Rejected(RejectReason::UnknownEvent) => "Unknown event — check the event QR",
            Self::Rejected(RejectReason::InvalidMember) => "QR missing memberId",
        }
    }
}

/// Fatal ledger failure: the backing store could not complete the call.
#[derive(Debug)]
pub enum LedgerError {
    Storage {
        operation: &'static str,
        source: StoreError,
    },
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { operation, source } => {
                write!(f, "attendance store failed during {operation}: {source}")
            }
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
        }
    }
}

/// Attendance ledger over store `S`, validating against directory `E`.
pub struct AttendanceLedger<S: AttendanceStore, E: EventDirectory> {
    store: S,
    events: E,
    retry: RetryPolicy,
}

impl<S: AttendanceStore, E: EventDirectory> AttendanceLedger<S, E> {
    /// Creates a ledger with the default retry policy.
    pub fn new(store: S, events: E) -> Self {
        Self {
            store,
            events,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Event directory this ledger validates against.
    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records one check-in.
    ///
    /// # Contract
    /// - `Rejected(UnknownEvent)` when `event_id` is not in the directory.
    /// - `Rejected(InvalidMember)` when `member_id` is blank.
    /// - `Duplicate` when the pair exists; no state change.
    /// - `Granted` when this call inserted the pair.
    ///
    /// # Errors
    /// - `LedgerError::Storage` when the store fails permanently or transient
    ///   failures outlast the retry policy.
    pub fn record_attendance(
        &self,
        event_id: EventId,
        member_id: &str,
    ) -> LedgerResult<CheckInOutcome> {
        let member_id = member_id.trim();
        let outcome = if !self.events.exists(event_id) {
            CheckInOutcome::Rejected(RejectReason::UnknownEvent)
        } else if member_id.is_empty() {
            CheckInOutcome::Rejected(RejectReason::InvalidMember)
        } else {
            let inserted = self.retry_store("record_attendance", || {
                self.store.record_if_absent(event_id, member_id)
            })?;
            if inserted {
                CheckInOutcome::Granted
            } else {
                CheckInOutcome::Duplicate
            }
        };

        match outcome {
            CheckInOutcome::Granted => info!(
                "event=attendance_record module=ledger status=granted event_id={event_id}"
            ),
            CheckInOutcome::Duplicate => debug!(
                "event=attendance_record module=ledger status=duplicate event_id={event_id}"
            ),
            CheckInOutcome::Rejected(reason) => warn!(
                "event=attendance_record module=ledger status=rejected event_id={} reason={}",
                event_id,
                reason.as_str()
            ),
        }

        Ok(outcome)
    }

    /// Members checked into `event_id`, in arrival order.
    pub fn attendees_for_event(&self, event_id: EventId) -> LedgerResult<Vec<MemberId>> {
        self.retry_store("attendees_for_event", || self.store.get(event_id))
    }

    pub fn is_member_present(&self, event_id: EventId, member_id: &str) -> LedgerResult<bool> {
        let member_id = member_id.trim();
        if member_id.is_empty() {
            return Ok(false);
        }
        self.retry_store("is_member_present", || {
            self.store.contains(event_id, member_id)
        })
    }

    /// Derived attendee count for one event.
    pub fn attendee_count(&self, event_id: EventId) -> LedgerResult<usize> {
        self.retry_store("attendee_count", || self.store.count(event_id))
    }

    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        self.retry_store("snapshot", || self.store.snapshot())
    }

    /// Unions a persisted snapshot into the store. Returns pairs added.
    ///
    /// Pairs are taken as-is, including events the directory does not know;
    /// derived views skip those.
    pub fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> LedgerResult<usize> {
        let added = self.retry_store("merge_snapshot", || self.store.merge_snapshot(snapshot))?;
        info!(
            "event=snapshot_merge module=ledger status=ok incoming_pairs={} added_pairs={}",
            snapshot.pair_count(),
            added
        );
        Ok(added)
    }

    fn retry_store<T>(
        &self,
        operation: &'static str,
        op: impl FnMut() -> Result<T, StoreError>,
    ) -> LedgerResult<T> {
        self.retry
            .run(operation, op)
            .map_err(|source| LedgerError::Storage { operation, source })
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceLedger, CheckInOutcome, LedgerError, RejectReason, RetryPolicy};
    use crate::directory::StaticEventDirectory;
    use crate::model::event::Event;
    use crate::store::{
        AttendanceStore, InMemoryAttendanceStore, LedgerSnapshot, StoreError, StoreResult,
    };
    use std::cell::Cell;

    fn directory() -> StaticEventDirectory {
        StaticEventDirectory::new([
            Event::new(1, "Orientation", "2025-01-10", "Gym"),
            Event::new(2, "Tech Talk", "2025-02-14", "Room 301"),
        ])
        .unwrap()
    }

    /// Fails the first `failures` writes with a transient error.
    struct FlakyStore {
        inner: InMemoryAttendanceStore,
        failures: Cell<u32>,
        transient: bool,
    }

    impl AttendanceStore for FlakyStore {
        fn get(&self, event_id: i64) -> StoreResult<Vec<String>> {
            self.inner.get(event_id)
        }

        fn record_if_absent(&self, event_id: i64, member_id: &str) -> StoreResult<bool> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(if self.transient {
                    StoreError::Unavailable("link down".to_string())
                } else {
                    StoreError::Io {
                        path: "ledger.json".into(),
                        source: std::io::Error::other("disk full"),
                    }
                });
            }
            self.inner.record_if_absent(event_id, member_id)
        }

        fn snapshot(&self) -> StoreResult<LedgerSnapshot> {
            self.inner.snapshot()
        }

        fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize> {
            self.inner.merge_snapshot(snapshot)
        }
    }

    #[test]
    fn member_ids_are_trimmed_before_recording() {
        let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());
        assert_eq!(
            ledger.record_attendance(1, "  M1 ").unwrap(),
            CheckInOutcome::Granted
        );
        assert_eq!(
            ledger.record_attendance(1, "M1").unwrap(),
            CheckInOutcome::Duplicate
        );
        assert!(ledger.is_member_present(1, " M1").unwrap());
    }

    #[test]
    fn blank_member_is_rejected_without_state_change() {
        let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), directory());
        assert_eq!(
            ledger.record_attendance(1, "   ").unwrap(),
            CheckInOutcome::Rejected(RejectReason::InvalidMember)
        );
        assert!(ledger.snapshot().unwrap().is_empty());
    }

    #[test]
    fn transient_store_failures_are_retried() {
        let store = FlakyStore {
            inner: InMemoryAttendanceStore::new(),
            failures: Cell::new(2),
            transient: true,
        };
        let ledger = AttendanceLedger::new(store, directory()).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        });

        assert_eq!(
            ledger.record_attendance(2, "M9").unwrap(),
            CheckInOutcome::Granted
        );
        assert_eq!(ledger.attendee_count(2).unwrap(), 1);
    }

    #[test]
    fn permanent_store_failure_is_fatal_and_keeps_prior_grants() {
        let store = FlakyStore {
            inner: InMemoryAttendanceStore::new(),
            failures: Cell::new(0),
            transient: false,
        };
        let ledger = AttendanceLedger::new(store, directory());
        ledger.record_attendance(1, "M1").unwrap();

        ledger.store().failures.set(1);
        let err = ledger.record_attendance(1, "M2").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Storage {
                operation: "record_attendance",
                ..
            }
        ));

        assert_eq!(ledger.attendees_for_event(1).unwrap(), vec!["M1".to_string()]);
        assert_eq!(
            ledger.record_attendance(1, "M2").unwrap(),
            CheckInOutcome::Granted
        );
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(CheckInOutcome::Granted.as_str(), "granted");
        assert_eq!(CheckInOutcome::Duplicate.as_str(), "duplicate");
        assert_eq!(
            CheckInOutcome::Rejected(RejectReason::UnknownEvent).as_str(),
            "rejected"
        );
        assert!(CheckInOutcome::Granted.is_granted());
    }
}
