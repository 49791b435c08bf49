//! Event check-in core: QR payload decoding, the attendance ledger and every
//! view derived from it.
//! This crate is the single source of truth for attendance invariants.

pub mod badge;
pub mod config;
pub mod db;
pub mod decode;
pub mod directory;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod report;
pub mod scan;
pub mod store;

pub use badge::{earned_badge_id, BadgeCatalog, BadgeDeriver};
pub use config::{CheckinConfig, ConfigError};
pub use decode::payload::{decode_scan_payload, DecodeError, ScanPayload};
pub use directory::{
    DirectoryError, EventDirectory, MemberDirectory, StaticEventDirectory, StaticMemberDirectory,
};
pub use ledger::{
    AttendanceLedger, CheckInOutcome, LedgerError, LedgerResult, RejectReason, RetryPolicy,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::badge::{Badge, DEFAULT_BADGE_ICON};
pub use model::event::{Event, EventId};
pub use model::member::{Member, MemberId, UNKNOWN_CHAPTER};
pub use report::{
    filter_attendees, filter_by_chapter, to_csv, AggregationEngine, Census, ChapterFilter,
    EngagementEntry, EventSummary, ExportError, RankedMember, ReportRow,
};
pub use scan::{
    ActivityEntry, CaptureError, LineScanSource, RunSummary, ScanConfig, ScanControl, ScanDriver,
    ScanLoopError, ScanOutcome, ScanReport, ScanSource, ScanState,
};
pub use store::{
    load_snapshot, load_snapshot_if_exists, save_snapshot, save_snapshot_merged, AttendanceStore,
    InMemoryAttendanceStore, LedgerSnapshot, SqliteAttendanceStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
