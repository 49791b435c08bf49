//! Derived views over the ledger: aggregation and CSV export.
//!
//! # Responsibility
//! - Compute census totals, per-event summaries and engagement ranking.
//! - Serialize report rows to byte-reproducible CSV.
//!
//! # Invariants
//! - Views read the ledger; they never write to it.
//! - Ranking order is total and deterministic (count desc, member id asc).
//! - CSV column order comes from the first row only.

pub mod aggregation;
pub mod csv;

pub use aggregation::{
    filter_attendees, filter_by_chapter, AggregationEngine, Census, ChapterFilter,
    EngagementEntry, EventSummary, RankedMember,
};
pub use csv::{to_csv, ExportError, ReportRow, CSV_LINE_TERMINATOR, CSV_SEPARATOR};
