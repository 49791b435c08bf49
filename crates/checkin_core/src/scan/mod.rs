//! Scan loop: capture source sampling, decoding and check-in.
//!
//! # Responsibility
//! - Drive the `Idle -> Active -> Idle` scanner state machine.
//! - Feed each newly observed payload through decoder and ledger, one at a
//!   time, in detection order.
//! - Keep a short recent-activity list for the operator.
//!
//! # Invariants
//! - At most one decode + ledger write is in flight per driver.
//! - A payload identical to the immediately preceding one is not reprocessed.
//! - Disabling only takes effect between samples, so no ledger write is cut
//!   short; grants already returned are final.

mod driver;
mod source;

pub use driver::{
    ActivityEntry, RunSummary, ScanConfig, ScanControl, ScanDriver, ScanLoopError, ScanOutcome,
    ScanReport, ScanState,
};
pub use source::{CaptureError, LineScanSource, ScanSource};
