//! Scan payload decoding.
//!
//! # Responsibility
//! - Turn raw scanned text into a typed `ScanPayload` or a typed error.
//!
//! # Invariants
//! - Decoding is pure: no I/O, no logging, no ledger access.

pub mod payload;
