//! Read models shared by the ledger and its derived views.
//!
//! # Responsibility
//! - Define the member/event shapes the core reads from external directories.
//! - Define the display-only `Badge` projection.
//!
//! # Invariants
//! - Attendee counts are never stored on `Event`; they are derived from the
//!   ledger at query time.
//! - `Badge` values are derived, never persisted (except static catalog rows).

pub mod badge;
pub mod event;
pub mod member;
