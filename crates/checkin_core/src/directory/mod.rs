//! Read-only lookups into the external event and member directories.
//!
//! # Responsibility
//! - Define the directory contracts the ledger and reports depend on.
//! - Provide seed-file backed implementations for tests and the CLI.
//!
//! # Invariants
//! - The core never writes through these contracts.
//! - Lookups are cheap and infallible; loading seed data is the only fallible
//!   step.

mod seed;

pub use seed::{DirectoryError, StaticEventDirectory, StaticMemberDirectory};

use crate::model::event::{Event, EventId};
use crate::model::member::Member;
use std::sync::Arc;

/// Event directory contract.
pub trait EventDirectory {
    fn exists(&self, event_id: EventId) -> bool;
    fn get(&self, event_id: EventId) -> Option<Event>;
    /// All known events in directory order.
    fn list_all(&self) -> Vec<Event>;
}

/// Member directory contract.
pub trait MemberDirectory {
    fn resolve(&self, member_id: &str) -> Option<Member>;
    /// All known members in directory order.
    fn list_all(&self) -> Vec<Member>;

    /// Roster size for census views. Defaults to the number of listed members.
    fn total_members(&self) -> usize {
        self.list_all().len()
    }

    /// Resolves a member, falling back to [`Member::unresolved`].
    fn resolve_or_unknown(&self, member_id: &str) -> Member {
        self.resolve(member_id)
            .unwrap_or_else(|| Member::unresolved(member_id))
    }
}

impl<T: EventDirectory + ?Sized> EventDirectory for &T {
    fn exists(&self, event_id: EventId) -> bool {
        (**self).exists(event_id)
    }

    fn get(&self, event_id: EventId) -> Option<Event> {
        (**self).get(event_id)
    }

    fn list_all(&self) -> Vec<Event> {
        (**self).list_all()
    }
}

impl<T: EventDirectory + ?Sized> EventDirectory for Arc<T> {
    fn exists(&self, event_id: EventId) -> bool {
        (**self).exists(event_id)
    }

    fn get(&self, event_id: EventId) -> Option<Event> {
        (**self).get(event_id)
    }

    fn list_all(&self) -> Vec<Event> {
        (**self).list_all()
    }
}

impl<T: MemberDirectory + ?Sized> MemberDirectory for &T {
    fn resolve(&self, member_id: &str) -> Option<Member> {
        (**self).resolve(member_id)
    }

    fn list_all(&self) -> Vec<Member> {
        (**self).list_all()
    }

    fn total_members(&self) -> usize {
        (**self).total_members()
    }
}

impl<T: MemberDirectory + ?Sized> MemberDirectory for Arc<T> {
    fn resolve(&self, member_id: &str) -> Option<Member> {
        (**self).resolve(member_id)
    }

    fn list_all(&self) -> Vec<Member> {
        (**self).list_all()
    }

    fn total_members(&self) -> usize {
        (**self).total_members()
    }
}
