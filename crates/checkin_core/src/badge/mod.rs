//! Badge derivation from ledger entries plus a static catalog.
//!
//! # Responsibility
//! - Project each attended event into a display badge.
//! - Merge the static catalog under earned-wins precedence.
//!
//! # Invariants
//! - Earned badges are exactly the known events the member attended.
//! - Earned entries are inserted first; catalog entries only fill ids that
//!   are still absent.
//! - Ledger events missing from the directory are skipped, never fatal.

use crate::directory::{DirectoryError, EventDirectory};
use crate::ledger::{AttendanceLedger, LedgerResult};
use crate::model::badge::{Badge, DEFAULT_BADGE_ICON};
use crate::model::event::{Event, EventId};
use crate::store::AttendanceStore;
use log::debug;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Id of the badge earned by attending `event_id`.
pub fn earned_badge_id(event_id: EventId) -> String {
    format!("event-{event_id}")
}

/// Static illustrative badges shown alongside earned ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeCatalog {
    badges: Vec<Badge>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogSeed {
    List(Vec<Badge>),
    Wrapped { badges: Vec<Badge> },
}

impl BadgeCatalog {
    pub fn new(badges: impl IntoIterator<Item = Badge>) -> Self {
        Self {
            badges: badges.into_iter().collect(),
        }
    }

    /// Parses `{"badges": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let badges = match serde_json::from_str::<CatalogSeed>(json)? {
            CatalogSeed::List(badges) => badges,
            CatalogSeed::Wrapped { badges } => badges,
        };
        Ok(Self::new(badges))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }
}

/// Derives badges for members from one ledger.
pub struct BadgeDeriver<'a, S: AttendanceStore, E: EventDirectory> {
    ledger: &'a AttendanceLedger<S, E>,
    catalog: &'a BadgeCatalog,
    default_icon: String,
}

impl<'a, S: AttendanceStore, E: EventDirectory> BadgeDeriver<'a, S, E> {
    pub fn new(ledger: &'a AttendanceLedger<S, E>, catalog: &'a BadgeCatalog) -> Self {
        Self {
            ledger,
            catalog,
            default_icon: DEFAULT_BADGE_ICON.to_string(),
        }
    }

    /// Overrides the icon used for events without one.
    pub fn with_default_icon(mut self, icon: impl Into<String>) -> Self {
        self.default_icon = icon.into();
        self
    }

    /// Badges for `member_id`: earned ones by event id, then catalog fill-ins.
    pub fn derive_badges_for_member(&self, member_id: &str) -> LedgerResult<Vec<Badge>> {
        let member_id = member_id.trim();
        let snapshot = self.ledger.snapshot()?;
        let events = self.ledger.events();

        let mut badges = Vec::new();
        let mut seen = HashSet::new();

        for event_id in snapshot.event_ids() {
            if !snapshot.contains(event_id, member_id) {
                continue;
            }
            let Some(event) = events.get(event_id) else {
                debug!(
                    "event=badge_derive module=badge status=skipped reason=unknown_event event_id={event_id}"
                );
                continue;
            };
            let badge = self.earned_badge(&event);
            seen.insert(badge.id.clone());
            badges.push(badge);
        }

        for badge in self.catalog.badges() {
            if seen.insert(badge.id.clone()) {
                badges.push(badge.clone());
            }
        }

        Ok(badges)
    }

    fn earned_badge(&self, event: &Event) -> Badge {
        Badge {
            id: earned_badge_id(event.id),
            title: event.title.clone(),
            date: event.date.clone(),
            icon: non_blank(event.badge_icon.as_deref())
                .unwrap_or(self.default_icon.as_str())
                .to_string(),
            details: non_blank(event.badge_details.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Event held at {}", event.location)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{earned_badge_id, BadgeCatalog, BadgeDeriver};
    use crate::directory::StaticEventDirectory;
    use crate::ledger::AttendanceLedger;
    use crate::model::event::Event;
    use crate::store::InMemoryAttendanceStore;

    #[test]
    fn earned_badge_falls_back_to_default_icon_and_location_details() {
        let events =
            StaticEventDirectory::new([Event::new(4, "Seminar", "2025-04-04", "Aula")]).unwrap();
        let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), events);
        ledger.record_attendance(4, "M1").unwrap();
        let catalog = BadgeCatalog::default();

        let badges = BadgeDeriver::new(&ledger, &catalog)
            .derive_badges_for_member("M1")
            .unwrap();

        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].id, earned_badge_id(4));
        assert_eq!(badges[0].icon, "🏅");
        assert_eq!(badges[0].details, "Event held at Aula");
    }

    #[test]
    fn configured_icon_and_details_are_used() {
        let events = StaticEventDirectory::new([Event::new(1, "Hack", "d", "l")
            .with_badge_icon("🤖")
            .with_badge_details("Built a robot")])
        .unwrap();
        let ledger = AttendanceLedger::new(InMemoryAttendanceStore::new(), events);
        ledger.record_attendance(1, "M1").unwrap();
        let catalog = BadgeCatalog::default();

        let badges = BadgeDeriver::new(&ledger, &catalog)
            .with_default_icon("*")
            .derive_badges_for_member("M1")
            .unwrap();

        assert_eq!(badges[0].icon, "🤖");
        assert_eq!(badges[0].details, "Built a robot");
    }

    #[test]
    fn catalog_accepts_wrapped_seed() {
        let catalog = BadgeCatalog::from_json(
            r#"{"badges":[{"id":"b1","title":"Early Bird","date":"2025-01-01","icon":"🐦","category":"Community"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.badges().len(), 1);
        assert_eq!(catalog.badges()[0].details, "");
    }
}
