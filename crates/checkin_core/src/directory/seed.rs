//! Seed-file backed directories.
//!
//! Event seeds are a JSON array of events. Member seeds are either a JSON
//! array of members or `{"totalMembers": n, "members": [...]}`.

use super::{EventDirectory, MemberDirectory};
use crate::model::event::{Event, EventId};
use crate::model::member::Member;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Failure while loading directory seed data.
#[derive(Debug)]
pub enum DirectoryError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    DuplicateEventId(EventId),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read directory seed `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid directory seed: {err}"),
            Self::DuplicateEventId(id) => write!(f, "duplicate event id {id} in seed"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::DuplicateEventId(_) => None,
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// In-memory event directory keyed by event id.
#[derive(Debug, Clone, Default)]
pub struct StaticEventDirectory {
    events: BTreeMap<EventId, Event>,
}

impl StaticEventDirectory {
    /// Builds a directory; rejects duplicate ids.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Result<Self, DirectoryError> {
        let mut by_id = BTreeMap::new();
        for event in events {
            let id = event.id;
            if by_id.insert(id, event).is_some() {
                return Err(DirectoryError::DuplicateEventId(id));
            }
        }
        Ok(Self { events: by_id })
    }

    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        Self::new(events)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        Self::from_json(&read_seed(path.as_ref())?)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventDirectory for StaticEventDirectory {
    fn exists(&self, event_id: EventId) -> bool {
        self.events.contains_key(&event_id)
    }

    fn get(&self, event_id: EventId) -> Option<Event> {
        self.events.get(&event_id).cloned()
    }

    /// Events ordered by id ascending.
    fn list_all(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MemberSeed {
    List(Vec<Member>),
    Wrapped {
        #[serde(default, rename = "totalMembers")]
        total_members: Option<usize>,
        members: Vec<Member>,
    },
}

/// In-memory member directory preserving seed order.
#[derive(Debug, Clone, Default)]
pub struct StaticMemberDirectory {
    members: Vec<Member>,
    index: BTreeMap<String, usize>,
    /// Roster size declared by the seed; may exceed the listed members.
    declared_total: Option<usize>,
}

impl StaticMemberDirectory {
    /// Builds a directory; on duplicate ids the first row wins.
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        let mut directory = Self::default();
        for member in members {
            if directory.index.contains_key(member.id.as_str()) {
                continue;
            }
            directory
                .index
                .insert(member.id.clone(), directory.members.len());
            directory.members.push(member);
        }
        directory
    }

    /// Sets the roster size reported by [`MemberDirectory::total_members`].
    pub fn with_declared_total(mut self, total: usize) -> Self {
        self.declared_total = Some(total);
        self
    }

    /// Parses a bare array or `{"totalMembers": n, "members": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        match serde_json::from_str::<MemberSeed>(json)? {
            MemberSeed::List(members) => Ok(Self::new(members)),
            MemberSeed::Wrapped {
                total_members,
                members,
            } => {
                let directory = Self::new(members);
                Ok(match total_members {
                    Some(total) => directory.with_declared_total(total),
                    None => directory,
                })
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        Self::from_json(&read_seed(path.as_ref())?)
    }
}

impl MemberDirectory for StaticMemberDirectory {
    fn resolve(&self, member_id: &str) -> Option<Member> {
        self.index
            .get(member_id)
            .map(|position| self.members[*position].clone())
    }

    fn list_all(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn total_members(&self) -> usize {
        self.declared_total.unwrap_or(self.members.len())
    }
}

fn read_seed(path: &Path) -> Result<String, DirectoryError> {
    std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{DirectoryError, StaticEventDirectory, StaticMemberDirectory};
    use crate::directory::{EventDirectory, MemberDirectory};
    use crate::model::event::Event;

    #[test]
    fn event_directory_rejects_duplicate_ids() {
        let err = StaticEventDirectory::new([
            Event::new(1, "A", "2025-01-01", "Hall"),
            Event::new(1, "B", "2025-01-02", "Hall"),
        ])
        .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateEventId(1)));
    }

    #[test]
    fn event_directory_lists_by_id() {
        let directory = StaticEventDirectory::from_json(
            r#"[{"id":7,"title":"B","date":"d","location":"l"},{"id":2,"title":"A","date":"d","location":"l"}]"#,
        )
        .unwrap();
        let ids: Vec<_> = directory.list_all().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 7]);
        assert!(directory.exists(7));
        assert!(!directory.exists(3));
    }

    #[test]
    fn member_directory_accepts_wrapped_and_plain_seeds() {
        let wrapped = StaticMemberDirectory::from_json(
            r#"{"totalMembers":2,"members":[{"id":"M1","name":"Ana","chapter":"North"},{"id":"M2","name":"Ben"}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.list_all().len(), 2);
        assert_eq!(wrapped.resolve("M1").unwrap().chapter_or_school, "North");

        let plain = StaticMemberDirectory::from_json(
            r#"[{"id":"M3","displayName":"Cy","chapterOrSchool":"South"}]"#,
        )
        .unwrap();
        assert_eq!(plain.resolve("M3").unwrap().display_name, "Cy");
    }

    #[test]
    fn declared_roster_size_overrides_listed_count() {
        let declared = StaticMemberDirectory::from_json(
            r#"{"totalMembers":120,"members":[{"id":"M1","name":"Ana"}]}"#,
        )
        .unwrap();
        assert_eq!(declared.total_members(), 120);
        assert_eq!(declared.list_all().len(), 1);

        let listed = StaticMemberDirectory::from_json(r#"{"members":[{"id":"M1","name":"Ana"}]}"#)
            .unwrap();
        assert_eq!(listed.total_members(), 1);
    }

    #[test]
    fn resolve_or_unknown_falls_back() {
        let directory = StaticMemberDirectory::default();
        let member = directory.resolve_or_unknown("ghost");
        assert_eq!(member.display_name, "ghost");
        assert_eq!(member.chapter_or_school, "Unknown");
    }
}
