//! Aggregation engine over the attendance ledger.
//!
//! Only events present in the event directory contribute to totals, rankings
//! and summaries. Ledger entries for unknown events (possible after merging a
//! foreign snapshot) are ignored rather than reported.

use super::csv::ReportRow;
use crate::directory::{EventDirectory, MemberDirectory};
use crate::ledger::{AttendanceLedger, LedgerResult};
use crate::model::event::{Event, EventId};
use crate::model::member::{Member, MemberId};
use crate::store::AttendanceStore;
use std::collections::{BTreeMap, BTreeSet};

/// One row of the engagement ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementEntry {
    pub member_id: MemberId,
    /// Number of distinct known events attended.
    pub event_count: usize,
}

/// Engagement entry joined with member metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMember {
    pub member: Member,
    pub event_count: usize,
}

/// Attendance view of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub event: Event,
    pub attendee_count: usize,
    /// Attendees in arrival order, resolved with the "Unknown" fallback.
    pub attendees: Vec<Member>,
}

/// System-wide totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Census {
    pub total_members: usize,
    pub total_events: usize,
    pub total_attendance: usize,
}

/// Chapter selector for member reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterFilter {
    All,
    Chapter(String),
}

impl ChapterFilter {
    /// Parses operator input; blank or `all` (any case) selects every chapter.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Chapter(trimmed.to_string())
        }
    }

    pub fn matches(&self, member: &Member) -> bool {
        match self {
            Self::All => true,
            Self::Chapter(name) => member.chapter_or_school == *name,
        }
    }
}

/// Keeps ranking entries whose member belongs to the selected chapter.
///
/// Pure: the input slice is not modified and order is preserved.
pub fn filter_by_chapter(ranking: &[RankedMember], filter: &ChapterFilter) -> Vec<RankedMember> {
    ranking
        .iter()
        .filter(|entry| filter.matches(&entry.member))
        .cloned()
        .collect()
}

/// Keeps attendees whose display name or id contains `query`, ignoring case.
///
/// A blank query keeps everyone. Pure: order is preserved.
pub fn filter_attendees(attendees: &[Member], query: &str) -> Vec<Member> {
    let needle = query.trim().to_lowercase();
    attendees
        .iter()
        .filter(|member| {
            needle.is_empty()
                || member.display_name.to_lowercase().contains(&needle)
                || member.id.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Read-only aggregation over a ledger and the member directory.
pub struct AggregationEngine<'a, S: AttendanceStore, E: EventDirectory, M: MemberDirectory> {
    ledger: &'a AttendanceLedger<S, E>,
    members: &'a M,
}

impl<'a, S: AttendanceStore, E: EventDirectory, M: MemberDirectory> AggregationEngine<'a, S, E, M> {
    pub fn new(ledger: &'a AttendanceLedger<S, E>, members: &'a M) -> Self {
        Self { ledger, members }
    }

    /// Sum of attendee counts over all known events.
    pub fn total_attendance(&self) -> LedgerResult<usize> {
        self.ledger
            .events()
            .list_all()
            .iter()
            .map(|event| self.ledger.attendee_count(event.id))
            .sum()
    }

    /// Members by distinct known events attended, count desc then id asc.
    pub fn engagement_ranking(&self) -> LedgerResult<Vec<EngagementEntry>> {
        let snapshot = self.ledger.snapshot()?;
        let events = self.ledger.events();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (event_id, members) in snapshot.iter() {
            if !events.exists(event_id) {
                continue;
            }
            for member_id in members {
                *counts.entry(member_id.as_str()).or_default() += 1;
            }
        }

        let mut ranking: Vec<EngagementEntry> = counts
            .into_iter()
            .map(|(member_id, event_count)| EngagementEntry {
                member_id: member_id.to_string(),
                event_count,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.event_count
                .cmp(&a.event_count)
                .then_with(|| a.member_id.cmp(&b.member_id))
        });
        Ok(ranking)
    }

    /// Engagement ranking with each member resolved.
    pub fn resolved_ranking(&self) -> LedgerResult<Vec<RankedMember>> {
        Ok(self
            .engagement_ranking()?
            .into_iter()
            .map(|entry| RankedMember {
                member: self.members.resolve_or_unknown(&entry.member_id),
                event_count: entry.event_count,
            })
            .collect())
    }

    /// Summary for every known event, in directory order.
    pub fn per_event_summary(&self) -> LedgerResult<Vec<EventSummary>> {
        self.ledger
            .events()
            .list_all()
            .into_iter()
            .map(|event| self.summarize(event))
            .collect()
    }

    /// Summary for one event, or `None` when the directory does not know it.
    pub fn event_summary(&self, event_id: EventId) -> LedgerResult<Option<EventSummary>> {
        match self.ledger.events().get(event_id) {
            Some(event) => self.summarize(event).map(Some),
            None => Ok(None),
        }
    }

    pub fn census(&self) -> LedgerResult<Census> {
        Ok(Census {
            total_members: self.members.total_members(),
            total_events: self.ledger.events().list_all().len(),
            total_attendance: self.total_attendance()?,
        })
    }

    /// Distinct chapter names from the member directory, sorted.
    pub fn chapters(&self) -> Vec<String> {
        self.members
            .list_all()
            .into_iter()
            .map(|member| member.chapter_or_school)
            .filter(|chapter| !chapter.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Attendance report rows (`event,date,memberId,name,chapter`).
    ///
    /// Returns an empty list for unknown events or events without attendees.
    pub fn attendance_report_rows(&self, event_id: EventId) -> LedgerResult<Vec<ReportRow>> {
        self.matching_attendance_report_rows(event_id, "")
    }

    /// Attendance report rows limited to attendees matching `query`
    /// (see [`filter_attendees`]).
    pub fn matching_attendance_report_rows(
        &self,
        event_id: EventId,
        query: &str,
    ) -> LedgerResult<Vec<ReportRow>> {
        let Some(summary) = self.event_summary(event_id)? else {
            return Ok(Vec::new());
        };
        Ok(filter_attendees(&summary.attendees, query)
            .iter()
            .map(|member| {
                ReportRow::new()
                    .with("event", &summary.event.title)
                    .with("date", &summary.event.date)
                    .with("memberId", &member.id)
                    .with("name", &member.display_name)
                    .with("chapter", &member.chapter_or_school)
            })
            .collect())
    }

    /// Engagement report rows (`id,name,chapter,events`) for one chapter filter.
    pub fn engagement_report_rows(&self, filter: &ChapterFilter) -> LedgerResult<Vec<ReportRow>> {
        let ranking = self.resolved_ranking()?;
        Ok(filter_by_chapter(&ranking, filter)
            .into_iter()
            .map(|entry| {
                ReportRow::new()
                    .with("id", &entry.member.id)
                    .with("name", &entry.member.display_name)
                    .with("chapter", &entry.member.chapter_or_school)
                    .with("events", entry.event_count)
            })
            .collect())
    }

    fn summarize(&self, event: Event) -> LedgerResult<EventSummary> {
        let attendees: Vec<Member> = self
            .ledger
            .attendees_for_event(event.id)?
            .iter()
            .map(|member_id| self.members.resolve_or_unknown(member_id))
            .collect();
        Ok(EventSummary {
            attendee_count: attendees.len(),
            event,
            attendees,
        })
    }
}
