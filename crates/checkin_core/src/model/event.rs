//! Event metadata read from the external event directory.

use serde::{Deserialize, Serialize};

/// Numeric event identifier, as scanned and as persisted.
pub type EventId = i64;

/// Event metadata owned by the event directory.
///
/// Has no attendee count field: counts are derived from the
/// attendance ledger on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    /// Display date string, passed through as-is to reports and badges.
    pub date: String,
    pub location: String,
    /// Badge symbol configured by the organizer (usually an emoji).
    #[serde(default, alias = "badgeEmoji")]
    pub badge_icon: Option<String>,
    /// Free-form badge description shown in badge details.
    #[serde(default, alias = "details")]
    pub badge_details: Option<String>,
}

impl Event {
    /// Creates event metadata without badge customization.
    pub fn new(
        id: EventId,
        title: impl Into<String>,
        date: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            date: date.into(),
            location: location.into(),
            badge_icon: None,
            badge_details: None,
        }
    }

    /// Sets the badge icon and returns the updated value.
    pub fn with_badge_icon(mut self, icon: impl Into<String>) -> Self {
        self.badge_icon = Some(icon.into());
        self
    }

    /// Sets the badge details and returns the updated value.
    pub fn with_badge_details(mut self, details: impl Into<String>) -> Self {
        self.badge_details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn deserializes_seed_shape_with_legacy_field_names() {
        let event: Event = serde_json::from_str(
            r#"{"id":3,"title":"Hackathon","date":"2025-03-01","location":"Hall B","badgeEmoji":"🤖","details":"24h build"}"#,
        )
        .unwrap();

        assert_eq!(event.id, 3);
        assert_eq!(event.badge_icon.as_deref(), Some("🤖"));
        assert_eq!(event.badge_details.as_deref(), Some("24h build"));
    }

    #[test]
    fn badge_fields_are_optional() {
        let event: Event = serde_json::from_str(
            r#"{"id":1,"title":"Orientation","date":"2025-01-10","location":"Gym"}"#,
        )
        .unwrap();
        assert_eq!(event, Event::new(1, "Orientation", "2025-01-10", "Gym"));
    }
}
