//! Member identity read from the external member directory.

use serde::{Deserialize, Serialize};

/// Member identifier as encoded in QR payloads (for example `IC-2025-0001`).
pub type MemberId = String;

/// Chapter label used when a member cannot be resolved.
pub const UNKNOWN_CHAPTER: &str = "Unknown";

/// Member metadata owned by the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default = "unknown_chapter", alias = "chapter")]
    pub chapter_or_school: String,
}

impl Member {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        chapter_or_school: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            chapter_or_school: chapter_or_school.into(),
        }
    }

    /// Placeholder for an id the directory does not know.
    ///
    /// Display name mirrors the id; chapter is [`UNKNOWN_CHAPTER`].
    pub fn unresolved(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            chapter_or_school: UNKNOWN_CHAPTER.to_string(),
        }
    }
}

fn unknown_chapter() -> String {
    UNKNOWN_CHAPTER.to_string()
}
