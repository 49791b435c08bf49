//! Display-only badge projection.

use serde::{Deserialize, Serialize};

/// Icon used when an attended event defines no badge icon.
pub const DEFAULT_BADGE_ICON: &str = "🏅";

/// One badge as shown to a member.
///
/// Earned badges use ids of the form `event-<eventId>`; catalog badges keep
/// whatever id the catalog declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub details: String,
}

fn default_icon() -> String {
    DEFAULT_BADGE_ICON.to_string()
}
