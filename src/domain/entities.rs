//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::keys::SubmissionKey;

/// A published catalog entry.
///
/// `id` is allocated once at promotion time and never changes or gets reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: i64,
    pub show: String,
    pub title: String,
    pub description: String,
    pub episode_url: String,
    pub media_url: Option<String>,
    pub runtime_seconds: Option<i32>,
    pub size_bytes: Option<i64>,
    pub episode_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

impl EpisodeRecord {
    /// Link used for enclosures and podcast clients: the media asset when known.
    pub fn media_or_episode_url(&self) -> &str {
        self.media_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.episode_url)
    }
}

/// A pending candidate episode awaiting moderator action.
///
/// The legacy intake captured full metadata; the current intake only captures the URL, so the
/// metadata fields are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub key: SubmissionKey,
    pub submission_url: String,
    pub show: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub episode_date: Option<Date>,
    pub submitted_at: OffsetDateTime,
}
