//! Shared domain enumerations.

use std::cmp::Ordering;

use super::entities::EpisodeRecord;

/// Ordering applied to the catalog listing.
///
/// The store is always scanned newest first; other orders are applied in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EpisodeOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    Title,
    Show,
}

impl EpisodeOrder {
    /// Parse the `order` query parameter. Unknown values fall back to newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim).unwrap_or_default() {
            "title" => Self::Title,
            "show" => Self::Show,
            "oldest" => Self::OldestFirst,
            _ => Self::NewestFirst,
        }
    }

    /// Re-order a newest-first episode list. Text sorts are stable, so ties keep their
    /// newest-first relative order.
    pub fn apply(self, episodes: &mut [EpisodeRecord]) {
        match self {
            Self::NewestFirst => {}
            Self::OldestFirst => episodes.reverse(),
            Self::Title => episodes.sort_by(|a, b| compare_text(&a.title, &b.title)),
            Self::Show => episodes.sort_by(|a, b| compare_text(&a.show, &b.show)),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
