//! Calendar-date parsing and display for episode dates.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use super::error::DomainError;

/// Wire format accepted from forms: `YYYY-MM-DD`.
const EPISODE_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Catalog display format, e.g. `02 Jan 2024`.
const DISPLAY_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year]");

/// Parse an episode date in the fixed `YYYY-MM-DD` format.
///
/// Calendar-invalid values such as `2024-13-40` are rejected rather than clamped.
pub fn parse_episode_date(input: &str) -> Result<Date, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("date is required"));
    }

    Date::parse(trimmed, EPISODE_DATE_FORMAT)
        .map_err(|err| DomainError::validation(format!("date `{trimmed}` is invalid: {err}")))
}

pub fn format_episode_date(date: Date) -> String {
    date.format(EPISODE_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn display_date(date: Date) -> String {
    date.format(DISPLAY_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}
