//! Free-text cleaning for user-supplied submission fields.

use std::collections::HashSet;

use ammonia::Builder;
use url::Url;

use crate::domain::error::DomainError;

/// Strips all markup from plain-text fields.
///
/// No tags or attributes are allowed; `<script>` and `<style>` lose their content as well as
/// their tags. The result is HTML-escaped, so stored text can never be interpreted as markup.
pub struct TextSanitizer {
    policy: Builder<'static>,
}

impl TextSanitizer {
    pub fn new() -> Self {
        let mut policy = Builder::empty();
        policy.clean_content_tags(HashSet::from(["script", "style"]));
        Self { policy }
    }

    /// Trim, strip markup, trim again.
    pub fn clean(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        self.policy.clean(trimmed).to_string().trim().to_owned()
    }

    /// Clean an optional field; blank input becomes `None`.
    pub fn clean_optional(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|value| self.clean(value))
            .filter(|value| !value.is_empty())
    }
}

impl Default for TextSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate an absolute `http`/`https` URL and return its normalized serialization.
///
/// Characters that could break out of an attribute are percent-encoded by the parser.
pub fn normalize_url(field: &str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|err| DomainError::validation(format!("{field} is not a valid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.into()),
        other => Err(DomainError::validation(format!(
            "{field} must use http or https, got `{other}`"
        ))),
    }
}
