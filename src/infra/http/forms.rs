//! Form payloads accepted by the HTTP surface.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use serde::Deserialize;

use crate::application::moderation::{EpisodeFields, SubmissionInput};

/// `POST /submit/add`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitForm {
    pub url: String,
    pub show: Option<String>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "g-recaptcha-response")]
    pub token: String,
}

impl SubmitForm {
    /// Any legacy metadata field selects the full-metadata shape.
    pub fn into_input(self) -> SubmissionInput {
        let legacy = [&self.show, &self.title, &self.desc, &self.date]
            .into_iter()
            .any(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()));

        if legacy {
            SubmissionInput::Full {
                url: self.url,
                show: self.show.unwrap_or_default(),
                title: self.title.unwrap_or_default(),
                description: self.desc.unwrap_or_default(),
                date: self.date.unwrap_or_default(),
            }
        } else {
            SubmissionInput::UrlOnly { url: self.url }
        }
    }
}

/// `POST /submissions/add`. Without `key` this is a direct moderator entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PromoteForm {
    pub key: Option<String>,
    pub show: String,
    pub title: String,
    pub desc: String,
    pub url: String,
    pub media: Option<String>,
    pub runtime: Option<String>,
    pub size: Option<String>,
    pub date: String,
}

impl PromoteForm {
    pub fn into_parts(self) -> (Option<String>, EpisodeFields) {
        let fields = EpisodeFields {
            show: self.show,
            title: self.title,
            description: self.desc,
            episode_url: self.url,
            media_url: self.media,
            runtime: self.runtime,
            size: self.size,
            date: self.date,
        };
        (self.key, fields)
    }
}

/// `POST /submissions/del`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectForm {
    pub key: String,
}

/// Peer address of the connection, when the server was started with connect info.
#[derive(Debug, Clone, Default)]
pub struct ClientAddress(pub Option<String>);

impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_only_form_selects_baseline_intake() {
        let form = SubmitForm {
            url: "https://example.com/ep1".into(),
            show: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(
            form.into_input(),
            SubmissionInput::UrlOnly {
                url: "https://example.com/ep1".into()
            }
        );
    }

    #[test]
    fn legacy_fields_select_full_intake() {
        let form = SubmitForm {
            url: "https://example.com/ep1".into(),
            date: Some("2024-01-02".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_input(), SubmissionInput::Full { date, .. } if date == "2024-01-02"));
    }
}
