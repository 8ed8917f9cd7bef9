use crate::application::error::HttpError;
use crate::domain::{
    dates::{display_date, format_episode_date},
    entities::{EpisodeRecord, SubmissionRecord},
    types::EpisodeOrder,
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub struct EpisodeView {
    pub show: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub media: Option<String>,
    pub runtime: Option<String>,
    pub date: String,
}

impl From<&EpisodeRecord> for EpisodeView {
    fn from(episode: &EpisodeRecord) -> Self {
        Self {
            show: episode.show.clone(),
            title: episode.title.clone(),
            description: episode.description.clone(),
            url: episode.episode_url.clone(),
            media: episode.media_url.clone(),
            runtime: episode.runtime_seconds.map(format_runtime),
            date: display_date(episode.episode_date),
        }
    }
}

fn format_runtime(seconds: i32) -> String {
    let minutes = seconds.max(0) / 60;
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

pub struct OrderLink {
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

fn order_links(active: EpisodeOrder) -> Vec<OrderLink> {
    [
        ("Newest", "/", EpisodeOrder::NewestFirst),
        ("Oldest", "/?order=oldest", EpisodeOrder::OldestFirst),
        ("Title", "/?order=title", EpisodeOrder::Title),
        ("Show", "/?order=show", EpisodeOrder::Show),
    ]
    .into_iter()
    .map(|(label, href, order)| OrderLink {
        label,
        href,
        active: order == active,
    })
    .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct CatalogTemplate {
    pub episodes: Vec<EpisodeView>,
    pub orders: Vec<OrderLink>,
}

impl CatalogTemplate {
    pub fn new(episodes: &[EpisodeRecord], order: EpisodeOrder) -> Self {
        Self {
            episodes: episodes.iter().map(EpisodeView::from).collect(),
            orders: order_links(order),
        }
    }
}

#[derive(Template)]
#[template(path = "submit.html")]
pub struct SubmitTemplate {
    pub site_key: Option<String>,
}

#[derive(Template)]
#[template(path = "failed.html")]
pub struct FailedTemplate;

#[derive(Template)]
#[template(path = "thanks.html")]
pub struct ThanksTemplate;

#[derive(Template)]
#[template(path = "success.html")]
pub struct SuccessTemplate;

pub struct SubmissionView {
    pub key: String,
    pub url: String,
    pub show: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub submitted: String,
}

impl From<&SubmissionRecord> for SubmissionView {
    fn from(submission: &SubmissionRecord) -> Self {
        Self {
            key: submission.key.encode(),
            url: submission.submission_url.clone(),
            show: submission.show.clone().unwrap_or_default(),
            title: submission.title.clone().unwrap_or_default(),
            description: submission.description.clone().unwrap_or_default(),
            date: submission
                .episode_date
                .map(format_episode_date)
                .unwrap_or_default(),
            submitted: submission
                .submitted_at
                .format(&Rfc3339)
                .unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "submissions.html")]
pub struct SubmissionsTemplate {
    pub submissions: Vec<SubmissionView>,
}

impl SubmissionsTemplate {
    pub fn new(submissions: &[SubmissionRecord]) -> Self {
        Self {
            submissions: submissions.iter().map(SubmissionView::from).collect(),
        }
    }
}
