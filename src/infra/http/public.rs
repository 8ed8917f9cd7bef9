use axum::{
    Json,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    application::{
        error::HttpError,
        moderation::ModerationError,
        syndication::{FeedFlavor, synthesize, write_rss},
    },
    domain::{dates::format_episode_date, entities::EpisodeRecord, types::EpisodeOrder},
    presentation::views::{
        CatalogTemplate, FailedTemplate, SubmitTemplate, ThanksTemplate,
        render_template_response,
    },
};

use super::{
    HttpState, db_health_response,
    forms::{ClientAddress, SubmitForm},
    xml_response,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct OrderQuery {
    order: Option<String>,
}

pub(super) async fn index(
    State(state): State<HttpState>,
    Query(query): Query<OrderQuery>,
) -> Response {
    let order = EpisodeOrder::parse(query.order.as_deref());
    match state.catalog.ordered(order).await {
        Ok(episodes) => render_template_response(
            CatalogTemplate::new(&episodes, order),
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn submit_form(State(state): State<HttpState>) -> Response {
    render_template_response(
        SubmitTemplate {
            site_key: state.site_key.as_deref().map(str::to_owned),
        },
        StatusCode::OK,
    )
}

pub(super) async fn submit_add(
    State(state): State<HttpState>,
    ClientAddress(client): ClientAddress,
    Form(form): Form<SubmitForm>,
) -> Response {
    let token = form.token.clone();
    match state
        .moderation
        .submit(form.into_input(), &token, client.as_deref())
        .await
    {
        Ok(_) => render_template_response(ThanksTemplate, StatusCode::OK),
        Err(ModerationError::GateRejected { .. }) => {
            render_template_response(FailedTemplate, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn web_feed(State(state): State<HttpState>) -> Response {
    feed_response(&state, FeedFlavor::Web).await
}

pub(super) async fn podcast_feed(State(state): State<HttpState>) -> Response {
    feed_response(&state, FeedFlavor::Podcast).await
}

async fn feed_response(state: &HttpState, flavor: FeedFlavor) -> Response {
    let episodes = match state.catalog.episodes().await {
        Ok(episodes) => episodes,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let document = synthesize(&state.feed, flavor, &episodes);
    let mut body = Vec::new();
    match write_rss(&document, &mut body) {
        Ok(()) => xml_response(body),
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub(super) struct DumpEntry {
    id: i64,
    show: String,
    title: String,
    about: String,
    url: String,
    media: Option<String>,
    runtime: Option<i32>,
    size: Option<i64>,
    date: String,
    #[serde(with = "time::serde::rfc3339")]
    added: OffsetDateTime,
}

impl From<EpisodeRecord> for DumpEntry {
    fn from(episode: EpisodeRecord) -> Self {
        Self {
            id: episode.id,
            date: format_episode_date(episode.episode_date),
            show: episode.show,
            title: episode.title,
            about: episode.description,
            url: episode.episode_url,
            media: episode.media_url,
            runtime: episode.runtime_seconds,
            size: episode.size_bytes,
            added: episode.added_at,
        }
    }
}

/// Whole catalog as JSON, oldest first.
pub(super) async fn dump(State(state): State<HttpState>) -> Response {
    match state.catalog.ordered(EpisodeOrder::OldestFirst).await {
        Ok(episodes) => Json(
            episodes
                .into_iter()
                .map(DumpEntry::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}
