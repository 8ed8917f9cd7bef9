//! HTTP surface: one axum router for the public site and the moderator pages.
//!
//! Moderator routes carry no authentication; deployments are expected to restrict
//! `/submissions*` and `/tasks/*` at the proxy.

mod forms;
mod middleware;
mod moderation;
mod public;

pub use forms::ClientAddress;
pub use middleware::REQUEST_ID_HEADER;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    catalog::CatalogService,
    error::ErrorReport,
    moderation::ModerationService,
    notifications::NotificationService,
    repos::{HealthRepo, RepoError},
    syndication::FeedSettings,
};

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub catalog: CatalogService,
    pub moderation: Arc<ModerationService>,
    pub notifications: Arc<NotificationService>,
    pub health: Arc<dyn HealthRepo>,
    pub feed: Arc<FeedSettings>,
    pub site_key: Option<Arc<str>>,
}

pub fn build_router(state: HttpState) -> Router {
    let public_routes = Router::new()
        .route("/", get(public::index))
        .route("/submit", get(public::submit_form))
        .route("/submit/add", post(public::submit_add))
        .route("/feed", get(public::web_feed))
        .route("/podcast/feed", get(public::podcast_feed))
        .route("/dump", get(public::dump))
        .route("/_health/db", get(public::db_health));

    let moderator_routes = Router::new()
        .route("/submissions", get(moderation::submissions))
        .route("/submissions/add", post(moderation::promote))
        .route("/submissions/del", post(moderation::reject))
        .route("/tasks/email", get(moderation::notify_sweep));

    public_routes
        .merge(moderator_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn xml_response(body: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/xml")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
