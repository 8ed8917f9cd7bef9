use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    application::{error::HttpError, notifications::SweepOutcome},
    presentation::views::{SubmissionsTemplate, SuccessTemplate, render_template_response},
};

use super::{
    HttpState,
    forms::{PromoteForm, RejectForm},
};

pub(super) async fn submissions(State(state): State<HttpState>) -> Response {
    match state.moderation.list_pending().await {
        Ok(pending) => {
            render_template_response(SubmissionsTemplate::new(&pending), StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn promote(
    State(state): State<HttpState>,
    Form(form): Form<PromoteForm>,
) -> Response {
    let (key, fields) = form.into_parts();
    match state.moderation.promote(key.as_deref(), fields).await {
        Ok(_) => render_template_response(SuccessTemplate, StatusCode::OK),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn reject(
    State(state): State<HttpState>,
    Form(form): Form<RejectForm>,
) -> Response {
    match state.moderation.reject(&form.key).await {
        Ok(()) => render_template_response(SuccessTemplate, StatusCode::OK),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn notify_sweep(State(state): State<HttpState>) -> Response {
    match state.notifications.sweep().await {
        Ok(SweepOutcome::Idle) => (StatusCode::OK, "no pending submissions").into_response(),
        Ok(SweepOutcome::Notified { pending }) => (
            StatusCode::OK,
            format!("notified moderators of {pending} submissions"),
        )
            .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
