use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        catalog::CatalogError, moderation::ModerationError, notifications::NotifyError,
        syndication::SyndicationError,
    },
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// An HTTP failure carrying a fixed public message and a private diagnostic report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<CatalogError> for HttpError {
    fn from(error: CatalogError) -> Self {
        HttpError::from_error(
            "application::catalog",
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error, sorry",
            &error,
        )
    }
}

impl From<SyndicationError> for HttpError {
    fn from(error: SyndicationError) -> Self {
        HttpError::from_error(
            "application::syndication",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate feed",
            &error,
        )
    }
}

impl From<NotifyError> for HttpError {
    fn from(error: NotifyError) -> Self {
        HttpError::from_error(
            "application::notifications",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Notification sweep failed",
            &error,
        )
    }
}

impl From<ModerationError> for HttpError {
    fn from(error: ModerationError) -> Self {
        const SOURCE: &str = "application::moderation";
        match &error {
            ModerationError::Validation(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            ModerationError::Decode(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid submission key",
                &error,
            ),
            ModerationError::GateRejected { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Verification failed",
                &error,
            ),
            ModerationError::GateUnavailable(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Verification service unavailable",
                &error,
            ),
            ModerationError::Repo(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "There was an error, sorry",
                &error,
            ),
        }
    }
}

/// Startup and command-level failures reported by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
