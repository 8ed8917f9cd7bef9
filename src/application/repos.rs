//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::domain::entities::{EpisodeRecord, SubmissionRecord};
use crate::domain::keys::SubmissionKey;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEpisodeParams {
    pub id: i64,
    pub show: String,
    pub title: String,
    pub description: String,
    pub episode_url: String,
    pub media_url: Option<String>,
    pub runtime_seconds: Option<i32>,
    pub size_bytes: Option<i64>,
    pub episode_date: Date,
    pub added_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubmissionParams {
    pub submission_url: String,
    pub show: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub episode_date: Option<Date>,
    pub submitted_at: OffsetDateTime,
}

#[async_trait]
pub trait EpisodesRepo: Send + Sync {
    /// Full scan of the catalog, newest `episode_date` first. Ties break on `id` descending.
    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, RepoError>;

    async fn insert_episode(&self, params: CreateEpisodeParams)
    -> Result<EpisodeRecord, RepoError>;

    /// Reserve `count` fresh identifiers from the episode id sequence.
    ///
    /// Returned ids are strictly increasing and never handed out again, whether or not the
    /// caller ends up using them.
    async fn reserve_episode_ids(&self, count: u32) -> Result<Vec<i64>, RepoError>;
}

#[async_trait]
pub trait SubmissionsRepo: Send + Sync {
    /// Pending submissions ordered by `submitted_at` ascending.
    async fn list_pending(&self) -> Result<Vec<SubmissionRecord>, RepoError>;

    async fn create_submission(
        &self,
        params: CreateSubmissionParams,
    ) -> Result<SubmissionRecord, RepoError>;

    /// Delete a submission. Deleting a key that no longer exists is not an error.
    async fn delete_submission(&self, key: SubmissionKey) -> Result<(), RepoError>;

    async fn count_pending(&self) -> Result<u64, RepoError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
